use std::io;

use thiserror::Error;

use crate::kernel::{template::TemplateError, ParamsError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("no suitable adapter found")]
    NoAdapter,
    #[error("adapter named {0:?} not found")]
    AdapterNotFound(String),
    #[error(transparent)]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to map buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
    #[error("buffer mapping callback was dropped before it ran")]
    ChannelClosed,
    #[error("wgpu rejected the {stage}: {message}")]
    Validation {
        stage: &'static str,
        message: String,
    },
    #[error("no kernel configuration can run vector size {vector_size} on this device")]
    NoRunnableVariant { vector_size: u32 },
    #[error("invalid kernel parameters: {0}")]
    InvalidParams(#[from] ParamsError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
