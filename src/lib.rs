//! Probing a WebGPU implementation from Rust.
//!
//! The crate has two halves:
//!
//! - [`probe`]: the link/instance smoke test behind the `webgpu-probe` binary.
//!   It asks the library for a top-level [`wgpu::Instance`] and reports
//!   whether it got one.
//! - [`context`], [`report`], [`human`] and [`kernel`]: a small harness behind
//!   the `webgpu-bench` binary that describes the available adapters and
//!   tunes a single-pass prefix-sum compute kernel.

pub mod context;
mod error;
pub mod human;
pub mod kernel;
pub mod probe;
pub mod report;

pub use context::{ContextOptions, GpuContext};
pub use error::{Error, Result};
