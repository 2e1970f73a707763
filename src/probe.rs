//! Link and instance smoke test.
//!
//! The probe asks the WebGPU library for a top-level instance exactly once and
//! writes two lines describing the outcome. An instance that could not be
//! created is a reportable condition, not an error: [`run_probe`] only fails
//! when the output itself cannot be written.

use std::{
    io,
    panic::{self, AssertUnwindSafe},
};

pub const SETUP_MESSAGE: &str = "Dawn is set up successfully!";
pub const CREATED_MESSAGE: &str = "WebGPU instance created successfully.";
pub const FAILED_MESSAGE: &str = "Failed to create WebGPU instance.";

/// Something able to produce a top-level API instance.
///
/// `None` is the invalid sentinel. There are no partially created instances.
pub trait InstanceFactory {
    type Instance;

    fn create_instance(&self) -> Option<Self::Instance>;
}

/// Creates a [`wgpu::Instance`] with default options.
///
/// The descriptor is built explicitly rather than from the environment, so the
/// result does not depend on `WGPU_*` variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct WgpuInstanceFactory;

impl InstanceFactory for WgpuInstanceFactory {
    type Instance = wgpu::Instance;

    fn create_instance(&self) -> Option<wgpu::Instance> {
        // wgpu reports a broken setup by panicking rather than returning null.
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            wgpu::Instance::new(wgpu::InstanceDescriptor::default())
        }));
        match result {
            Ok(instance) => Some(instance),
            Err(_) => {
                log::warn!("wgpu panicked while creating an instance");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Created,
    Failed,
}

impl ProbeOutcome {
    pub fn message(self) -> &'static str {
        match self {
            Self::Created => CREATED_MESSAGE,
            Self::Failed => FAILED_MESSAGE,
        }
    }
}

/// Runs the probe against `factory`, writing the report to `output`.
///
/// The instance is dropped before returning.
pub fn run_probe<F: InstanceFactory>(
    output: &mut impl io::Write,
    factory: &F,
) -> io::Result<ProbeOutcome> {
    writeln!(output, "{SETUP_MESSAGE}")?;

    let instance = factory.create_instance();
    let outcome = if instance.is_some() {
        ProbeOutcome::Created
    } else {
        ProbeOutcome::Failed
    };
    log::debug!("instance creation outcome: {outcome:?}");

    writeln!(output, "{}", outcome.message())?;
    output.flush()?;
    Ok(outcome)
}
