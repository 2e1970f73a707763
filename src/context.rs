//! Instance, adapter and device setup for the compute harness.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{Error, Result};

/// Options used to pick an adapter and build a device.
///
/// [`ContextOptions::from_env`] reads the same variables as wgpu's own test
/// runner and examples:
///
/// - `WGPU_BACKEND`: comma separated backend list, e.g. `vulkan,gl`.
/// - `WGPU_POWER_PREF`: `low`, `high` or `none`.
/// - `WGPU_ADAPTER_NAME`: case insensitive substring of the adapter name.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    pub adapter_name: Option<String>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            adapter_name: None,
        }
    }
}

impl ContextOptions {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backends: wgpu::util::backend_bits_from_env().unwrap_or(defaults.backends),
            power_preference: wgpu::util::power_preference_from_env()
                .unwrap_or(defaults.power_preference),
            adapter_name: std::env::var("WGPU_ADAPTER_NAME")
                .ok()
                .filter(|name| !name.is_empty()),
        }
    }

    pub fn create_instance(&self) -> wgpu::Instance {
        wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: self.backends,
            flags: wgpu::InstanceFlags::from_build_config().with_env(),
            dx12_shader_compiler: wgpu::util::dx12_shader_compiler_from_env().unwrap_or_default(),
            gles_minor_version: wgpu::util::gles_minor_version_from_env().unwrap_or_default(),
        })
    }
}

/// A device ready for compute work, together with where it came from.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    pub async fn new(options: &ContextOptions) -> Result<Self> {
        let instance = options.create_instance();
        let adapter = select_adapter(&instance, options).await?;
        log::info!("Selected adapter: {:?}", adapter.get_info());

        let adapter_features = adapter.features();
        let mut required_features = wgpu::Features::empty();
        if adapter_features.contains(wgpu::Features::TIMESTAMP_QUERY) {
            required_features |= wgpu::Features::TIMESTAMP_QUERY;
        } else {
            log::info!("Timestamp queries are not supported, falling back to wall clock timing");
        }
        if adapter_features.contains(wgpu::Features::SUBGROUP) {
            required_features |= wgpu::Features::SUBGROUP;
        } else {
            log::info!("Subgroups are not supported, subgroup kernel variants will be skipped");
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("probe device"),
                    required_features,
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            log::error!("Uncaptured wgpu error: {error}");
        }));

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            lost_flag.store(true, Ordering::Release);
            log::error!("Device lost: reason {reason:?}: {message}");
        });

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            lost,
        })
    }

    /// Whether the device-lost callback has fired.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn timestamps_supported(&self) -> bool {
        self.device
            .features()
            .contains(wgpu::Features::TIMESTAMP_QUERY)
    }

    pub fn subgroups_supported(&self) -> bool {
        self.device.features().contains(wgpu::Features::SUBGROUP)
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }
}

async fn select_adapter(
    instance: &wgpu::Instance,
    options: &ContextOptions,
) -> Result<wgpu::Adapter> {
    match options.adapter_name {
        Some(ref wanted) => {
            let wanted_lower = wanted.to_lowercase();
            instance
                .enumerate_adapters(options.backends)
                .into_iter()
                .find(|adapter| adapter.get_info().name.to_lowercase().contains(&wanted_lower))
                .ok_or_else(|| Error::AdapterNotFound(wanted.clone()))
        }
        None => instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(Error::NoAdapter),
    }
}
