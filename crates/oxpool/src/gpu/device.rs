use std::sync::Arc;

use tracing::info;

use crate::error::{PoolError, Result};
use crate::gpu::pools::GpuPools;
use crate::pool::PoolOptions;

pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Pools for every GPU resource kind on this device.
    pub fn pools(&self, options: PoolOptions) -> GpuPools {
        GpuPools::new(&self.device, options)
    }
}

/// Minimum adapter capabilities for the pools to be useful.
///
/// The device is opened with the adapter's own values for the pooled-resource
/// limits, so descriptors are bounded by the hardware rather than by these
/// minimums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuRequirements {
    pub max_buffer_size: u64,
    pub max_texture_dimension_2d: u32,
    pub max_texture_array_layers: u32,
    pub features: wgpu::Features,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for GpuRequirements {
    fn default() -> Self {
        let floor = wgpu::Limits::downlevel_defaults();
        Self {
            max_buffer_size: floor.max_buffer_size,
            max_texture_dimension_2d: floor.max_texture_dimension_2d,
            max_texture_array_layers: floor.max_texture_array_layers,
            features: wgpu::Features::empty(),
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

impl GpuRequirements {
    /// Every shortfall of `limits`/`features` against these requirements,
    /// reported together.
    pub fn check(&self, limits: &wgpu::Limits, features: wgpu::Features) -> Result<()> {
        let mut missing = Vec::new();

        if limits.max_buffer_size < self.max_buffer_size {
            missing.push(format!(
                "max_buffer_size {} < {}",
                limits.max_buffer_size, self.max_buffer_size
            ));
        }
        if limits.max_texture_dimension_2d < self.max_texture_dimension_2d {
            missing.push(format!(
                "max_texture_dimension_2d {} < {}",
                limits.max_texture_dimension_2d, self.max_texture_dimension_2d
            ));
        }
        if limits.max_texture_array_layers < self.max_texture_array_layers {
            missing.push(format!(
                "max_texture_array_layers {} < {}",
                limits.max_texture_array_layers, self.max_texture_array_layers
            ));
        }
        if !features.contains(self.features) {
            missing.push(format!("features {:?}", self.features));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Gpu(format!(
                "adapter falls short: {}",
                missing.join(", ")
            )))
        }
    }

    /// Limits to open the device with: downlevel defaults, with the limits
    /// the pools validate against raised to what the adapter offers.
    fn device_limits(&self, adapter: &wgpu::Limits) -> wgpu::Limits {
        wgpu::Limits {
            max_buffer_size: adapter.max_buffer_size,
            max_storage_buffer_binding_size: adapter.max_storage_buffer_binding_size,
            max_texture_dimension_2d: adapter.max_texture_dimension_2d,
            max_texture_array_layers: adapter.max_texture_array_layers,
            ..wgpu::Limits::downlevel_defaults()
        }
    }
}

/// Open a device with the default [`GpuRequirements`].
pub async fn init_gpu() -> Result<GpuContext> {
    init_gpu_with(&GpuRequirements::default()).await
}

/// Pick an adapter, check it against `requirements`, and open a device.
pub async fn init_gpu_with(requirements: &GpuRequirements) -> Result<GpuContext> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: requirements.power_preference,
            ..Default::default()
        })
        .await
        .map_err(|e| PoolError::Gpu(format!("no usable adapter: {e}")))?;

    let adapter_limits = adapter.limits();
    requirements.check(&adapter_limits, adapter.features())?;

    let info = adapter.get_info();
    info!(
        adapter = %info.name,
        backend = ?info.backend,
        max_buffer_size = adapter_limits.max_buffer_size,
        max_texture_array_layers = adapter_limits.max_texture_array_layers,
        "opening device"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("oxpool"),
            required_features: requirements.features,
            required_limits: requirements.device_limits(&adapter_limits),
            ..Default::default()
        })
        .await?;

    Ok(GpuContext {
        device: Arc::new(device),
        queue: Arc::new(queue),
    })
}
