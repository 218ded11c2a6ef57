use std::sync::Arc;

use tracing::info;

use crate::error::{PoolError, Result};
use crate::gpu::compute_buffer::{compute_buffer_pool, ComputeBufferPool};
use crate::gpu::texture::{texture_pool, TexturePool};
use crate::gpu::texture_array::{texture_array_pool, TextureArrayPool};
use crate::pool::{PoolOptions, PoolStats};

/// One pool per GPU resource kind, owned by the application.
///
/// Build it once next to the device and pass it to the code that renders.
/// Dropping it disposes every pool.
pub struct GpuPools {
    pub buffers: ComputeBufferPool,
    pub textures: TexturePool,
    pub texture_arrays: TextureArrayPool,
}

impl GpuPools {
    /// `options.label` is used as a prefix for each pool's label.
    pub fn new(device: &Arc<wgpu::Device>, options: PoolOptions) -> Self {
        let child = |kind: &str| PoolOptions {
            label: format!("{}.{kind}", options.label),
            ..options.clone()
        };

        Self {
            buffers: compute_buffer_pool(Arc::clone(device), child("buffers")),
            textures: texture_pool(Arc::clone(device), child("textures")),
            texture_arrays: texture_array_pool(Arc::clone(device), child("texture_arrays")),
        }
    }

    /// Release idle resources in every pool.
    pub fn clear_unused(&self) -> Result<usize> {
        let released = merge([
            self.buffers.clear_unused(),
            self.textures.clear_unused(),
            self.texture_arrays.clear_unused(),
        ])?;
        info!("released {released} idle GPU resource(s)");
        Ok(released)
    }

    /// Release everything in every pool.
    pub fn dispose(&self) -> Result<usize> {
        merge([
            self.buffers.dispose(),
            self.textures.dispose(),
            self.texture_arrays.dispose(),
        ])
    }

    pub fn stats(&self) -> [(&'static str, PoolStats); 3] {
        [
            ("buffers", self.buffers.stats()),
            ("textures", self.textures.stats()),
            ("texture_arrays", self.texture_arrays.stats()),
        ]
    }
}

/// Sum sweep counts, folding every failure into one `ReleaseFailed`.
fn merge<const N: usize>(results: [Result<usize>; N]) -> Result<usize> {
    let mut total = 0;
    let mut failures = Vec::new();

    for result in results {
        match result {
            Ok(count) => total += count,
            Err(PoolError::ReleaseFailed(errors)) => failures.extend(errors),
            Err(e) => failures.push(e),
        }
    }

    if failures.is_empty() {
        Ok(total)
    } else {
        Err(PoolError::ReleaseFailed(failures))
    }
}
