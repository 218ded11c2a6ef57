use std::sync::Arc;

use bytemuck::Pod;
use wgpu::BufferUsages;

use crate::error::{PoolError, Result};
use crate::pool::{BufferPool, Liveness, PoolOptions, PooledResource};

/// Shape of a structured GPU buffer: `count` elements of `stride` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputeBufferDesc {
    pub count: u32,
    pub stride: u32,
    pub usage: BufferUsages,
}

impl ComputeBufferDesc {
    pub fn new(count: u32, stride: u32) -> Self {
        Self {
            count,
            stride,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        }
    }

    /// Buffer of `count` elements of `T`.
    pub fn of<T: Pod>(count: u32) -> Self {
        Self::new(count, std::mem::size_of::<T>() as u32)
    }

    pub fn with_usage(mut self, usage: BufferUsages) -> Self {
        self.usage = usage;
        self
    }

    pub fn byte_size(&self) -> u64 {
        self.count as u64 * self.stride as u64
    }

    /// Check the descriptor against what `device` would accept, so invalid
    /// shapes fail here instead of in wgpu's validation layer.
    pub fn validate(&self, limits: &wgpu::Limits, features: wgpu::Features) -> Result<()> {
        if self.count == 0 {
            return Err(PoolError::InvalidDescriptor(
                "compute buffer count must be positive".into(),
            ));
        }
        if self.stride == 0 || self.stride % 4 != 0 {
            return Err(PoolError::InvalidDescriptor(format!(
                "compute buffer stride must be a positive multiple of 4, got {}",
                self.stride
            )));
        }
        if self.usage.is_empty() {
            return Err(PoolError::InvalidDescriptor(
                "compute buffer usage must not be empty".into(),
            ));
        }
        if self.byte_size() > limits.max_buffer_size {
            return Err(PoolError::InvalidDescriptor(format!(
                "compute buffer of {} bytes exceeds device limit of {}",
                self.byte_size(),
                limits.max_buffer_size
            )));
        }
        self.validate_map_usage(features)
    }

    /// Mappable buffers may only be copy endpoints unless the device has
    /// `MAPPABLE_PRIMARY_BUFFERS`.
    fn validate_map_usage(&self, features: wgpu::Features) -> Result<()> {
        if features.contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS) {
            return Ok(());
        }
        let read_only = BufferUsages::MAP_READ | BufferUsages::COPY_DST;
        let write_only = BufferUsages::MAP_WRITE | BufferUsages::COPY_SRC;

        if (self.usage.contains(BufferUsages::MAP_READ) && !read_only.contains(self.usage))
            || (self.usage.contains(BufferUsages::MAP_WRITE) && !write_only.contains(self.usage))
        {
            return Err(PoolError::InvalidDescriptor(format!(
                "mappable buffer usage {:?} needs MAPPABLE_PRIMARY_BUFFERS",
                self.usage
            )));
        }
        Ok(())
    }
}

/// A pooled structured GPU buffer.
pub struct ComputeBuffer {
    desc: ComputeBufferDesc,
    buffer: wgpu::Buffer,
    liveness: Liveness,
}

impl ComputeBuffer {
    pub fn create(device: &wgpu::Device, desc: &ComputeBufferDesc, label: &str) -> Result<Self> {
        desc.validate(&device.limits(), device.features())?;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: align_size(desc.byte_size()),
            usage: desc.usage,
            mapped_at_creation: false,
        });

        Ok(Self {
            desc: *desc,
            buffer,
            liveness: Liveness::default(),
        })
    }

    pub fn buffer(&self) -> Result<&wgpu::Buffer> {
        self.liveness.check()?;
        Ok(&self.buffer)
    }

    pub fn binding(&self) -> Result<wgpu::BindingResource<'_>> {
        Ok(self.buffer()?.as_entire_binding())
    }

    /// Upload `data` starting at element `start`.
    pub fn write<T: Pod>(&self, queue: &wgpu::Queue, start: u32, data: &[T]) -> Result<()> {
        let buffer = self.buffer()?;

        if std::mem::size_of::<T>() != self.desc.stride as usize {
            return Err(PoolError::Gpu(format!(
                "element size {} does not match stride {}",
                std::mem::size_of::<T>(),
                self.desc.stride
            )));
        }
        if start as u64 + data.len() as u64 > self.desc.count as u64 {
            return Err(PoolError::Gpu(format!(
                "write of {} elements at {start} overruns buffer of {}",
                data.len(),
                self.desc.count
            )));
        }
        if !self.desc.usage.contains(BufferUsages::COPY_DST) {
            return Err(PoolError::Gpu("buffer was created without COPY_DST".into()));
        }

        let offset = start as u64 * self.desc.stride as u64;
        queue.write_buffer(buffer, offset, bytemuck::cast_slice(data));
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.liveness.is_released()
    }

    pub(crate) fn release(&self) -> Result<()> {
        self.liveness.mark_released()?;
        self.buffer.destroy();
        Ok(())
    }
}

impl PooledResource for ComputeBuffer {
    type Desc = ComputeBufferDesc;

    fn descriptor(&self) -> &ComputeBufferDesc {
        &self.desc
    }
}

pub type ComputeBufferPool = BufferPool<ComputeBuffer>;

/// Pool of compute buffers allocated on `device`.
pub fn compute_buffer_pool(device: Arc<wgpu::Device>, options: PoolOptions) -> ComputeBufferPool {
    let label = options.label.clone();
    BufferPool::with_options(
        options,
        move |desc: &ComputeBufferDesc| ComputeBuffer::create(&device, desc, &label),
        |buffer: &ComputeBuffer| buffer.release(),
    )
}

/// Round up to the copy alignment wgpu requires for buffer sizes.
fn align_size(size: u64) -> u64 {
    let alignment = wgpu::COPY_BUFFER_ALIGNMENT;
    size.max(alignment).div_ceil(alignment) * alignment
}
