use std::sync::Arc;

use tracing::warn;
use wgpu::{TextureFormat, TextureUsages};

use crate::error::{PoolError, Result};
use crate::gpu::texture::{validate_extent, validate_format};
use crate::pool::{BufferPool, Liveness, PoolOptions, PooledResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureArrayDesc {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

impl TextureArrayDesc {
    pub fn new(width: u32, height: u32, layers: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            layers,
            format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        }
    }

    pub fn with_usage(mut self, usage: TextureUsages) -> Self {
        self.usage = usage;
        self
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.layers,
        }
    }

    pub fn validate(&self, limits: &wgpu::Limits, features: wgpu::Features) -> Result<()> {
        validate_extent(self.width, self.height, limits)?;
        if self.layers == 0 || self.layers > limits.max_texture_array_layers {
            return Err(PoolError::InvalidDescriptor(format!(
                "layer count must be in 1..={}, got {}",
                limits.max_texture_array_layers, self.layers
            )));
        }
        if self.usage.is_empty() {
            return Err(PoolError::InvalidDescriptor(
                "texture array usage must not be empty".into(),
            ));
        }
        validate_format(self.width, self.height, self.format, self.usage, features)
    }

    /// Whether a layer source of this size and format can be copied in.
    pub fn accepts(&self, width: u32, height: u32, format: TextureFormat) -> bool {
        self.width == width && self.height == height && self.format == format
    }

    /// Check `sources` against this array and return how many layers a
    /// populate will write: one per source, capped at `layers`.
    pub fn plan_copy(&self, sources: &[LayerSource]) -> Result<usize> {
        if !self.usage.contains(TextureUsages::COPY_DST) {
            return Err(PoolError::Gpu(
                "texture array was created without COPY_DST".into(),
            ));
        }
        for (i, source) in sources.iter().enumerate() {
            if !self.accepts(source.width, source.height, source.format) {
                return Err(PoolError::InvalidDescriptor(format!(
                    "source {i} is {}x{} {:?}, expected {}x{} {:?}",
                    source.width, source.height, source.format, self.width, self.height, self.format
                )));
            }
            if !source.usage.contains(TextureUsages::COPY_SRC) {
                return Err(PoolError::InvalidDescriptor(format!(
                    "source {i} was created without COPY_SRC"
                )));
            }
            if source.sample_count != 1 {
                return Err(PoolError::InvalidDescriptor(format!(
                    "source {i} is multisampled ({}x)",
                    source.sample_count
                )));
            }
        }

        let layers = self.layers as usize;
        if sources.len() > layers {
            warn!(
                "{} sources supplied for a {}-layer texture array; extra sources ignored",
                sources.len(),
                layers
            );
        }
        Ok(sources.len().min(layers))
    }
}

/// What a populate needs to know about a source texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSource {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
    pub sample_count: u32,
}

impl LayerSource {
    pub fn from_texture(texture: &wgpu::Texture) -> Self {
        Self {
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            usage: texture.usage(),
            sample_count: texture.sample_count(),
        }
    }
}

/// A pooled 2D texture array with a `D2Array` view.
pub struct TextureArray {
    desc: TextureArrayDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    liveness: Liveness,
}

impl TextureArray {
    pub fn create(device: &wgpu::Device, desc: &TextureArrayDesc, label: &str) -> Result<Self> {
        desc.validate(&device.limits(), device.features())?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: desc.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        Ok(Self {
            desc: *desc,
            texture,
            view,
            liveness: Liveness::default(),
        })
    }

    pub fn texture(&self) -> Result<&wgpu::Texture> {
        self.liveness.check()?;
        Ok(&self.texture)
    }

    pub fn view(&self) -> Result<&wgpu::TextureView> {
        self.liveness.check()?;
        Ok(&self.view)
    }

    /// Record copies of `sources` into consecutive layers, starting at 0.
    ///
    /// Sources are checked with [`TextureArrayDesc::plan_copy`]; extra ones
    /// beyond the layer count are skipped with a warning. Returns the number
    /// of layers written.
    pub fn populate(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        sources: &[&wgpu::Texture],
    ) -> Result<usize> {
        let target = self.texture()?;
        let planned: Vec<LayerSource> = sources
            .iter()
            .map(|source| LayerSource::from_texture(source))
            .collect();
        let count = self.desc.plan_copy(&planned)?;

        let copy_size = wgpu::Extent3d {
            width: self.desc.width,
            height: self.desc.height,
            depth_or_array_layers: 1,
        };
        for (layer, source) in sources.iter().take(count).enumerate() {
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: *source,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: target,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                copy_size,
            );
        }
        Ok(count)
    }

    pub fn is_released(&self) -> bool {
        self.liveness.is_released()
    }

    pub(crate) fn release(&self) -> Result<()> {
        self.liveness.mark_released()?;
        self.texture.destroy();
        Ok(())
    }
}

impl PooledResource for TextureArray {
    type Desc = TextureArrayDesc;

    fn descriptor(&self) -> &TextureArrayDesc {
        &self.desc
    }
}

pub type TextureArrayPool = BufferPool<TextureArray>;

pub fn texture_array_pool(device: Arc<wgpu::Device>, options: PoolOptions) -> TextureArrayPool {
    let label = options.label.clone();
    BufferPool::with_options(
        options,
        move |desc: &TextureArrayDesc| TextureArray::create(&device, desc, &label),
        |array: &TextureArray| array.release(),
    )
}
