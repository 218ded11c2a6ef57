use std::sync::Arc;

use wgpu::{TextureFormat, TextureUsages};

use crate::error::{PoolError, Result};
use crate::pool::{BufferPool, Liveness, PoolOptions, PooledResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
    pub mip_level_count: u32,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_DST
                | TextureUsages::COPY_SRC,
            mip_level_count: 1,
        }
    }

    pub fn with_usage(mut self, usage: TextureUsages) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_mips(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count;
        self
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    pub fn validate(&self, limits: &wgpu::Limits, features: wgpu::Features) -> Result<()> {
        validate_extent(self.width, self.height, limits)?;
        if self.usage.is_empty() {
            return Err(PoolError::InvalidDescriptor(
                "texture usage must not be empty".into(),
            ));
        }
        validate_format(self.width, self.height, self.format, self.usage, features)?;
        let max_mips = self.extent().max_mips(wgpu::TextureDimension::D2);
        if self.mip_level_count == 0 || self.mip_level_count > max_mips {
            return Err(PoolError::InvalidDescriptor(format!(
                "mip level count must be in 1..={max_mips}, got {}",
                self.mip_level_count
            )));
        }
        Ok(())
    }
}

/// Shared 2D extent check for textures and texture arrays.
pub(crate) fn validate_extent(width: u32, height: u32, limits: &wgpu::Limits) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(PoolError::InvalidDescriptor(format!(
            "texture extent must be positive, got {width}x{height}"
        )));
    }
    let max = limits.max_texture_dimension_2d;
    if width > max || height > max {
        return Err(PoolError::InvalidDescriptor(format!(
            "texture extent {width}x{height} exceeds device limit of {max}"
        )));
    }
    Ok(())
}

/// Format checks shared by textures and texture arrays: the device must
/// enable the format, the extent must be whole blocks, and every usage must
/// be guaranteed for the format.
pub(crate) fn validate_format(
    width: u32,
    height: u32,
    format: TextureFormat,
    usage: TextureUsages,
    features: wgpu::Features,
) -> Result<()> {
    let required = format.required_features();
    if !features.contains(required) {
        return Err(PoolError::InvalidDescriptor(format!(
            "{format:?} needs device features {required:?}"
        )));
    }

    let (block_w, block_h) = format.block_dimensions();
    if width % block_w != 0 || height % block_h != 0 {
        return Err(PoolError::InvalidDescriptor(format!(
            "{format:?} extent must be a multiple of {block_w}x{block_h}, got {width}x{height}"
        )));
    }

    // Adapter-specific format features can widen the allowed set.
    if features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES) {
        return Ok(());
    }
    let allowed = format.guaranteed_format_features(features).allowed_usages;
    if !allowed.contains(usage) {
        return Err(PoolError::InvalidDescriptor(format!(
            "{format:?} does not support usage {:?}",
            usage - allowed
        )));
    }
    Ok(())
}

/// A pooled 2D texture with its default view.
pub struct PooledTexture {
    desc: TextureDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    liveness: Liveness,
}

impl PooledTexture {
    pub fn create(device: &wgpu::Device, desc: &TextureDesc, label: &str) -> Result<Self> {
        desc.validate(&device.limits(), device.features())?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: desc.extent(),
            mip_level_count: desc.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

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

    pub fn is_released(&self) -> bool {
        self.liveness.is_released()
    }

    pub(crate) fn release(&self) -> Result<()> {
        self.liveness.mark_released()?;
        self.texture.destroy();
        Ok(())
    }
}

impl PooledResource for PooledTexture {
    type Desc = TextureDesc;

    fn descriptor(&self) -> &TextureDesc {
        &self.desc
    }
}

pub type TexturePool = BufferPool<PooledTexture>;

pub fn texture_pool(device: Arc<wgpu::Device>, options: PoolOptions) -> TexturePool {
    let label = options.label.clone();
    BufferPool::with_options(
        options,
        move |desc: &TextureDesc| PooledTexture::create(&device, desc, &label),
        |texture: &PooledTexture| texture.release(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none() -> wgpu::Features {
        wgpu::Features::empty()
    }

    #[test]
    fn rejects_empty_extent() {
        let limits = wgpu::Limits::default();
        let desc = TextureDesc::new(0, 64, TextureFormat::Rgba8Unorm);
        assert!(matches!(
            desc.validate(&limits, none()),
            Err(PoolError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn rejects_extent_over_limit() {
        let limits = wgpu::Limits::default();
        let too_wide = limits.max_texture_dimension_2d + 1;
        let desc = TextureDesc::new(too_wide, 1, TextureFormat::R32Float);
        assert!(desc.validate(&limits, none()).is_err());
    }

    #[test]
    fn mip_count_is_bounded_by_extent() {
        let limits = wgpu::Limits::default();
        let base = TextureDesc::new(256, 64, TextureFormat::Rgba8Unorm);
        assert!(base.with_mips(9).validate(&limits, none()).is_ok());
        assert!(base.with_mips(10).validate(&limits, none()).is_err());
        assert!(base.with_mips(0).validate(&limits, none()).is_err());
    }

    #[test]
    fn compressed_formats_need_the_feature_and_whole_blocks() {
        let limits = wgpu::Limits::default();
        let bc = wgpu::Features::TEXTURE_COMPRESSION_BC;

        let whole = TextureDesc::new(4, 4, TextureFormat::Bc1RgbaUnorm);
        let partial = TextureDesc::new(3, 3, TextureFormat::Bc1RgbaUnorm);

        assert!(whole.validate(&limits, bc).is_ok());
        assert!(matches!(
            whole.validate(&limits, none()),
            Err(PoolError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            partial.validate(&limits, bc),
            Err(PoolError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn usage_must_be_supported_by_the_format() {
        let limits = wgpu::Limits::default();
        let storage = TextureUsages::STORAGE_BINDING | TextureUsages::COPY_SRC;

        let linear = TextureDesc::new(64, 64, TextureFormat::Rgba8Unorm).with_usage(storage);
        let srgb = TextureDesc::new(64, 64, TextureFormat::Rgba8UnormSrgb).with_usage(storage);

        assert!(linear.validate(&limits, none()).is_ok());
        assert!(matches!(
            srgb.validate(&limits, none()),
            Err(PoolError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn format_is_part_of_the_key() {
        let a = TextureDesc::new(32, 32, TextureFormat::Rgba8Unorm);
        let b = TextureDesc::new(32, 32, TextureFormat::Bgra8Unorm);
        assert_ne!(a, b);
    }
}
