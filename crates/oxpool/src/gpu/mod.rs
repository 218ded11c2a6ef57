pub mod compute_buffer;
pub mod device;
pub mod pools;
pub mod texture;
pub mod texture_array;

pub use compute_buffer::{ComputeBuffer, ComputeBufferDesc, ComputeBufferPool};
pub use device::{init_gpu, init_gpu_with, GpuContext, GpuRequirements};
pub use pools::GpuPools;
pub use texture::{PooledTexture, TextureDesc, TexturePool};
pub use texture_array::{LayerSource, TextureArray, TextureArrayDesc, TextureArrayPool};
