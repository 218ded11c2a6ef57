//! # oxpool
//!
//! Descriptor-keyed pools of leased GPU and host buffers for wgpu.
//!
//! A [`BufferPool`] buckets idle resources by descriptor and hands them out
//! as [`Lease`]s. Returning a lease (or dropping it) makes the resource
//! available to the next `rent` with an equal descriptor; `clear_unused`
//! and `dispose` destroy resources through the pool's release callback.
//!
//! ```
//! use oxpool::host::{host_array_pool, HostArrayDesc};
//! use oxpool::PoolOptions;
//!
//! # fn main() -> oxpool::Result<()> {
//! let pool = host_array_pool::<f32>(PoolOptions::labeled("scratch"));
//!
//! let mut lease = pool.rent(&HostArrayDesc::new(256))?;
//! lease.get()?.write()?[0] = 1.0;
//! let first = lease.id();
//! lease.return_to_pool()?;
//!
//! let again = pool.rent(&HostArrayDesc::new(256))?;
//! assert_eq!(again.id(), first);
//! # Ok(())
//! # }
//! ```
//!
//! GPU pools need a device:
//!
//! ```no_run
//! use oxpool::gpu::{init_gpu, ComputeBufferDesc, TextureDesc};
//! use oxpool::PoolOptions;
//!
//! # async fn example() -> oxpool::Result<()> {
//! let gpu = init_gpu().await?;
//! let pools = gpu.pools(PoolOptions::labeled("frame"));
//!
//! let particles = pools.buffers.rent(&ComputeBufferDesc::of::<[f32; 4]>(1024))?;
//! let target = pools
//!     .textures
//!     .rent(&TextureDesc::new(1280, 720, wgpu::TextureFormat::Rgba8Unorm))?;
//!
//! drop((particles, target));
//! pools.clear_unused()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gpu;
pub mod host;
pub mod pool;

pub use error::{PoolError, Result};
pub use pool::{
    BufferPool, Lease, LeaseState, Liveness, PoolOptions, PoolStats, PooledResource, ResourceId,
};
