pub mod buffer_pool;
pub mod lease;
pub mod options;
pub mod resource;

#[cfg(test)]
pub(crate) mod mock;

pub use buffer_pool::BufferPool;
pub use lease::{Lease, LeaseState};
pub use options::{PoolOptions, PoolStats};
pub use resource::{Liveness, PooledResource, ResourceId};
