pub mod array;

pub use array::{host_array_pool, HostArray, HostArrayDesc, HostArrayPool};
