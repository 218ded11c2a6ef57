use thiserror::Error;

use crate::pool::ResourceId;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Lease for resource {0} has already been returned")]
    InvalidLeaseState(ResourceId),

    #[error("Resource {0} is not currently leased from this pool")]
    ForeignOrDoubleReturn(ResourceId),

    #[error("Resource has already been released")]
    Released,

    #[error("Pool was dropped while the lease was active")]
    PoolDropped,

    #[error("{0} is already borrowed")]
    Busy(&'static str),

    #[error("{} resource release(s) failed; first: {}", .0.len(), first_message(.0))]
    ReleaseFailed(Vec<PoolError>),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

fn first_message(errors: &[PoolError]) -> String {
    errors
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, PoolError>;
