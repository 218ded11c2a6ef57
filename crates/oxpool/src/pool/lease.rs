use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{error, warn};

use crate::error::{PoolError, Result};
use crate::pool::buffer_pool::PoolInner;
use crate::pool::resource::{PooledResource, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Active,
    Returned,
}

/// Exclusive, temporary use of one pooled resource.
///
/// Returned explicitly with [`return_to_pool`](Self::return_to_pool) or
/// implicitly when dropped. Once returned, the lease gives no further access.
pub struct Lease<R: PooledResource> {
    pool: Weak<PoolInner<R>>,
    id: ResourceId,
    resource: Option<Rc<R>>,
}

impl<R: PooledResource> Lease<R> {
    pub(crate) fn new(pool: Weak<PoolInner<R>>, id: ResourceId, resource: Rc<R>) -> Self {
        Self {
            pool,
            id,
            resource: Some(resource),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn state(&self) -> LeaseState {
        if self.resource.is_some() {
            LeaseState::Active
        } else {
            LeaseState::Returned
        }
    }

    pub fn is_active(&self) -> bool {
        self.resource.is_some()
    }

    /// The leased resource, or `InvalidLeaseState` once returned.
    pub fn get(&self) -> Result<&R> {
        self.resource
            .as_deref()
            .ok_or(PoolError::InvalidLeaseState(self.id))
    }

    /// Hand the resource back to its pool.
    ///
    /// A second call is a caller bug: it fails with `InvalidLeaseState` and
    /// touches nothing.
    pub fn return_to_pool(&mut self) -> Result<()> {
        if self.resource.take().is_none() {
            error!(id = %self.id, "lease returned twice");
            return Err(PoolError::InvalidLeaseState(self.id));
        }

        let pool = self.pool.upgrade().ok_or(PoolError::PoolDropped)?;
        pool.give_back(self.id)
    }
}

impl<R: PooledResource> Drop for Lease<R> {
    fn drop(&mut self) {
        if self.is_active() {
            if let Err(e) = self.return_to_pool() {
                warn!(id = %self.id, "lease dropped without a clean return: {e}");
            }
        }
    }
}

impl<R: PooledResource> fmt::Debug for Lease<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
