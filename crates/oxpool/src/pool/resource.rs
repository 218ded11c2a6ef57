use std::cell::Cell;
use std::fmt;
use std::hash::Hash;

use crate::error::{PoolError, Result};

/// Identity of a resource inside one pool.
///
/// Ids are allocated only after the factory succeeds and are never reused
/// by the same pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

impl ResourceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resource that can live in a [`BufferPool`](crate::pool::BufferPool).
///
/// Two resources with equal descriptors are interchangeable. The descriptor
/// must not change while the resource is inside a pool, free or leased.
pub trait PooledResource {
    type Desc: Clone + Eq + Hash + fmt::Debug;

    fn descriptor(&self) -> &Self::Desc;
}

/// Live/released tag for resources whose handle can outlive their release.
#[derive(Debug, Default)]
pub struct Liveness(Cell<bool>);

impl Liveness {
    pub fn is_released(&self) -> bool {
        self.0.get()
    }

    /// `Released` once the owning resource has been destroyed.
    pub fn check(&self) -> Result<()> {
        if self.0.get() {
            Err(PoolError::Released)
        } else {
            Ok(())
        }
    }

    /// Flip to released. Fails if this already happened.
    pub fn mark_released(&self) -> Result<()> {
        self.check()?;
        self.0.set(true);
        Ok(())
    }
}
