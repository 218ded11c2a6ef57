use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::{debug, error, info, warn};

use crate::error::{PoolError, Result};
use crate::pool::lease::Lease;
use crate::pool::options::{PoolOptions, PoolStats};
use crate::pool::resource::{PooledResource, ResourceId};

type CreateFn<R> = Box<dyn FnMut(&<R as PooledResource>::Desc) -> Result<R>>;
type ReleaseFn<R> = Box<dyn FnMut(&R) -> Result<()>>;

struct Slot<R> {
    id: ResourceId,
    resource: Rc<R>,
}

/// Collections and counters. Never borrowed while a callback runs.
struct PoolState<R: PooledResource> {
    free: AHashMap<R::Desc, Vec<Slot<R>>>,
    reserved: AHashMap<ResourceId, Rc<R>>,
    next_id: u64,
    created: u64,
    released: u64,
}

impl<R: PooledResource> PoolState<R> {
    fn pop_free(&mut self, desc: &R::Desc) -> Option<Slot<R>> {
        let bucket = self.free.get_mut(desc)?;
        let slot = bucket.pop();
        if bucket.is_empty() {
            self.free.remove(desc);
        }
        slot
    }

    fn reserve(&mut self, slot: &Slot<R>) {
        self.reserved.insert(slot.id, Rc::clone(&slot.resource));
    }

    fn admit(&mut self, resource: R) -> Slot<R> {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.created += 1;
        Slot {
            id,
            resource: Rc::new(resource),
        }
    }

    fn park(&mut self, slot: Slot<R>) {
        let desc = slot.resource.descriptor().clone();
        self.free.entry(desc).or_default().push(slot);
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            free: self.free.values().map(Vec::len).sum(),
            reserved: self.reserved.len(),
            buckets: self.free.values().filter(|b| !b.is_empty()).count(),
            created: self.created,
            released: self.released,
        }
    }
}

/// Shared between a pool and its leases.
pub(crate) struct PoolInner<R: PooledResource> {
    options: PoolOptions,
    state: RefCell<PoolState<R>>,
    create: RefCell<CreateFn<R>>,
    release: RefCell<ReleaseFn<R>>,
}

impl<R: PooledResource> PoolInner<R> {
    fn create(&self, desc: &R::Desc) -> Result<R> {
        let mut factory = self
            .create
            .try_borrow_mut()
            .map_err(|_| PoolError::Busy("pool factory"))?;
        let resource = (*factory)(desc)?;
        if resource.descriptor() != desc {
            warn!(
                pool = %self.options.label,
                "factory produced {:?} for requested {:?}",
                resource.descriptor(),
                desc
            );
        }
        Ok(resource)
    }

    /// Move a leased resource back into its free bucket, releasing it instead
    /// when the bucket is at its cap.
    ///
    /// An overflowing return that arrives while the release callback is
    /// already running is parked in the bucket and left for the next sweep.
    pub(crate) fn give_back(&self, id: ResourceId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let resource = state
            .reserved
            .remove(&id)
            .ok_or(PoolError::ForeignOrDoubleReturn(id))?;
        let slot = Slot { id, resource };

        let desc = slot.resource.descriptor();
        let idle = state.free.get(desc).map_or(0, Vec::len);
        let full = self
            .options
            .max_free_per_descriptor
            .is_some_and(|max| idle >= max);
        if !full {
            debug!(pool = %self.options.label, %id, "returned {:?}", desc);
            state.park(slot);
            return Ok(());
        }

        let Ok(mut release) = self.release.try_borrow_mut() else {
            debug!(pool = %self.options.label, %id, "release busy, parking over the cap");
            state.park(slot);
            return Ok(());
        };
        debug!(pool = %self.options.label, %id, "bucket full, releasing {:?}", desc);
        state.released += 1;
        drop(state);

        (*release)(&slot.resource)
    }

    /// Release every resource in `slots`, carrying on past failures.
    fn release_each(
        &self,
        release: &mut ReleaseFn<R>,
        slots: impl IntoIterator<Item = Slot<R>>,
    ) -> Result<usize> {
        let mut attempted = 0;
        let mut failures = Vec::new();

        for slot in slots {
            attempted += 1;
            if let Err(e) = release(&slot.resource) {
                warn!(pool = %self.options.label, id = %slot.id, "release failed: {e}");
                failures.push(e);
            }
        }
        self.state.borrow_mut().released += attempted as u64;

        if failures.is_empty() {
            Ok(attempted)
        } else {
            Err(PoolError::ReleaseFailed(failures))
        }
    }

    fn release_hook(&self) -> Result<RefMut<'_, ReleaseFn<R>>> {
        self.release
            .try_borrow_mut()
            .map_err(|_| PoolError::Busy("pool release callback"))
    }
}

/// Descriptor-keyed pool handing out resources as [`Lease`]s.
///
/// Idle resources are bucketed by descriptor and reused LIFO; a new one is
/// created through the factory only when the matching bucket is empty.
/// Resources are destroyed only through the release callback, either by
/// [`clear_unused`](Self::clear_unused), [`dispose`](Self::dispose), a
/// bounded bucket overflowing, or the pool being dropped.
///
/// The pool is single-threaded: it is neither `Send` nor `Sync`.
pub struct BufferPool<R: PooledResource> {
    inner: Rc<PoolInner<R>>,
}

impl<R: PooledResource> BufferPool<R> {
    /// Build a pool from a factory and a release callback.
    ///
    /// Callbacks run with no pool state borrowed, so they may return or drop
    /// leases of this pool. Re-entering a callback that is already running
    /// fails with [`PoolError::Busy`]: `rent` from inside the factory, or a
    /// sweep from inside the release callback.
    pub fn new<C, D>(create: C, release: D) -> Self
    where
        C: FnMut(&R::Desc) -> Result<R> + 'static,
        D: FnMut(&R) -> Result<()> + 'static,
    {
        Self::with_options(PoolOptions::default(), create, release)
    }

    pub fn with_options<C, D>(options: PoolOptions, create: C, release: D) -> Self
    where
        C: FnMut(&R::Desc) -> Result<R> + 'static,
        D: FnMut(&R) -> Result<()> + 'static,
    {
        Self {
            inner: Rc::new(PoolInner {
                options,
                state: RefCell::new(PoolState {
                    free: AHashMap::new(),
                    reserved: AHashMap::new(),
                    next_id: 0,
                    created: 0,
                    released: 0,
                }),
                create: RefCell::new(Box::new(create)),
                release: RefCell::new(Box::new(release)),
            }),
        }
    }

    /// Lease a resource matching `desc`, reusing an idle one when possible.
    ///
    /// Factory errors propagate and leave the pool unchanged.
    pub fn rent(&self, desc: &R::Desc) -> Result<Lease<R>> {
        let label = &self.inner.options.label;
        let reused = self.inner.state.borrow_mut().pop_free(desc);

        let slot = match reused {
            Some(slot) => {
                debug!(pool = %label, id = %slot.id, "reused {:?}", desc);
                slot
            }
            None => {
                let resource = self.inner.create(desc)?;
                let slot = self.inner.state.borrow_mut().admit(resource);
                debug!(pool = %label, id = %slot.id, "created {:?}", desc);
                slot
            }
        };
        self.inner.state.borrow_mut().reserve(&slot);

        Ok(Lease::new(Rc::downgrade(&self.inner), slot.id, slot.resource))
    }

    /// Release every idle resource. Leased resources are left alone.
    ///
    /// Returns how many resources were released.
    pub fn clear_unused(&self) -> Result<usize> {
        let mut release = self.inner.release_hook()?;
        let free = std::mem::take(&mut self.inner.state.borrow_mut().free);

        let slots = free.into_iter().flat_map(|(_, bucket)| bucket);
        let result = self.inner.release_each(&mut release, slots);

        if let Ok(count) = &result {
            info!(pool = %self.label(), "cleared {count} unused resource(s)");
        }
        result
    }

    /// Release every resource, idle or leased, and empty the pool.
    ///
    /// Leases still outstanding keep a handle to a released resource; using
    /// it is a caller error and returning it yields
    /// [`PoolError::ForeignOrDoubleReturn`]. The pool itself stays usable.
    pub fn dispose(&self) -> Result<usize> {
        let mut release = self.inner.release_hook()?;
        let (free, reserved) = {
            let mut state = self.inner.state.borrow_mut();
            (
                std::mem::take(&mut state.free),
                std::mem::take(&mut state.reserved),
            )
        };

        let slots = free.into_iter().flat_map(|(_, bucket)| bucket).chain(
            reserved
                .into_iter()
                .map(|(id, resource)| Slot { id, resource }),
        );
        let result = self.inner.release_each(&mut release, slots);

        if let Ok(count) = &result {
            info!(pool = %self.label(), "disposed {count} resource(s)");
        }
        result
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.state.borrow().stats()
    }

    /// Idle resources available for `desc`.
    pub fn free_count_for(&self, desc: &R::Desc) -> usize {
        self.inner.state.borrow().free.get(desc).map_or(0, Vec::len)
    }

    pub fn is_reserved(&self, id: ResourceId) -> bool {
        self.inner.state.borrow().reserved.contains_key(&id)
    }

    pub fn label(&self) -> &str {
        &self.inner.options.label
    }
}

impl<R: PooledResource> Drop for BufferPool<R> {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            error!(pool = %self.label(), "dispose on drop failed: {e}");
        }
    }
}

impl<R: PooledResource> fmt::Debug for BufferPool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("label", &self.label())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::mock::{Block, BlockDesc, Journal};

    #[test]
    fn reuses_returned_resource() {
        let journal = Journal::default();
        let pool = journal.pool();

        let mut lease = pool.rent(&BlockDesc::new(4)).unwrap();
        let first = lease.id();
        lease.return_to_pool().unwrap();

        let again = pool.rent(&BlockDesc::new(4)).unwrap();
        assert_eq!(again.id(), first);
        assert_eq!(journal.created(), 1);
    }

    #[test]
    fn factory_error_leaves_pool_untouched() {
        let journal = Journal::default();
        let pool = journal.pool();

        let err = pool.rent(&BlockDesc::new(0)).unwrap_err();
        assert!(matches!(err, PoolError::InvalidDescriptor(_)));
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[test]
    fn foreign_return_is_rejected() {
        let journal = Journal::default();
        let pool = journal.pool();

        let err = pool.inner.give_back(ResourceId(42)).unwrap_err();
        assert!(matches!(err, PoolError::ForeignOrDoubleReturn(ResourceId(42))));
        assert_eq!(pool.stats().free, 0);
    }

    #[test]
    fn direct_double_return_does_not_duplicate_free_entry() {
        let journal = Journal::default();
        let pool = journal.pool();
        let desc = BlockDesc::new(2);

        let lease = pool.rent(&desc).unwrap();
        let id = lease.id();
        drop(lease);

        assert!(pool.inner.give_back(id).is_err());
        assert_eq!(pool.free_count_for(&desc), 1);
    }

    #[test]
    fn bounded_bucket_releases_overflow() {
        let journal = Journal::default();
        let pool = journal.pool_with(PoolOptions {
            max_free_per_descriptor: Some(1),
            ..PoolOptions::labeled("bounded")
        });
        let desc = BlockDesc::new(3);

        let a = pool.rent(&desc).unwrap();
        let b = pool.rent(&desc).unwrap();
        let b_id = b.id();
        drop(a);
        drop(b);

        assert_eq!(pool.free_count_for(&desc), 1);
        assert_eq!(journal.released(), vec![b_id.get()]);
    }

    #[test]
    fn release_failure_does_not_stop_sweep() {
        let journal = Journal::default();
        let pool = journal.pool();

        let leases: Vec<_> = (1..=3)
            .map(|n| pool.rent(&BlockDesc::new(n)).unwrap())
            .collect();
        let poisoned = leases[1].id();
        journal.fail_release_of(poisoned.get());
        drop(leases);

        let err = pool.clear_unused().unwrap_err();
        match err {
            PoolError::ReleaseFailed(failures) => assert_eq!(failures.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(journal.released().len(), 2);
        assert_eq!(pool.stats().free, 0);
        assert_eq!(pool.stats().released, 3);
    }

    #[test]
    fn drop_disposes_everything() {
        let journal = Journal::default();
        let pool = journal.pool();

        let held = pool.rent(&BlockDesc::new(1)).unwrap();
        drop(pool.rent(&BlockDesc::new(2)).unwrap());
        drop(pool);

        assert_eq!(journal.released().len(), 2);
        let block: &Block = held.get().unwrap();
        assert!(block.is_released());
    }

    #[test]
    fn release_callback_may_return_leases_of_the_same_pool() {
        let journal = Journal::default();
        let pool = journal.pool();
        let desc = BlockDesc::new(2);

        let first = pool.rent(&desc).unwrap();
        let second = pool.rent(&desc).unwrap();
        let second_id = second.id();
        journal.drop_on_next_release(second);
        drop(first);

        assert_eq!(pool.clear_unused().unwrap(), 1);
        assert_eq!(pool.free_count_for(&desc), 1);
        assert!(!pool.is_reserved(second_id));

        assert_eq!(pool.clear_unused().unwrap(), 1);
        assert_eq!(journal.released().len(), 2);
    }

    #[test]
    fn overflow_during_release_is_parked_for_the_next_sweep() {
        let journal = Journal::default();
        let pool = journal.pool_with(PoolOptions {
            max_free_per_descriptor: Some(1),
            ..PoolOptions::labeled("bounded")
        });
        let desc = BlockDesc::new(3);

        let a = pool.rent(&desc).unwrap();
        let b = pool.rent(&desc).unwrap();
        let c = pool.rent(&desc).unwrap();
        let b_id = b.id();
        drop(a);
        journal.drop_on_next_release(c);
        drop(b);

        assert_eq!(journal.released(), vec![b_id.get()]);
        assert_eq!(pool.free_count_for(&desc), 2);
        assert_eq!(pool.stats().reserved, 0);

        assert_eq!(pool.clear_unused().unwrap(), 2);
        assert_eq!(journal.released().len(), 3);
    }

    #[test]
    fn sweep_while_release_runs_is_busy() {
        let journal = Journal::default();
        let pool = journal.pool();

        let guard = pool.inner.release_hook().unwrap();
        assert!(matches!(pool.dispose(), Err(PoolError::Busy(_))));
        assert!(matches!(pool.clear_unused(), Err(PoolError::Busy(_))));
        drop(guard);

        drop(pool.rent(&BlockDesc::new(1)).unwrap());
        assert_eq!(pool.dispose().unwrap(), 1);
    }
}
