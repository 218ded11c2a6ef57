//! Counting resource used by the unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::PoolError;
use crate::pool::{BufferPool, Lease, PoolOptions, PooledResource};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockDesc {
    pub count: usize,
}

impl BlockDesc {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

#[derive(Debug)]
pub struct Block {
    desc: BlockDesc,
    serial: u64,
    released: Cell<bool>,
}

impl Block {
    pub fn is_released(&self) -> bool {
        self.released.get()
    }
}

impl PooledResource for Block {
    type Desc = BlockDesc;

    fn descriptor(&self) -> &BlockDesc {
        &self.desc
    }
}

#[derive(Default)]
struct Entries {
    created: u64,
    released: Vec<u64>,
    fail: Option<u64>,
    held: Vec<Lease<Block>>,
}

/// Records factory and release calls made by a pool.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Rc<RefCell<Entries>>,
}

impl Journal {
    pub fn pool(&self) -> BufferPool<Block> {
        self.pool_with(PoolOptions::labeled("test"))
    }

    pub fn pool_with(&self, options: PoolOptions) -> BufferPool<Block> {
        let on_create = self.clone();
        let on_release = self.clone();

        BufferPool::with_options(
            options,
            move |desc: &BlockDesc| {
                if desc.count == 0 {
                    return Err(PoolError::InvalidDescriptor(
                        "count must be positive".into(),
                    ));
                }
                let mut entries = on_create.entries.borrow_mut();
                let serial = entries.created;
                entries.created += 1;
                Ok(Block {
                    desc: desc.clone(),
                    serial,
                    released: Cell::new(false),
                })
            },
            move |block: &Block| {
                let held = std::mem::take(&mut on_release.entries.borrow_mut().held);
                drop(held);

                let mut entries = on_release.entries.borrow_mut();
                if entries.fail == Some(block.serial) {
                    return Err(PoolError::Gpu("injected release failure".into()));
                }
                block.released.set(true);
                entries.released.push(block.serial);
                Ok(())
            },
        )
    }

    pub fn created(&self) -> u64 {
        self.entries.borrow().created
    }

    pub fn released(&self) -> Vec<u64> {
        self.entries.borrow().released.clone()
    }

    pub fn fail_release_of(&self, serial: u64) {
        self.entries.borrow_mut().fail = Some(serial);
    }

    /// Keep `lease` alive until the next release callback, which drops it.
    pub fn drop_on_next_release(&self, lease: Lease<Block>) {
        self.entries.borrow_mut().held.push(lease);
    }
}
