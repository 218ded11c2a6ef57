use std::cell::{Ref, RefCell, RefMut};

use bytemuck::Pod;

use crate::error::{PoolError, Result};
use crate::pool::{BufferPool, PoolOptions, PooledResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostArrayDesc {
    pub len: usize,
}

impl HostArrayDesc {
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    pub fn validate(&self) -> Result<()> {
        if self.len == 0 {
            return Err(PoolError::InvalidDescriptor(
                "host array length must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Zero-initialised CPU array of plain-old-data elements.
///
/// `None` storage marks the array as released.
pub struct HostArray<T: Pod> {
    desc: HostArrayDesc,
    data: RefCell<Option<Vec<T>>>,
}

impl<T: Pod> HostArray<T> {
    pub fn create(desc: &HostArrayDesc) -> Result<Self> {
        desc.validate()?;
        Ok(Self {
            desc: *desc,
            data: RefCell::new(Some(vec![T::zeroed(); desc.len])),
        })
    }

    pub fn len(&self) -> usize {
        self.desc.len
    }

    pub fn is_empty(&self) -> bool {
        self.desc.len == 0
    }

    /// A writer holding the data means the array is still live.
    pub fn is_released(&self) -> bool {
        self.data.try_borrow().is_ok_and(|data| data.is_none())
    }

    pub fn read(&self) -> Result<Ref<'_, [T]>> {
        let data = self
            .data
            .try_borrow()
            .map_err(|_| PoolError::Busy("host array"))?;
        Ref::filter_map(data, |data| data.as_deref()).map_err(|_| PoolError::Released)
    }

    pub fn write(&self) -> Result<RefMut<'_, [T]>> {
        let data = self
            .data
            .try_borrow_mut()
            .map_err(|_| PoolError::Busy("host array"))?;
        RefMut::filter_map(data, |data| data.as_deref_mut()).map_err(|_| PoolError::Released)
    }

    pub fn as_bytes(&self) -> Result<Ref<'_, [u8]>> {
        Ok(Ref::map(self.read()?, |data| bytemuck::cast_slice(data)))
    }

    /// Copy `src` into the front of the array.
    pub fn copy_from(&self, src: &[T]) -> Result<()> {
        if src.len() > self.desc.len {
            return Err(PoolError::InvalidDescriptor(format!(
                "{} elements do not fit a host array of {}",
                src.len(),
                self.desc.len
            )));
        }
        let mut data = self.write()?;
        data[..src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Fails with `Busy` while a `read`/`write` guard is alive; the storage
    /// is then freed when the last handle goes away.
    pub(crate) fn release(&self) -> Result<()> {
        let mut data = self
            .data
            .try_borrow_mut()
            .map_err(|_| PoolError::Busy("host array"))?;
        match data.take() {
            Some(_) => Ok(()),
            None => Err(PoolError::Released),
        }
    }
}

impl<T: Pod> PooledResource for HostArray<T> {
    type Desc = HostArrayDesc;

    fn descriptor(&self) -> &HostArrayDesc {
        &self.desc
    }
}

pub type HostArrayPool<T> = BufferPool<HostArray<T>>;

pub fn host_array_pool<T: Pod>(options: PoolOptions) -> HostArrayPool<T> {
    BufferPool::with_options(
        options,
        |desc: &HostArrayDesc| HostArray::create(desc),
        |array: &HostArray<T>| array.release(),
    )
}
