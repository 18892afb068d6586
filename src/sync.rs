//! Sharing one heap between execution contexts.
//!
//! [`Allocator`] itself assumes it is never re-entered. When more than one
//! context needs the same heap, wrap it in a [`LockedAllocator`]: every
//! allocate and release then runs start to finish under a single lock.

use parking_lot::{Mutex, MutexGuard};

use crate::{
  allocator::Allocator,
  block::Handle,
  error::Result,
  stats::AllocStats,
};

/// The two operations heap consumers are written against.
pub trait HeapAllocator {
  fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Handle>;

  fn release(
    &mut self,
    handle: Handle,
  ) -> Result<()>;
}

impl HeapAllocator for Allocator {
  fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Handle> {
    Allocator::allocate(self, size)
  }

  fn release(
    &mut self,
    handle: Handle,
  ) -> Result<()> {
    Allocator::release(self, handle)
  }
}

/// An [`Allocator`] behind a mutex.
#[derive(Debug, Default)]
pub struct LockedAllocator {
  inner: Mutex<Allocator>,
}

impl LockedAllocator {
  pub fn new(allocator: Allocator) -> Self {
    Self {
      inner: Mutex::new(allocator),
    }
  }

  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<Handle> {
    self.inner.lock().allocate(size)
  }

  pub fn release(
    &self,
    handle: Handle,
  ) -> Result<()> {
    self.inner.lock().release(handle)
  }

  pub fn stats(&self) -> AllocStats {
    self.inner.lock().stats()
  }

  /// Holds the lock for several operations, e.g. to fill a payload right
  /// after allocating it.
  pub fn lock(&self) -> MutexGuard<'_, Allocator> {
    self.inner.lock()
  }

  pub fn into_inner(self) -> Allocator {
    self.inner.into_inner()
  }
}

impl HeapAllocator for &LockedAllocator {
  fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Handle> {
    LockedAllocator::allocate(self, size)
  }

  fn release(
    &mut self,
    handle: Handle,
  ) -> Result<()> {
    LockedAllocator::release(self, handle)
  }
}
