use std::ops::Range;

use tracing::debug;

use crate::error::{AllocError, Result};

/// Fixed-capacity byte region carved by a monotonic cursor.
///
/// ```text
///   ┌─────┬─────────┬─────────┬──────────────────────────────┐
///   │ B0  │   B1    │   B2    │          untouched           │
///   └─────┴─────────┴─────────┴──────────────────────────────┘
///   0                         ▲                              ▲
///                           cursor                       capacity
/// ```
///
/// Nothing handed out by [`Arena::reserve`] is ever given back, so the cursor
/// only moves forward.
pub struct Arena {
  bytes: Box<[u8]>,
  cursor: usize,
}

impl Arena {
  /// Capacity comes from a validated `HeapConfig`; nothing else builds one.
  pub(crate) fn new(capacity: usize) -> Self {
    Self {
      bytes: vec![0; capacity].into_boxed_slice(),
      cursor: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.bytes.len()
  }

  /// Bytes consumed so far.
  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn remaining(&self) -> usize {
    self.capacity() - self.cursor
  }

  /// Hands out `[cursor, cursor + n)` and bumps the cursor past it.
  ///
  /// On failure the cursor is left where it was.
  pub fn reserve(
    &mut self,
    n: usize,
  ) -> Result<Range<usize>> {
    let available = self.remaining();
    if n > available {
      debug!(requested = n, available, "arena exhausted");
      return Err(AllocError::OutOfMemory {
        requested: n,
        available,
      });
    }

    let start = self.cursor;
    self.cursor += n;
    Ok(start..self.cursor)
  }

  /// Bytes of a previously reserved range.
  pub(crate) fn bytes(
    &self,
    range: Range<usize>,
  ) -> &[u8] {
    &self.bytes[range]
  }

  pub(crate) fn bytes_mut(
    &mut self,
    range: Range<usize>,
  ) -> &mut [u8] {
    &mut self.bytes[range]
  }
}

impl std::fmt::Debug for Arena {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    f.debug_struct("Arena")
      .field("capacity", &self.capacity())
      .field("cursor", &self.cursor)
      .finish()
  }
}
