//! Allocation counters and a point-in-time view of heap usage.

use std::fmt;

/// Operation counters kept by the allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
  pub carved: usize,
  pub reused: usize,
  pub released: usize,
  pub rejected_releases: usize,
  pub out_of_memory: usize,
}

/// Snapshot returned by [`Allocator::stats`](crate::Allocator::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
  /// Allocations served by carving a new block from the arena.
  pub carved: usize,
  /// Allocations served by reusing a free block.
  pub reused: usize,
  pub released: usize,
  /// Releases refused because the handle was invalid or already free.
  pub rejected_releases: usize,
  pub out_of_memory: usize,

  pub blocks: usize,
  pub free_blocks: usize,
  /// Payload bytes of allocated blocks.
  pub allocated_bytes: usize,
  /// Bytes callers actually asked for across allocated blocks.
  pub requested_bytes: usize,
  /// Payload bytes sitting in free blocks.
  pub free_bytes: usize,

  pub arena_cursor: usize,
  pub arena_capacity: usize,
}

impl AllocStats {
  pub(crate) fn from_counters(counters: Counters) -> Self {
    Self {
      carved: counters.carved,
      reused: counters.reused,
      released: counters.released,
      rejected_releases: counters.rejected_releases,
      out_of_memory: counters.out_of_memory,
      ..Self::default()
    }
  }

  /// Bytes lost to rounding and to reusing blocks larger than the request.
  pub fn internal_fragmentation(&self) -> usize {
    self.allocated_bytes.saturating_sub(self.requested_bytes)
  }

  pub fn arena_remaining(&self) -> usize {
    self.arena_capacity.saturating_sub(self.arena_cursor)
  }

  pub fn live_allocations(&self) -> usize {
    self.blocks.saturating_sub(self.free_blocks)
  }
}

impl fmt::Display for AllocStats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "arena {}/{} bytes, {} blocks ({} free), \
       {} allocated / {} requested bytes, {} free bytes",
      self.arena_cursor,
      self.arena_capacity,
      self.blocks,
      self.free_blocks,
      self.allocated_bytes,
      self.requested_bytes,
      self.free_bytes,
    )
  }
}
