use std::{
  fmt,
  sync::atomic::{AtomicU32, Ordering},
};

use tracing::{trace, warn};
use validator::Validate;

use crate::{
  align::{ALIGNMENT, aligned_size},
  arena::Arena,
  block::{Block, BlockInfo, BlockRegion, BlockState, Handle},
  config::HeapConfig,
  error::{AllocError, ConfigError, InvalidHandleReason, Result},
  stats::{AllocStats, Counters},
};

static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

/// First-fit block allocator over a fixed-capacity arena.
///
/// Every block ever carved stays in a creation-ordered chain. `allocate`
/// reuses the oldest free block that is large enough and otherwise bumps a
/// new block out of the arena; `release` only marks a block free. Blocks are
/// never split, merged, or returned to the arena.
pub struct Allocator {
  owner: u32,
  arena: Arena,
  header_size: usize,
  blocks: Vec<Block>,
  first: Option<usize>,
  last: Option<usize>,
  counters: Counters,
}

impl Allocator {
  /// Builds an allocator from a validated configuration.
  pub fn new(config: HeapConfig) -> std::result::Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self::from_parts(config.capacity, config.header_size))
  }

  /// Arena of `capacity` bytes with the default header reservation.
  ///
  /// The capacity goes through the same validation as [`Allocator::new`].
  pub fn with_capacity(capacity: usize) -> std::result::Result<Self, ConfigError> {
    Self::new(HeapConfig::with_capacity(capacity))
  }

  fn from_parts(
    capacity: usize,
    header_size: usize,
  ) -> Self {
    Self {
      owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
      arena: Arena::new(capacity),
      header_size,
      blocks: Vec::new(),
      first: None,
      last: None,
      counters: Counters::default(),
    }
  }

  pub fn capacity(&self) -> usize {
    self.arena.capacity()
  }

  /// Arena bytes consumed so far, headers included.
  pub fn cursor(&self) -> usize {
    self.arena.cursor()
  }

  pub fn header_size(&self) -> usize {
    self.header_size
  }

  /// Number of blocks ever carved.
  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  fn find_free_block(
    &self,
    size: usize,
  ) -> Option<usize> {
    let mut current = self.first;

    while let Some(index) = current {
      let block = &self.blocks[index];
      if block.is_free() && block.size() >= size {
        return Some(index);
      }
      current = block.next;
    }

    None
  }

  /// Hands out a block with at least `size` usable bytes.
  ///
  /// The oldest free block that fits wins, even if a tighter one exists, and
  /// it keeps its original size. Only when no free block fits is a new one
  /// carved from the arena.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Handle> {
    let Some(aligned) = aligned_size(size) else {
      return Err(self.out_of_memory(size));
    };

    if let Some(index) = self.find_free_block(aligned) {
      let block = &mut self.blocks[index];
      block.state = BlockState::Allocated;
      block.requested = size;
      self.counters.reused += 1;

      let handle = Handle::new(self.owner, index as u32);
      trace!(
        %handle,
        requested = size,
        block_size = block.size(),
        "reused free block"
      );
      return Ok(handle);
    }

    let Some(total) = self.header_size.checked_add(aligned) else {
      return Err(self.out_of_memory(size));
    };
    let Ok(index) = u32::try_from(self.blocks.len()) else {
      return Err(self.out_of_memory(total));
    };

    let range = match self.arena.reserve(total) {
      Ok(range) => range,
      Err(err) => {
        self.counters.out_of_memory += 1;
        return Err(err);
      }
    };

    let region = BlockRegion {
      offset: range.start,
      payload_offset: range.start + self.header_size,
      size: aligned,
    };
    self.blocks.push(Block::new(region, size));

    let position = index as usize;
    match self.last {
      Some(last) => self.blocks[last].next = Some(position),
      None => self.first = Some(position),
    }
    self.last = Some(position);
    self.counters.carved += 1;

    let handle = Handle::new(self.owner, index);
    trace!(
      %handle,
      requested = size,
      offset = region.offset,
      block_size = aligned,
      cursor = self.arena.cursor(),
      "carved new block"
    );
    Ok(handle)
  }

  fn out_of_memory(
    &mut self,
    requested: usize,
  ) -> AllocError {
    self.counters.out_of_memory += 1;
    AllocError::OutOfMemory {
      requested,
      available: self.arena.remaining(),
    }
  }

  /// Marks the block free so a later `allocate` may reuse it.
  ///
  /// Releasing a handle from another allocator, one that was never issued, or
  /// one whose block is already free is refused without touching the heap.
  pub fn release(
    &mut self,
    handle: Handle,
  ) -> Result<()> {
    let index = match self.find_block(handle) {
      Ok(index) => index,
      Err(err) => return Err(self.reject_release(err)),
    };

    let block = &mut self.blocks[index];
    if block.is_free() {
      let err = AllocError::invalid(handle, InvalidHandleReason::AlreadyFree);
      return Err(self.reject_release(err));
    }

    block.state = BlockState::Free;
    block.requested = 0;
    self.counters.released += 1;
    trace!(%handle, block_size = block.size(), "released block");
    Ok(())
  }

  fn reject_release(
    &mut self,
    err: AllocError,
  ) -> AllocError {
    self.counters.rejected_releases += 1;
    warn!(error = %err, "release rejected");
    err
  }

  fn find_block(
    &self,
    handle: Handle,
  ) -> Result<usize> {
    if handle.owner() != self.owner {
      return Err(AllocError::invalid(
        handle,
        InvalidHandleReason::ForeignAllocator,
      ));
    }

    let index = handle.index();
    if index >= self.blocks.len() {
      return Err(AllocError::invalid(
        handle,
        InvalidHandleReason::UnknownIndex,
      ));
    }

    Ok(index)
  }

  fn find_live_block(
    &self,
    handle: Handle,
  ) -> Result<&Block> {
    let block = &self.blocks[self.find_block(handle)?];
    if block.is_free() {
      return Err(AllocError::invalid(handle, InvalidHandleReason::Released));
    }
    Ok(block)
  }

  /// Location of the block behind `handle`, whether allocated or free.
  pub fn region(
    &self,
    handle: Handle,
  ) -> Result<BlockRegion> {
    Ok(self.blocks[self.find_block(handle)?].region)
  }

  pub fn state(
    &self,
    handle: Handle,
  ) -> Result<BlockState> {
    Ok(self.blocks[self.find_block(handle)?].state)
  }

  /// Payload bytes of a live block. The slice spans the whole block, which
  /// may be larger than the request that obtained it.
  pub fn payload(
    &self,
    handle: Handle,
  ) -> Result<&[u8]> {
    let region = self.find_live_block(handle)?.region;
    Ok(self.arena.bytes(region.payload_offset..region.end()))
  }

  pub fn payload_mut(
    &mut self,
    handle: Handle,
  ) -> Result<&mut [u8]> {
    let region = self.find_live_block(handle)?.region;
    Ok(self.arena.bytes_mut(region.payload_offset..region.end()))
  }

  /// Walks the block chain in creation order.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      allocator: self,
      current: self.first,
    }
  }

  pub fn stats(&self) -> AllocStats {
    let mut stats = AllocStats::from_counters(self.counters);
    stats.arena_cursor = self.arena.cursor();
    stats.arena_capacity = self.arena.capacity();

    for block in &self.blocks {
      stats.blocks += 1;
      if block.is_free() {
        stats.free_blocks += 1;
        stats.free_bytes += block.size();
      } else {
        stats.allocated_bytes += block.size();
        stats.requested_bytes += block.requested;
      }
    }

    stats
  }

  /// Verifies the block metadata against the arena.
  ///
  /// The chain must visit every record exactly once in creation order, each
  /// block must hold a positive multiple of the alignment unit, and regions
  /// must be disjoint and lie below the arena cursor.
  pub fn check_invariants(&self) -> Result<()> {
    let corrupted = |msg: String| Err(AllocError::Corrupted(msg));

    if self.arena.cursor() > self.arena.capacity() {
      return corrupted(format!(
        "cursor {} past capacity {}",
        self.arena.cursor(),
        self.arena.capacity()
      ));
    }

    let mut expected = 0;
    let mut previous_end = 0;
    let mut current = self.first;

    while let Some(index) = current {
      if index != expected {
        return corrupted(format!(
          "chain reached block {index}, expected {expected}"
        ));
      }
      let Some(block) = self.blocks.get(index) else {
        return corrupted(format!(
          "chain points past the registry at {index}"
        ));
      };

      let region = block.region;
      if region.size == 0 || region.size % ALIGNMENT != 0 {
        return corrupted(format!(
          "block {index} has unaligned size {}",
          region.size
        ));
      }
      if region.payload_offset != region.offset + self.header_size {
        return corrupted(format!(
          "block {index} payload does not follow its header"
        ));
      }
      if region.offset < previous_end {
        return corrupted(format!("block {index} overlaps its predecessor"));
      }
      if region.end() > self.arena.cursor() {
        return corrupted(format!(
          "block {index} extends past the arena cursor"
        ));
      }

      previous_end = region.end();
      expected += 1;
      current = block.next;
    }

    if expected != self.blocks.len() {
      return corrupted(format!(
        "chain covers {expected} of {} blocks",
        self.blocks.len()
      ));
    }
    if self.last != self.blocks.len().checked_sub(1) {
      return corrupted(
        "chain tail does not match the newest block".to_string(),
      );
    }

    Ok(())
  }
}

impl Default for Allocator {
  fn default() -> Self {
    let config = HeapConfig::default();
    Self::from_parts(config.capacity, config.header_size)
  }
}

impl fmt::Debug for Allocator {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Allocator")
      .field("owner", &self.owner)
      .field("arena", &self.arena)
      .field("header_size", &self.header_size)
      .field("blocks", &self.blocks.len())
      .finish()
  }
}

/// Heap dump: a summary line, then one line per block.
impl fmt::Display for Allocator {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "{}", self.stats())?;
    for info in self.blocks() {
      writeln!(
        f,
        "  {:>6} @{:<8} payload {:>8}..{:<8} {:>8} bytes  {}",
        info.handle,
        info.region.offset,
        info.region.payload_offset,
        info.region.end(),
        info.region.size,
        info.state,
      )?;
    }
    Ok(())
  }
}

/// Iterator returned by [`Allocator::blocks`].
pub struct Blocks<'a> {
  allocator: &'a Allocator,
  current: Option<usize>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<Self::Item> {
    let index = self.current?;
    let block = self.allocator.blocks.get(index)?;
    self.current = block.next;

    Some(BlockInfo {
      handle: Handle::new(self.allocator.owner, index as u32),
      region: block.region,
      state: block.state,
    })
  }
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;

  fn allocator(
    capacity: usize,
    header_size: usize,
  ) -> Allocator {
    let config = HeapConfig::with_capacity(capacity).header_size(header_size);
    Allocator::new(config).unwrap()
  }

  #[test]
  fn test_alloc() {
    let mut allocator = Allocator::with_capacity(1024).unwrap();

    let first = allocator.allocate(8).unwrap();
    allocator
      .payload_mut(first)
      .unwrap()
      .copy_from_slice(&3u64.to_le_bytes());

    let size: usize = 6;
    let second = allocator.allocate(size * 2).unwrap();
    for (i, chunk) in allocator.payload_mut(second).unwrap()[..size * 2]
      .chunks_exact_mut(2)
      .enumerate()
    {
      chunk.copy_from_slice(&((i + 1) as u16).to_le_bytes());
    }

    assert_eq!(allocator.payload(first).unwrap(), &3u64.to_le_bytes());
    for (i, chunk) in allocator.payload(second).unwrap()[..size * 2]
      .chunks_exact(2)
      .enumerate()
    {
      assert_eq!(u16::from_le_bytes([chunk[0], chunk[1]]), (i + 1) as u16);
    }

    allocator.release(first).unwrap();

    let third = allocator.allocate(4).unwrap();
    assert_eq!(first, third);

    allocator.release(third).unwrap();

    let fourth = allocator.allocate(16).unwrap();
    let fourth_offset = allocator.region(fourth).unwrap().offset;
    assert!(fourth_offset > allocator.region(third).unwrap().offset);
    allocator.check_invariants().unwrap();
  }

  #[test]
  fn test_zero_sized_request_gets_a_unit() {
    let mut allocator = allocator(64, 0);

    let handle = allocator.allocate(0).unwrap();

    assert_eq!(allocator.region(handle).unwrap().size, ALIGNMENT);
    assert_eq!(allocator.cursor(), ALIGNMENT);
  }

  #[test]
  fn test_header_precedes_payload() {
    let mut allocator = allocator(64, 8);

    let a = allocator.allocate(8).unwrap();
    let b = allocator.allocate(16).unwrap();

    assert_eq!(
      allocator.region(a).unwrap(),
      BlockRegion {
        offset: 0,
        payload_offset: 8,
        size: 8,
      }
    );
    assert_eq!(allocator.region(b).unwrap().offset, 16);
    assert_eq!(allocator.region(b).unwrap().payload_offset, 24);
    assert_eq!(allocator.cursor(), 40);
  }

  #[test]
  fn test_first_fit_prefers_oldest_block() {
    let mut allocator = allocator(256, 0);

    let big = allocator.allocate(32).unwrap();
    let _keep = allocator.allocate(8).unwrap();
    let small = allocator.allocate(8).unwrap();
    allocator.release(big).unwrap();
    allocator.release(small).unwrap();

    // `small` would be the tighter fit, but `big` is older.
    let handle = allocator.allocate(8).unwrap();

    assert_eq!(handle, big);
    assert_eq!(allocator.region(handle).unwrap().size, 32);
    assert_eq!(allocator.state(small).unwrap(), BlockState::Free);
  }

  #[test]
  fn test_free_block_too_small_is_skipped() {
    let mut allocator = allocator(256, 0);

    let small = allocator.allocate(8).unwrap();
    allocator.release(small).unwrap();
    let cursor = allocator.cursor();

    let handle = allocator.allocate(24).unwrap();

    assert_ne!(handle, small);
    assert_eq!(allocator.cursor(), cursor + 24);
    assert_eq!(allocator.state(small).unwrap(), BlockState::Free);
  }

  #[test]
  fn test_failed_allocation_leaves_state_untouched() {
    let mut allocator = allocator(32, 8);
    allocator.allocate(8).unwrap();
    let before = allocator.stats();

    let err = allocator.allocate(16).unwrap_err();

    assert_eq!(
      err,
      AllocError::OutOfMemory {
        requested: 24,
        available: 16,
      }
    );
    assert_eq!(allocator.len(), 1);
    assert_eq!(allocator.cursor(), before.arena_cursor);
    assert_eq!(allocator.stats().out_of_memory, 1);
    allocator.check_invariants().unwrap();
  }

  #[test]
  fn test_oversized_request_is_out_of_memory() {
    let mut allocator = allocator(64, 8);

    let err = allocator.allocate(usize::MAX).unwrap_err();

    assert!(matches!(err, AllocError::OutOfMemory { .. }));
    assert!(allocator.is_empty());
  }

  #[test]
  fn test_double_release_is_rejected() {
    let mut allocator = allocator(64, 0);
    let handle = allocator.allocate(8).unwrap();
    allocator.release(handle).unwrap();

    let err = allocator.release(handle).unwrap_err();

    assert_eq!(
      err,
      AllocError::InvalidHandle {
        handle,
        reason: InvalidHandleReason::AlreadyFree,
      }
    );
    let stats = allocator.stats();
    assert_eq!(stats.released, 1);
    assert_eq!(stats.rejected_releases, 1);
    assert_eq!(stats.free_bytes, 8);
    allocator.check_invariants().unwrap();
  }

  #[test]
  fn test_foreign_handle_is_rejected() {
    let mut ours = allocator(64, 0);
    let mut theirs = allocator(64, 0);
    ours.allocate(8).unwrap();
    let foreign = theirs.allocate(8).unwrap();

    let err = ours.release(foreign).unwrap_err();

    assert_eq!(
      err,
      AllocError::InvalidHandle {
        handle: foreign,
        reason: InvalidHandleReason::ForeignAllocator,
      }
    );
    let own = Handle::new(ours.owner, 0);
    assert_eq!(ours.state(own).unwrap(), BlockState::Allocated);
  }

  #[test]
  fn test_unknown_index_is_rejected() {
    let mut allocator = allocator(64, 0);
    allocator.allocate(8).unwrap();
    let bogus = Handle::new(allocator.owner, 5);

    let err = allocator.release(bogus).unwrap_err();

    assert_eq!(
      err,
      AllocError::InvalidHandle {
        handle: bogus,
        reason: InvalidHandleReason::UnknownIndex,
      }
    );
  }

  #[test]
  fn test_payload_of_released_block_is_refused() {
    let mut allocator = allocator(64, 0);
    let handle = allocator.allocate(8).unwrap();
    allocator.release(handle).unwrap();

    let err = allocator.payload(handle).unwrap_err();

    assert_eq!(
      err,
      AllocError::InvalidHandle {
        handle,
        reason: InvalidHandleReason::Released,
      }
    );
    assert!(allocator.region(handle).is_ok());
  }

  #[test]
  fn test_payload_spans_whole_block() {
    let mut allocator = allocator(64, 0);
    let handle = allocator.allocate(16).unwrap();
    allocator.release(handle).unwrap();

    let reused = allocator.allocate(3).unwrap();

    assert_eq!(allocator.payload(reused).unwrap().len(), 16);
  }

  #[test]
  fn test_blocks_walk_creation_order() {
    let mut allocator = allocator(128, 8);
    let a = allocator.allocate(8).unwrap();
    let b = allocator.allocate(24).unwrap();
    let c = allocator.allocate(1).unwrap();
    allocator.release(b).unwrap();

    let walk: Vec<_> = allocator
      .blocks()
      .map(|info| (info.handle, info.state))
      .collect();

    assert_eq!(
      walk,
      vec![
        (a, BlockState::Allocated),
        (b, BlockState::Free),
        (c, BlockState::Allocated),
      ]
    );
  }

  #[test]
  fn test_stats_track_fragmentation() {
    let mut allocator = allocator(128, 0);
    let a = allocator.allocate(32).unwrap();
    allocator.allocate(5).unwrap();
    allocator.release(a).unwrap();
    allocator.allocate(10).unwrap();

    let stats = allocator.stats();

    assert_eq!(stats.carved, 2);
    assert_eq!(stats.reused, 1);
    assert_eq!(stats.released, 1);
    assert_eq!(stats.allocated_bytes, 40);
    assert_eq!(stats.requested_bytes, 15);
    assert_eq!(stats.internal_fragmentation(), 25);
    assert_eq!(stats.free_blocks, 0);
    assert_eq!(stats.arena_cursor, 40);
  }

  #[test]
  fn test_check_invariants_catches_broken_chain() {
    let mut allocator = allocator(128, 0);
    allocator.allocate(8).unwrap();
    allocator.allocate(8).unwrap();
    allocator.blocks[1].next = Some(0);

    assert!(matches!(
      allocator.check_invariants(),
      Err(AllocError::Corrupted(_))
    ));
  }

  #[test]
  fn test_check_invariants_catches_bad_size() {
    let mut allocator = allocator(128, 0);
    allocator.allocate(8).unwrap();
    allocator.blocks[0].region.size = 12;

    assert!(matches!(
      allocator.check_invariants(),
      Err(AllocError::Corrupted(_))
    ));
  }

  #[test]
  fn test_heap_dump_lists_every_block() {
    let mut allocator = allocator(64, 8);
    let a = allocator.allocate(8).unwrap();
    allocator.allocate(16).unwrap();
    allocator.release(a).unwrap();

    let dump = allocator.to_string();

    assert!(dump.starts_with("arena 40/64 bytes"));
    assert_eq!(dump.lines().count(), 3);
    assert!(dump.lines().nth(1).unwrap().ends_with("free"));
    assert!(dump.lines().nth(2).unwrap().ends_with("allocated"));
  }

  #[test]
  fn test_invalid_config_is_refused() {
    let config = HeapConfig::with_capacity(64).header_size(4);
    let err = Allocator::new(config).unwrap_err();

    assert!(matches!(err, ConfigError::Validation(_)));
  }

  #[test]
  fn test_with_capacity_rejects_out_of_range_arena() {
    let too_large = Allocator::with_capacity(usize::MAX).unwrap_err();
    let too_small = Allocator::with_capacity(4).unwrap_err();

    assert!(matches!(too_large, ConfigError::Validation(_)));
    assert!(matches!(too_small, ConfigError::Validation(_)));
    assert_eq!(Allocator::with_capacity(64).unwrap().capacity(), 64);
  }

  #[traced_test]
  #[test]
  fn test_rejected_release_is_logged() {
    let mut allocator = allocator(64, 0);
    let handle = allocator.allocate(8).unwrap();
    allocator.release(handle).unwrap();

    let _ = allocator.release(handle);

    assert!(logs_contain("release rejected"));
  }
}
