use std::fmt;

/// Whether a block is currently handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
  Allocated,
  Free,
}

impl BlockState {
  pub fn is_free(self) -> bool {
    self == Self::Free
  }
}

impl fmt::Display for BlockState {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::Allocated => f.write_str("allocated"),
      Self::Free => f.write_str("free"),
    }
  }
}

/// Opaque reference to a block, returned by `allocate`.
///
/// A handle records which allocator issued it and the creation-order position
/// of its block, so lookups are a bounds-checked index instead of pointer
/// arithmetic on a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
  owner: u32,
  index: u32,
}

impl Handle {
  pub(crate) fn new(
    owner: u32,
    index: u32,
  ) -> Self {
    Self { owner, index }
  }

  pub(crate) fn owner(self) -> u32 {
    self.owner
  }

  /// Creation-order position of the block. Exposed for diagnostics.
  pub fn index(self) -> usize {
    self.index as usize
  }
}

impl fmt::Display for Handle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "#{}.{}", self.owner, self.index)
  }
}

/// Where a block lives inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRegion {
  /// Offset of the block's header reservation.
  pub offset: usize,
  /// Offset of the first payload byte.
  pub payload_offset: usize,
  /// Usable payload bytes; a multiple of the alignment unit.
  pub size: usize,
}

impl BlockRegion {
  /// One past the last payload byte.
  pub fn end(&self) -> usize {
    self.payload_offset + self.size
  }

  pub fn overlaps(
    &self,
    other: &BlockRegion,
  ) -> bool {
    self.offset < other.end() && other.offset < self.end()
  }
}

/// Metadata record for one carved region.
///
/// Records are never removed; `next` links them in creation order.
#[derive(Debug, Clone)]
pub(crate) struct Block {
  pub region: BlockRegion,
  pub state: BlockState,
  /// Bytes asked for by the allocation currently holding the block.
  pub requested: usize,
  pub next: Option<usize>,
}

impl Block {
  pub fn new(
    region: BlockRegion,
    requested: usize,
  ) -> Self {
    Self {
      region,
      state: BlockState::Allocated,
      requested,
      next: None,
    }
  }

  pub fn size(&self) -> usize {
    self.region.size
  }

  pub fn is_free(&self) -> bool {
    self.state.is_free()
  }
}

/// Snapshot of one block, yielded by a heap walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub handle: Handle,
  pub region: BlockRegion,
  pub state: BlockState,
}
