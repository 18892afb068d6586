//! # kheap - A Fixed-Arena Block Allocator
//!
//! This crate provides a small **first-fit allocator** that manages a
//! fixed-size byte arena without asking the operating system for memory.
//! Every byte it hands out is carved from one arena, and every carved region
//! is tracked by a block record that lives for the allocator's lifetime.
//!
//! ## Overview
//!
//! ```text
//!   Arena (capacity fixed at construction):
//!
//!   ┌────┬───────┬────┬──────────────┬────┬───────┬─────────────────────┐
//!   │ H0 │  B0   │ H1 │      B1      │ H2 │  B2   │     untouched       │
//!   └────┴───────┴────┴──────────────┴────┴───────┴─────────────────────┘
//!                                                  ▲                   ▲
//!                                                cursor            capacity
//!
//!   Block registry (creation order, singly linked):
//!
//!   [B0 free, 8] ──► [B1 allocated, 24] ──► [B2 allocated, 8] ──► ∅
//! ```
//!
//! `allocate` walks the chain from the oldest block and takes the first free
//! block that is large enough. If none fits, it bumps the arena cursor past a
//! header reservation plus the aligned payload and appends a new block.
//! `release` marks a block free and nothing more: blocks are never split,
//! merged, or given back to the arena.
//!
//! ## Crate Structure
//!
//! ```text
//!   kheap
//!   ├── align      - Alignment macro and helpers (align!)
//!   ├── arena      - Fixed-capacity bump region
//!   ├── block      - Block records, handles, regions
//!   ├── allocator  - Allocator: first-fit reuse + bump carving
//!   ├── sync       - HeapAllocator trait, LockedAllocator
//!   ├── stats      - AllocStats snapshot
//!   ├── config     - HeapConfig (figment + validator)
//!   └── logging    - tracing subscriber setup
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use kheap::{Allocator, HeapConfig};
//!
//! let mut heap = Allocator::new(HeapConfig::with_capacity(64)).unwrap();
//!
//! let a = heap.allocate(8).unwrap();
//! let b = heap.allocate(16).unwrap();
//! heap.payload_mut(b).unwrap()[0] = 42;
//!
//! heap.release(a).unwrap();
//! assert_eq!(heap.allocate(8).unwrap(), a);
//! assert!(heap.allocate(40).is_err());
//! ```
//!
//! ## Handles
//!
//! Callers never see addresses. A [`Handle`] names a block by the allocator
//! that issued it and its creation-order index, so a stale, forged, or foreign
//! handle is reported as [`AllocError::InvalidHandle`] instead of corrupting
//! metadata.
//!
//! ## Limitations
//!
//! - **Single context**: `Allocator` takes `&mut self`; share it through
//!   [`LockedAllocator`]
//! - **No coalescing**: fragmentation is permanent for the arena's lifetime
//! - **No shrinking**: the arena cursor never moves backwards

pub mod align;
mod allocator;
mod arena;
mod block;
mod config;
mod error;
pub mod logging;
mod stats;
mod sync;

pub use allocator::{Allocator, Blocks};
pub use block::{BlockInfo, BlockRegion, BlockState, Handle};
pub use config::{DEFAULT_CAPACITY, DEFAULT_HEADER_SIZE, HeapConfig};
pub use error::{AllocError, ConfigError, InvalidHandleReason, Result};
pub use stats::AllocStats;
pub use sync::{HeapAllocator, LockedAllocator};
