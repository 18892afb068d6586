use std::path::PathBuf;

use thiserror::Error;
use validator::ValidationErrors;

use crate::block::Handle;

pub type Result<T> = std::result::Result<T, AllocError>;

/// Failures returned by the allocator. None of them leave the heap half-updated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
  /// No free block fits and the arena tail is too short for a new one.
  #[error("out of memory: needed {requested} bytes, {available} left in the arena")]
  OutOfMemory { requested: usize, available: usize },

  /// The handle does not name a live block of this allocator.
  #[error("invalid handle {handle}: {reason}")]
  InvalidHandle {
    handle: Handle,
    reason: InvalidHandleReason,
  },

  /// A heap walk found metadata that breaks a block invariant.
  #[error("heap corrupted: {0}")]
  Corrupted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidHandleReason {
  #[error("no block was ever created at this index")]
  UnknownIndex,

  #[error("handle was issued by another allocator")]
  ForeignAllocator,

  #[error("block is already free")]
  AlreadyFree,

  #[error("block was released")]
  Released,
}

impl AllocError {
  pub(crate) fn invalid(
    handle: Handle,
    reason: InvalidHandleReason,
  ) -> Self {
    Self::InvalidHandle { handle, reason }
  }
}

/// Errors raised while loading a [`HeapConfig`](crate::HeapConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("configuration file not found: {0}")]
  FileNotFound(PathBuf),

  #[error("invalid configuration:\n{}", format_validation_errors(.0))]
  Validation(#[source] ValidationErrors),

  #[error("configuration parsing error: {0}")]
  Parsing(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
  fn from(error: figment::Error) -> Self {
    Self::Parsing(Box::new(error))
  }
}

impl From<ValidationErrors> for ConfigError {
  fn from(errors: ValidationErrors) -> Self {
    Self::Validation(errors)
  }
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
  use std::fmt::Write;

  let mut output = String::new();
  for (field, errors) in errors.field_errors() {
    let _ = writeln!(output, "field '{field}':");
    for error in errors {
      let message = match &error.message {
        Some(msg) => msg.to_string(),
        None => error.code.to_string(),
      };
      let _ = writeln!(output, "  - {message}");
    }
  }
  output
}
