//! Heap sizing.
//!
//! Values are layered as: defaults, then an optional YAML file, then
//! `KHEAP_*` environment variables. The result is validated before use.

use std::path::Path;

use figment::{
  Figment,
  providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{align::ALIGNMENT, error::ConfigError};

/// Arena size used when nothing else is configured: 1 MiB.
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Bytes reserved in the arena ahead of every block payload.
pub const DEFAULT_HEADER_SIZE: usize = 8;

const MAX_CAPACITY: usize = 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_layout"))]
pub struct HeapConfig {
  /// Total arena bytes, headers included.
  #[serde(default = "default_capacity")]
  #[validate(range(min = ALIGNMENT, max = MAX_CAPACITY))]
  pub capacity: usize,

  /// Arena bytes consumed by each block's header. Zero keeps all metadata
  /// in the registry.
  #[serde(default = "default_header_size")]
  pub header_size: usize,
}

fn default_capacity() -> usize {
  DEFAULT_CAPACITY
}

fn default_header_size() -> usize {
  DEFAULT_HEADER_SIZE
}

/// Headers keep payloads aligned, and at least one minimal block must fit.
fn validate_layout(config: &HeapConfig) -> Result<(), ValidationError> {
  if config.header_size % ALIGNMENT != 0 {
    return Err(ValidationError::new("header_size_unaligned"));
  }
  if config.header_size >= MAX_CAPACITY
    || config.header_size + ALIGNMENT > config.capacity
  {
    return Err(ValidationError::new("header_size_too_large"));
  }
  Ok(())
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_CAPACITY,
      header_size: DEFAULT_HEADER_SIZE,
    }
  }
}

impl HeapConfig {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      capacity,
      ..Self::default()
    }
  }

  pub fn header_size(
    mut self,
    header_size: usize,
  ) -> Self {
    self.header_size = header_size;
    self
  }

  /// Defaults overridden by `KHEAP_*` environment variables.
  pub fn load() -> Result<Self, ConfigError> {
    Self::extract(Figment::from(Serialized::defaults(Self::default())))
  }

  /// Defaults, then the YAML file at `path`, then `KHEAP_*` variables.
  pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
      return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let defaults = Figment::from(Serialized::defaults(Self::default()));
    Self::extract(defaults.merge(Yaml::file(path)))
  }

  fn extract(figment: Figment) -> Result<Self, ConfigError> {
    let config: Self = figment.merge(Env::prefixed("KHEAP_")).extract()?;
    config.validate()?;
    Ok(config)
  }
}
