use tracing_subscriber::{EnvFilter, fmt};

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// The allocator emits carve, reuse, and release events at `trace` level, so
/// `RUST_LOG=kheap=trace` shows every heap operation.
pub fn init() {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("info"));

  let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

