use kheap::{AllocError, Allocator, HeapConfig, logging};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
  logging::init();

  // A 64-byte arena with an 8-byte header ahead of every payload.
  let mut heap = Allocator::new(HeapConfig::with_capacity(64))?;
  println!("[start] {}", heap.stats());

  // --------------------------------------------------------------------
  // 1) Allocate 8 bytes. The block lands at offset 0, payload at 8.
  // --------------------------------------------------------------------
  let a = heap.allocate(8)?;
  heap.payload_mut(a)?.copy_from_slice(&0xDEAD_BEEF_u64.to_le_bytes());
  println!("\n[1] allocate(8) -> {a} {:?}", heap.region(a)?);

  // --------------------------------------------------------------------
  // 2) Allocate 13 bytes; the payload is rounded up to 16.
  // --------------------------------------------------------------------
  let b = heap.allocate(13)?;
  heap.payload_mut(b)?.fill(0xAB);
  println!("[2] allocate(13) -> {b} {:?}", heap.region(b)?);

  // --------------------------------------------------------------------
  // 3) Release the first block. It stays in the chain, marked free.
  // --------------------------------------------------------------------
  heap.release(a)?;
  println!("\n[3] release({a})\n{heap}");

  // --------------------------------------------------------------------
  // 4) A small request reuses the oldest free block that fits.
  // --------------------------------------------------------------------
  let c = heap.allocate(2)?;
  println!(
    "[4] allocate(2) -> {c}: {}",
    if c == a {
      "reused the freed block"
    } else {
      "carved a new block"
    }
  );

  // --------------------------------------------------------------------
  // 5) Too large for the arena tail and no free block fits.
  // --------------------------------------------------------------------
  match heap.allocate(40) {
    Err(err @ AllocError::OutOfMemory { .. }) => {
      println!("\n[5] allocate(40) -> {err}")
    }
    other => println!("\n[5] allocate(40) -> unexpected {other:?}"),
  }

  // --------------------------------------------------------------------
  // 6) Releasing twice is refused instead of corrupting the chain.
  // --------------------------------------------------------------------
  heap.release(b)?;
  if let Err(err) = heap.release(b) {
    println!("[6] release({b}) again -> {err}");
  }

  heap.check_invariants()?;
  info!(stats = %heap.stats(), "demo finished");
  println!("\n[end]\n{heap}");
  Ok(())
}
