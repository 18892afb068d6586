/// Size, in bytes, of the allocation unit. Every block payload is a multiple of it.
pub const ALIGNMENT: usize = 8;

/// Rounds a byte count up to the next multiple of [`ALIGNMENT`].
///
/// This is the unchecked form: it wraps past `usize::MAX`. Use [`align_up`]
/// where the value comes from a caller.
///
/// # Examples
///
/// ```rust
/// use kheap::align;
///
/// assert_eq!(align!(1), 8);
/// assert_eq!(align!(8), 8);
/// assert_eq!(align!(13), 16);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Function form of [`align!`] that refuses to wrap around `usize::MAX`.
#[inline]
pub fn align_up(value: usize) -> Option<usize> {
  value.checked_add(ALIGNMENT - 1)?;
  Some(align!(value))
}

/// Payload size actually handed out for a request of `requested` bytes.
///
/// Zero-byte requests are served with one allocation unit, so no request ever
/// produces an empty block.
#[inline]
pub fn aligned_size(requested: usize) -> Option<usize> {
  align_up(requested.max(1))
}
