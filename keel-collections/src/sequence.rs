//! Power-of-two dynamic array of fixed-size elements.
//!
//! A [`Sequence`] only manages a buffer. It has no notion of a logical
//! length: callers track how many elements they have written and use
//! [`Sequence::capacity`] as the upper bound.
//!
//! The byte capacity is always zero or a power of two. Growth either doubles
//! it ([`Sequence::expand`]) or resizes to the smallest power of two that
//! holds a requested element count ([`Sequence::set_len`]).

use core::fmt;
use core::mem::{MaybeUninit, align_of, size_of};
use core::ptr::NonNull;
use std::alloc::{Layout, alloc, dealloc, realloc};

/// Error returned when a buffer cannot be resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The requested size overflowed `usize` or exceeded `isize::MAX` bytes.
    CapacityOverflow,
    /// The system allocator returned null.
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityOverflow => write!(f, "capacity overflow"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for AllocError {}

/// A contiguous buffer whose byte capacity is zero or a power of two.
///
/// Elements are `Copy` and never dropped. A failed resize leaves the
/// sequence exactly as it was.
///
/// # Example
///
/// ```
/// use keel_collections::Sequence;
///
/// let mut seq: Sequence<u32> = Sequence::new();
/// seq.set_len(5, true).unwrap();
///
/// // 5 * 4 = 20 bytes, rounded up to 32
/// assert_eq!(seq.byte_capacity(), 32);
/// assert_eq!(seq.capacity(), 8);
///
/// seq.write(4, 7);
/// assert_eq!(unsafe { seq.read(4) }, 7);
///
/// seq.expand(false).unwrap();
/// assert_eq!(seq.capacity(), 16);
/// ```
pub struct Sequence<T: Copy> {
    ptr: NonNull<T>,
    byte_capacity: usize,
    capacity: usize,
}

// Safety: Sequence owns its elements like Vec does.
unsafe impl<T: Copy + Send> Send for Sequence<T> {}

impl<T: Copy> Default for Sequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> Sequence<T> {
    /// Creates an empty sequence. Does not allocate.
    ///
    /// Zero-sized `T` is rejected at compile time.
    #[inline]
    pub const fn new() -> Self {
        const { assert!(size_of::<T>() != 0, "zero-sized elements are not supported") };
        Self {
            ptr: NonNull::dangling(),
            byte_capacity: 0,
            capacity: 0,
        }
    }

    /// Returns the number of elements the buffer holds.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the size of the buffer in bytes. Zero or a power of two.
    #[inline]
    pub const fn byte_capacity(&self) -> usize {
        self.byte_capacity
    }

    /// Returns `true` if no buffer is allocated.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.byte_capacity == 0
    }

    /// Returns a raw pointer to the buffer. Dangling when empty.
    #[inline]
    pub const fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Returns a raw mutable pointer to the buffer. Dangling when empty.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Returns the whole buffer as possibly uninitialized elements.
    #[inline]
    pub fn as_uninit_slice(&self) -> &[MaybeUninit<T>] {
        // Safety: ptr is valid for capacity elements (or dangling with 0)
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr().cast(), self.capacity) }
    }

    /// Returns the whole buffer as possibly uninitialized mutable elements.
    #[inline]
    pub fn as_uninit_slice_mut(&mut self) -> &mut [MaybeUninit<T>] {
        // Safety: ptr is valid for capacity elements (or dangling with 0)
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr().cast(), self.capacity) }
    }

    /// Writes `value` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    #[inline]
    pub fn write(&mut self, index: usize, value: T) {
        assert!(index < self.capacity, "index out of bounds");
        // Safety: index checked above
        unsafe { self.ptr.as_ptr().add(index).write(value) };
    }

    /// Reads the element at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be less than `capacity()` and the element must have been
    /// written, or zero-filled where all-zero is a valid `T`.
    #[inline]
    pub unsafe fn read(&self, index: usize) -> T {
        debug_assert!(index < self.capacity, "index out of bounds");
        unsafe { self.ptr.as_ptr().add(index).read() }
    }

    /// Resizes the buffer to the smallest power of two holding `len` elements.
    ///
    /// `len == 0` releases the buffer. Resizing to the current size does
    /// nothing. When `zero_new` is set, bytes past the old byte capacity are
    /// zeroed; existing bytes are preserved up to the smaller of the two
    /// sizes.
    ///
    /// On error the sequence is unchanged.
    pub fn set_len(&mut self, len: usize, zero_new: bool) -> Result<(), AllocError> {
        let bytes = len
            .checked_mul(size_of::<T>())
            .ok_or(AllocError::CapacityOverflow)?;
        let bytes = if bytes == 0 {
            0
        } else {
            bytes
                .checked_next_power_of_two()
                .ok_or(AllocError::CapacityOverflow)?
        };
        self.resize_bytes(bytes, zero_new)
    }

    /// Doubles the byte capacity.
    ///
    /// The sequence must already hold a buffer; use [`set_len`] first.
    ///
    /// [`set_len`]: Sequence::set_len
    pub fn expand(&mut self, zero_new: bool) -> Result<(), AllocError> {
        debug_assert!(self.byte_capacity > 0, "expand on empty sequence");
        let bytes = self
            .byte_capacity
            .checked_mul(2)
            .ok_or(AllocError::CapacityOverflow)?;
        self.resize_bytes(bytes, zero_new)
    }

    fn resize_bytes(&mut self, bytes: usize, zero_new: bool) -> Result<(), AllocError> {
        let old_bytes = self.byte_capacity;
        if bytes == old_bytes {
            return Ok(());
        }

        if bytes == 0 {
            self.release();
            return Ok(());
        }

        let layout = Layout::from_size_align(bytes, align_of::<T>())
            .map_err(|_| AllocError::CapacityOverflow)?;

        let raw = if old_bytes == 0 {
            // Safety: layout has non-zero size
            unsafe { alloc(layout) }
        } else {
            // Safety: ptr was allocated with current_layout, bytes is non-zero
            // and fits isize (checked by Layout above)
            unsafe { realloc(self.ptr.as_ptr().cast(), self.current_layout(), bytes) }
        };

        let ptr = NonNull::new(raw).ok_or(AllocError::OutOfMemory)?;

        if zero_new && bytes > old_bytes {
            // Safety: [old_bytes, bytes) lies inside the new allocation
            unsafe { ptr.as_ptr().add(old_bytes).write_bytes(0, bytes - old_bytes) };
        }

        self.ptr = ptr.cast();
        self.byte_capacity = bytes;
        self.capacity = bytes / size_of::<T>();
        Ok(())
    }

    #[inline]
    fn current_layout(&self) -> Layout {
        // Safety: the same size/align pair was validated when allocating
        unsafe { Layout::from_size_align_unchecked(self.byte_capacity, align_of::<T>()) }
    }

    fn release(&mut self) {
        if self.byte_capacity != 0 {
            // Safety: ptr was allocated with current_layout
            unsafe { dealloc(self.ptr.as_ptr().cast(), self.current_layout()) };
        }
        self.ptr = NonNull::dangling();
        self.byte_capacity = 0;
        self.capacity = 0;
    }
}

impl<T: Copy> Drop for Sequence<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Copy> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("capacity", &self.capacity)
            .field("byte_capacity", &self.byte_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bytes_of<T: Copy>(seq: &Sequence<T>, len: usize) -> &[u8] {
        // Safety: test only reads bytes that set_len zero-filled or wrote
        unsafe { core::slice::from_raw_parts(seq.as_ptr().cast::<u8>(), len) }
    }

    #[test]
    fn new_is_empty() {
        let seq: Sequence<u64> = Sequence::new();
        assert!(seq.is_empty());
        assert_eq!(seq.capacity(), 0);
        assert_eq!(seq.byte_capacity(), 0);
        assert!(seq.as_uninit_slice().is_empty());
    }

    #[test]
    fn set_len_rounds_to_power_of_two() {
        let mut seq: Sequence<u64> = Sequence::new();

        seq.set_len(1, false).unwrap();
        assert_eq!(seq.byte_capacity(), 8);
        assert_eq!(seq.capacity(), 1);

        seq.set_len(3, false).unwrap();
        assert_eq!(seq.byte_capacity(), 32);
        assert_eq!(seq.capacity(), 4);

        seq.set_len(100, false).unwrap();
        assert_eq!(seq.byte_capacity(), 1024);
        assert_eq!(seq.capacity(), 128);
    }

    #[test]
    fn element_size_not_power_of_two() {
        let mut seq: Sequence<[u8; 3]> = Sequence::new();

        seq.set_len(5, true).unwrap();
        assert_eq!(seq.byte_capacity(), 16);
        assert_eq!(seq.capacity(), 5);

        seq.set_len(6, true).unwrap();
        assert_eq!(seq.byte_capacity(), 32);
        assert_eq!(seq.capacity(), 10);
    }

    #[test]
    fn set_len_zero_releases() {
        let mut seq: Sequence<u32> = Sequence::new();
        seq.set_len(10, false).unwrap();
        assert!(!seq.is_empty());

        seq.set_len(0, false).unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.capacity(), 0);

        // Releasing twice is a no-op
        seq.set_len(0, false).unwrap();
        assert!(seq.is_empty());
    }

    #[test]
    fn same_size_is_noop() {
        let mut seq: Sequence<u32> = Sequence::new();
        seq.set_len(8, true).unwrap();
        let ptr = seq.as_ptr();

        seq.write(3, 99);
        seq.set_len(7, true).unwrap();

        assert_eq!(seq.as_ptr(), ptr);
        assert_eq!(unsafe { seq.read(3) }, 99);
    }

    #[test]
    fn grow_preserves_contents_and_zeroes_tail() {
        let mut seq: Sequence<u32> = Sequence::new();
        seq.set_len(4, true).unwrap();
        for i in 0..4 {
            seq.write(i, i as u32 + 1);
        }

        seq.set_len(16, true).unwrap();
        assert_eq!(seq.capacity(), 16);
        for i in 0..4 {
            assert_eq!(unsafe { seq.read(i) }, i as u32 + 1);
        }
        for i in 4..16 {
            assert_eq!(unsafe { seq.read(i) }, 0);
        }
    }

    #[test]
    fn shrink_preserves_prefix() {
        let mut seq: Sequence<u16> = Sequence::new();
        seq.set_len(64, true).unwrap();
        for i in 0..64 {
            seq.write(i, i as u16);
        }

        seq.set_len(4, false).unwrap();
        assert_eq!(seq.capacity(), 4);
        for i in 0..4 {
            assert_eq!(unsafe { seq.read(i) }, i as u16);
        }
    }

    #[test]
    fn expand_doubles() {
        let mut seq: Sequence<u8> = Sequence::new();
        seq.set_len(16, true).unwrap();

        seq.expand(true).unwrap();
        assert_eq!(seq.byte_capacity(), 32);
        assert!(bytes_of(&seq, 32).iter().all(|&b| b == 0));

        seq.expand(false).unwrap();
        assert_eq!(seq.byte_capacity(), 64);
    }

    #[test]
    fn overflow_leaves_state_unchanged() {
        let mut seq: Sequence<u64> = Sequence::new();
        seq.set_len(4, true).unwrap();
        seq.write(0, 11);

        assert_eq!(
            seq.set_len(usize::MAX, false),
            Err(AllocError::CapacityOverflow)
        );
        assert_eq!(
            seq.set_len(usize::MAX / 8, false),
            Err(AllocError::CapacityOverflow)
        );

        assert_eq!(seq.capacity(), 4);
        assert_eq!(unsafe { seq.read(0) }, 11);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn write_out_of_bounds_panics() {
        let mut seq: Sequence<u32> = Sequence::new();
        seq.set_len(2, false).unwrap();
        seq.write(2, 0);
    }

    #[test]
    fn uninit_slice_covers_capacity() {
        let mut seq: Sequence<u32> = Sequence::new();
        seq.set_len(3, false).unwrap();

        let slots = seq.as_uninit_slice_mut();
        assert_eq!(slots.len(), 4);
        slots[2].write(5);

        assert_eq!(unsafe { seq.read(2) }, 5);
    }

    proptest! {
        #[test]
        fn set_len_zero_fills_requested_prefix(steps in proptest::collection::vec(0usize..2048, 1..8)) {
            let mut seq: Sequence<u32> = Sequence::new();
            for n in steps {
                seq.set_len(0, false).unwrap();
                seq.set_len(n, true).unwrap();

                prop_assert!(seq.capacity() >= n);
                prop_assert!(seq.byte_capacity() == 0 || seq.byte_capacity().is_power_of_two());
                prop_assert_eq!(seq.capacity(), seq.byte_capacity() / 4);
                prop_assert!(bytes_of(&seq, n * 4).iter().all(|&b| b == 0));
            }
        }

        #[test]
        fn growth_keeps_written_prefix(first in 1usize..256, second in 1usize..4096) {
            let mut seq: Sequence<u64> = Sequence::new();
            seq.set_len(first, true).unwrap();
            for i in 0..first {
                seq.write(i, i as u64 * 3);
            }

            seq.set_len(first.max(second), true).unwrap();
            for i in 0..first {
                prop_assert_eq!(unsafe { seq.read(i) }, i as u64 * 3);
            }
            for i in first..seq.capacity() {
                prop_assert_eq!(unsafe { seq.read(i) }, 0);
            }
        }
    }
}
