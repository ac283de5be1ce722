//! Indexed binary heap over external storage.
//!
//! Entries embed their own heap slot, so an arbitrary entry can be removed
//! or re-prioritized in O(log n) given only its key.
//!
//! The logical array is split into fixed segments of [`SEGMENT_LEN`] keys,
//! each allocated separately and reached through a directory. Growing never
//! copies existing slots; only the directory (one pointer per segment) is
//! reallocated. Segments are released only by [`Heap::shrink_to_fit`].
//!
//! Ordering is supplied per call: `cmp(a, b) == Less` means `a` has higher
//! priority and sits closer to the top. The same ordering must be used for
//! the lifetime of the heap.

use core::cmp::Ordering;
use core::fmt;
use core::ptr::NonNull;
use std::alloc::{Layout, alloc, dealloc};

use crate::{AllocError, Key, Sequence, Storage};

/// Number of slots in one heap segment.
pub const SEGMENT_LEN: usize = 256;

/// Trait for records that can sit in a [`Heap`].
///
/// # Example
///
/// ```
/// use keel_collections::{HeapEntry, Key};
///
/// #[derive(Debug)]
/// struct Timer {
///     deadline: u64,
///     slot: u32,
/// }
///
/// impl HeapEntry<u32> for Timer {
///     fn heap_slot(&self) -> u32 { self.slot }
///     fn set_heap_slot(&mut self, slot: u32) { self.slot = slot; }
/// }
///
/// let timer = Timer { deadline: 10, slot: u32::NONE };
/// assert!(!timer.in_heap());
/// ```
pub trait HeapEntry<K: Key> {
    /// Returns this entry's slot, or `K::NONE` if not in a heap.
    fn heap_slot(&self) -> K;

    /// Sets this entry's slot.
    fn set_heap_slot(&mut self, slot: K);

    /// Returns `true` if this entry is currently in a heap.
    #[inline]
    fn in_heap(&self) -> bool {
        self.heap_slot().is_some()
    }
}

/// A segmented binary heap of storage keys.
///
/// # Example
///
/// ```
/// use keel_collections::{Heap, HeapEntry, Key, SlotStorage, Storage};
///
/// #[derive(Debug)]
/// struct Task {
///     priority: u32,
///     name: &'static str,
///     slot: u32,
/// }
///
/// impl HeapEntry<u32> for Task {
///     fn heap_slot(&self) -> u32 { self.slot }
///     fn set_heap_slot(&mut self, slot: u32) { self.slot = slot; }
/// }
///
/// let by_priority = |a: &Task, b: &Task| a.priority.cmp(&b.priority);
///
/// let mut tasks: SlotStorage<Task> = SlotStorage::with_capacity(16);
/// let mut heap: Heap<u32> = Heap::new();
///
/// for (priority, name) in [(10, "low"), (1, "high"), (5, "medium")] {
///     let key = tasks.try_insert(Task { priority, name, slot: u32::NONE }).unwrap();
///     heap.insert(&mut tasks, key, by_priority).unwrap();
/// }
///
/// let top = heap.top().unwrap();
/// assert_eq!(tasks.get(top).unwrap().name, "high");
///
/// // Re-prioritize in place
/// let low = heap.get_slot(1).unwrap();
/// tasks.get_mut(low).unwrap().priority = 0;
/// heap.adjust(&mut tasks, low, by_priority);
/// assert_eq!(heap.top(), Some(low));
/// ```
pub struct Heap<K: Key> {
    directory: Sequence<NonNull<K>>,
    segments: usize,
    len: usize,
}

// Safety: the heap exclusively owns its segments.
unsafe impl<K: Key + Send> Send for Heap<K> {}

impl<K: Key> Default for Heap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> Heap<K> {
    /// Creates an empty heap. Does not allocate.
    #[inline]
    pub const fn new() -> Self {
        const { assert!(size_of::<K>() != 0, "zero-sized keys are not supported") };
        Self {
            directory: Sequence::new(),
            segments: 0,
            len: 0,
        }
    }

    /// Returns the number of entries.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the heap has no entries.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of allocated slots.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.segments * SEGMENT_LEN
    }

    /// Returns the number of allocated segments.
    #[inline]
    pub const fn segments(&self) -> usize {
        self.segments
    }

    /// Returns the highest-priority key without removing it.
    #[inline]
    pub fn top(&self) -> Option<K> {
        self.get_slot(0)
    }

    /// Returns the key at `slot`.
    #[inline]
    pub fn get_slot(&self, slot: usize) -> Option<K> {
        (slot < self.len).then(|| self.slot(slot))
    }

    /// Returns an iterator over keys in slot order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = K> + '_ {
        (0..self.len).map(|slot| self.slot(slot))
    }

    /// Inserts `key`, growing by one segment when every slot is in use.
    ///
    /// On error the heap and the entry are unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    pub fn insert<T, S, F>(&mut self, storage: &mut S, key: K, mut cmp: F) -> Result<(), AllocError>
    where
        T: HeapEntry<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        debug_assert!(
            !storage.get(key).expect("invalid key").in_heap(),
            "entry already in a heap"
        );

        if self.len == self.capacity() {
            self.add_segment()?;
        }

        let pos = self.len;
        self.set_slot(pos, key);
        storage
            .get_mut(key)
            .expect("invalid key")
            .set_heap_slot(K::from_usize(pos));
        self.len += 1;

        self.sift_up(storage, pos, &mut cmp);
        Ok(())
    }

    /// Restores order after the caller changed `key`'s priority.
    ///
    /// Tries moving up first and only moves down if the entry stayed put.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not in this heap.
    pub fn adjust<T, S, F>(&mut self, storage: &mut S, key: K, mut cmp: F)
    where
        T: HeapEntry<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        let pos = self.position(storage, key);
        if !self.sift_up(storage, pos, &mut cmp) {
            self.sift_down(storage, pos, &mut cmp);
        }
    }

    /// Removes `key` from the heap. The record stays in storage.
    ///
    /// Returns `false` if the entry was not in a heap.
    pub fn remove<T, S, F>(&mut self, storage: &mut S, key: K, mut cmp: F) -> bool
    where
        T: HeapEntry<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        let slot = match storage.get(key) {
            Some(entry) => entry.heap_slot(),
            None => return false,
        };
        if slot.is_none() {
            return false;
        }

        let pos = slot.as_usize();
        debug_assert!(pos < self.len && self.slot(pos) == key, "entry not in this heap");

        let last = self.len - 1;
        let moved = self.slot(last);
        self.len = last;
        if pos != last {
            self.set_slot(pos, moved);
            // Safety: moved is in the heap, hence occupied
            unsafe { storage.get_unchecked_mut(moved) }.set_heap_slot(K::from_usize(pos));

            // Safety: both keys are occupied; key was checked above
            let ord = unsafe { cmp(storage.get_unchecked(moved), storage.get_unchecked(key)) };
            match ord {
                Ordering::Less => {
                    self.sift_up(storage, pos, &mut cmp);
                }
                Ordering::Greater => {
                    self.sift_down(storage, pos, &mut cmp);
                }
                Ordering::Equal => {}
            }
        }

        // Safety: key was checked above
        unsafe { storage.get_unchecked_mut(key) }.set_heap_slot(K::NONE);
        true
    }

    /// Removes and returns the highest-priority key.
    pub fn pop<T, S, F>(&mut self, storage: &mut S, cmp: F) -> Option<K>
    where
        T: HeapEntry<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        let key = self.top()?;
        self.remove(storage, key, cmp);
        Some(key)
    }

    /// Empties the heap, marking every entry as not in a heap.
    ///
    /// Segments are kept.
    pub fn clear<T, S>(&mut self, storage: &mut S)
    where
        T: HeapEntry<K>,
        S: Storage<T, Key = K>,
    {
        for pos in 0..self.len {
            let key = self.slot(pos);
            if let Some(entry) = storage.get_mut(key) {
                entry.set_heap_slot(K::NONE);
            }
        }
        self.len = 0;
    }

    /// Releases segments no longer needed for the current length.
    ///
    /// Only the directory resize can fail; the entries are unchanged either
    /// way.
    pub fn shrink_to_fit(&mut self) -> Result<(), AllocError> {
        let needed = self.len.div_ceil(SEGMENT_LEN);
        while self.segments > needed {
            self.segments -= 1;
            // Safety: index < previous segment count, segment is live
            let segment = unsafe { self.directory.read(self.segments) };
            // Safety: allocated by add_segment with the same layout
            unsafe { dealloc(segment.as_ptr().cast(), Self::segment_layout_unchecked()) };
        }
        self.directory.set_len(needed, false)
    }

    // =========================================================================
    // Segments
    // =========================================================================

    fn add_segment(&mut self) -> Result<(), AllocError> {
        if self.segments == self.directory.capacity() {
            self.directory.set_len(self.segments + 1, false)?;
        }

        let layout = Layout::array::<K>(SEGMENT_LEN).map_err(|_| AllocError::CapacityOverflow)?;
        // Safety: K is not zero-sized, so layout has non-zero size
        let raw = unsafe { alloc(layout) };
        let segment = NonNull::new(raw.cast::<K>()).ok_or(AllocError::OutOfMemory)?;

        self.directory.write(self.segments, segment);
        self.segments += 1;
        Ok(())
    }

    /// # Safety
    ///
    /// Only valid once `Layout::array::<K>(SEGMENT_LEN)` has succeeded.
    #[inline]
    unsafe fn segment_layout_unchecked() -> Layout {
        unsafe {
            Layout::from_size_align_unchecked(
                size_of::<K>() * SEGMENT_LEN,
                align_of::<K>(),
            )
        }
    }

    #[inline]
    fn slot_ptr(&self, pos: usize) -> *mut K {
        debug_assert!(pos < self.capacity());
        // Safety: pos / SEGMENT_LEN < segments, directory entry is written
        let segment = unsafe { self.directory.read(pos / SEGMENT_LEN) };
        // Safety: offset is within the segment
        unsafe { segment.as_ptr().add(pos % SEGMENT_LEN) }
    }

    #[inline]
    fn slot(&self, pos: usize) -> K {
        debug_assert!(pos < self.len);
        // Safety: slots below len are initialized
        unsafe { self.slot_ptr(pos).read() }
    }

    #[inline]
    fn set_slot(&mut self, pos: usize, key: K) {
        // Safety: pos < capacity, checked in slot_ptr
        unsafe { self.slot_ptr(pos).write(key) }
    }

    fn position<T, S>(&self, storage: &S, key: K) -> usize
    where
        T: HeapEntry<K>,
        S: Storage<T, Key = K>,
    {
        let slot = storage.get(key).expect("invalid key").heap_slot();
        assert!(slot.is_some(), "entry not in a heap");
        let pos = slot.as_usize();
        debug_assert!(pos < self.len && self.slot(pos) == key, "entry not in this heap");
        pos
    }

    // =========================================================================
    // Sifting
    // =========================================================================

    /// Moves the entry at `pos` toward the root. Returns `true` if it moved.
    #[inline]
    fn sift_up<T, S, F>(&mut self, storage: &mut S, pos: usize, cmp: &mut F) -> bool
    where
        T: HeapEntry<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        let key = self.slot(pos);
        let mut hole = pos;

        while hole > 0 {
            let parent = (hole - 1) / 2;
            let parent_key = self.slot(parent);

            // Safety: keys in the heap are occupied
            if unsafe { cmp(storage.get_unchecked(key), storage.get_unchecked(parent_key)) }
                .is_lt()
            {
                self.set_slot(hole, parent_key);
                unsafe { storage.get_unchecked_mut(parent_key) }
                    .set_heap_slot(K::from_usize(hole));
                hole = parent;
            } else {
                break;
            }
        }

        if hole == pos {
            return false;
        }

        self.set_slot(hole, key);
        unsafe { storage.get_unchecked_mut(key) }.set_heap_slot(K::from_usize(hole));
        true
    }

    /// Moves the entry at `pos` toward the leaves. Returns `true` if it moved.
    #[inline]
    fn sift_down<T, S, F>(&mut self, storage: &mut S, pos: usize, cmp: &mut F) -> bool
    where
        T: HeapEntry<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        let len = self.len;
        let key = self.slot(pos);
        let mut hole = pos;

        loop {
            let left = 2 * hole + 1;
            if left >= len {
                break;
            }

            let mut child = left;
            let mut child_key = self.slot(left);

            let right = left + 1;
            if right < len {
                let right_key = self.slot(right);
                // Safety: keys in the heap are occupied
                if unsafe { cmp(storage.get_unchecked(right_key), storage.get_unchecked(child_key)) }
                    .is_lt()
                {
                    child = right;
                    child_key = right_key;
                }
            }

            // Safety: keys in the heap are occupied
            if !unsafe { cmp(storage.get_unchecked(key), storage.get_unchecked(child_key)) }.is_gt() {
                break;
            }

            self.set_slot(hole, child_key);
            unsafe { storage.get_unchecked_mut(child_key) }.set_heap_slot(K::from_usize(hole));
            hole = child;
        }

        if hole == pos {
            return false;
        }

        self.set_slot(hole, key);
        unsafe { storage.get_unchecked_mut(key) }.set_heap_slot(K::from_usize(hole));
        true
    }
}

impl<K: Key> Drop for Heap<K> {
    fn drop(&mut self) {
        for index in 0..self.segments {
            // Safety: every index below segments holds a live segment
            // allocated with the array layout
            unsafe {
                let segment = self.directory.read(index);
                dealloc(segment.as_ptr().cast(), Self::segment_layout_unchecked());
            }
        }
    }
}

impl<K: Key + fmt::Debug> fmt::Debug for Heap<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("len", &self.len)
            .field("segments", &self.segments)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
