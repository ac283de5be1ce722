//! Storage trait for slab-like containers with stable keys.
//!
//! Records live in storage; lists, heaps and trees only coordinate keys.
//! A key stays valid until the record is explicitly removed, so links
//! embedded in records can be plain keys instead of pointers.

use core::fmt;
use core::hint::unreachable_unchecked;
use std::marker::PhantomData;

use crate::Key;

/// Slab-like storage with stable keys.
///
/// # Requirements
///
/// Implementations must provide:
/// - **Stable keys**: a key remains valid until explicitly removed
/// - **O(1)** insert, remove, get operations
/// - **Slot reuse**: removed slots can be reused by future inserts
///
/// # Implementations
///
/// - [`SlotStorage<T>`] - fixed capacity, single allocation (in this crate)
/// - `slab::Slab<T>` - growable (feature `slab`)
pub trait Storage<T> {
    /// Key type for this storage.
    type Key: Key;

    /// Error type for failed insertions.
    ///
    /// - `Full<T>` for fixed-capacity storage
    /// - `Infallible` for growable storage
    type Error;

    /// Inserts a value, returning its stable key.
    fn try_insert(&mut self, value: T) -> Result<Self::Key, Self::Error>;

    /// Removes and returns the value at `key`, if present.
    fn remove(&mut self, key: Self::Key) -> Option<T>;

    /// Returns a reference to the value at `key`, if present.
    fn get(&self, key: Self::Key) -> Option<&T>;

    /// Returns a mutable reference to the value at `key`, if present.
    fn get_mut(&mut self, key: Self::Key) -> Option<&mut T>;

    /// Returns a reference without checking occupancy.
    ///
    /// # Safety
    ///
    /// `key` must be valid and occupied.
    unsafe fn get_unchecked(&self, key: Self::Key) -> &T;

    /// Returns a mutable reference without checking occupancy.
    ///
    /// # Safety
    ///
    /// `key` must be valid and occupied.
    unsafe fn get_unchecked_mut(&mut self, key: Self::Key) -> &mut T;
}

/// Error returned when fixed-capacity storage is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the value that could not be inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage is full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

// =============================================================================
// SlotStorage - fixed capacity, vacant slots form a free list
// =============================================================================

enum Slot<T, K> {
    /// Vacant slot; `next_free` is the next vacant slot or `K::NONE`.
    Vacant { next_free: K },
    Occupied(T),
}

/// Fixed-capacity storage with runtime-determined size.
///
/// Slots are allocated once at construction. Vacant slots are threaded into
/// a LIFO free list through the slots themselves, so the most recently
/// vacated slot is reused first.
///
/// # Example
///
/// ```
/// use keel_collections::{SlotStorage, Storage};
///
/// let mut storage: SlotStorage<u64> = SlotStorage::with_capacity(1000);
/// assert_eq!(storage.capacity(), 1000);
///
/// let key = storage.try_insert(42).unwrap();
/// assert_eq!(storage.get(key), Some(&42));
/// ```
pub struct SlotStorage<T, K: Key = u32> {
    slots: Box<[Slot<T, K>]>,
    free_head: K,
    len: usize,
    _marker: PhantomData<K>,
}

impl<T, K: Key> SlotStorage<T, K> {
    /// Creates storage with exactly `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or does not fit the key type.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        assert!(
            capacity <= K::NONE.as_usize(),
            "capacity exceeds key type maximum"
        );

        let slots = (0..capacity)
            .map(|i| Slot::Vacant {
                next_free: if i + 1 < capacity {
                    K::from_usize(i + 1)
                } else {
                    K::NONE
                },
            })
            .collect();

        Self {
            slots,
            free_head: K::from_usize(0),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Returns the capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slots are occupied.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if all slots are occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head.is_none()
    }

    /// Drops every stored value and makes all slots vacant.
    ///
    /// Any list, heap or tree still holding keys into this storage is left
    /// dangling; clear those first.
    pub fn clear(&mut self) {
        let capacity = self.slots.len();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = Slot::Vacant {
                next_free: if i + 1 < capacity {
                    K::from_usize(i + 1)
                } else {
                    K::NONE
                },
            };
        }
        self.free_head = K::from_usize(0);
        self.len = 0;
    }
}

impl<T, K: Key> Storage<T> for SlotStorage<T, K> {
    type Key = K;
    type Error = Full<T>;

    #[inline]
    fn try_insert(&mut self, value: T) -> Result<K, Full<T>> {
        let key = self.free_head;
        if key.is_none() {
            return Err(Full(value));
        }

        let slot = &mut self.slots[key.as_usize()];
        match *slot {
            Slot::Vacant { next_free } => self.free_head = next_free,
            Slot::Occupied(_) => panic!("free list corruption: occupied slot in free list"),
        }
        *slot = Slot::Occupied(value);
        self.len += 1;

        Ok(key)
    }

    #[inline]
    fn remove(&mut self, key: K) -> Option<T> {
        let slot = self.slots.get_mut(key.as_usize())?;
        if let Slot::Vacant { .. } = slot {
            return None;
        }

        let old = core::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = key;
        self.len -= 1;

        match old {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    #[inline]
    fn get(&self, key: K) -> Option<&T> {
        match self.slots.get(key.as_usize())? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    #[inline]
    fn get_mut(&mut self, key: K) -> Option<&mut T> {
        match self.slots.get_mut(key.as_usize())? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    #[inline]
    unsafe fn get_unchecked(&self, key: K) -> &T {
        // Safety: caller guarantees key is in bounds and occupied
        match unsafe { self.slots.get_unchecked(key.as_usize()) } {
            Slot::Occupied(value) => value,
            Slot::Vacant { .. } => unsafe { unreachable_unchecked() },
        }
    }

    #[inline]
    unsafe fn get_unchecked_mut(&mut self, key: K) -> &mut T {
        // Safety: caller guarantees key is in bounds and occupied
        match unsafe { self.slots.get_unchecked_mut(key.as_usize()) } {
            Slot::Occupied(value) => value,
            Slot::Vacant { .. } => unsafe { unreachable_unchecked() },
        }
    }
}

// =============================================================================
// slab::Slab implementation
// =============================================================================

#[cfg(feature = "slab")]
impl<T> Storage<T> for slab::Slab<T> {
    type Key = usize;
    type Error = core::convert::Infallible;

    #[inline]
    fn try_insert(&mut self, value: T) -> Result<usize, Self::Error> {
        Ok(self.insert(value))
    }

    #[inline]
    fn remove(&mut self, key: usize) -> Option<T> {
        self.try_remove(key)
    }

    #[inline]
    fn get(&self, key: usize) -> Option<&T> {
        self.get(key)
    }

    #[inline]
    fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        self.get_mut(key)
    }

    #[inline]
    unsafe fn get_unchecked(&self, key: usize) -> &T {
        unsafe { slab::Slab::get_unchecked(self, key) }
    }

    #[inline]
    unsafe fn get_unchecked_mut(&mut self, key: usize) -> &mut T {
        unsafe { slab::Slab::get_unchecked_mut(self, key) }
    }
}
