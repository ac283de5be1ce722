//! Intrusive doubly-linked list over external storage.
//!
//! Records embed a [`ListLinks`] and expose it through [`Linked`]. The list
//! owns only its head: the first and last keys plus a length. Records are
//! never allocated or dropped by the list.
//!
//! The links form a closed ring through the head. A node whose `next` is
//! `K::NONE` is the back of the list, a node whose `prev` is `K::NONE` is the
//! front, and the head's own links are both `K::NONE` exactly when the list
//! is empty. Every insert and remove is O(1).
//!
//! # Storage Invariant
//!
//! A list instance must always be used with the same storage instance.
//! Passing a different storage corrupts the ring. This is the caller's
//! responsibility to enforce (same discipline as the `slab` crate).
//!
//! # Example
//!
//! ```
//! use keel_collections::{Linked, List, ListLinks, SlotStorage, Storage};
//!
//! #[derive(Debug)]
//! struct Order {
//!     price: u64,
//!     links: ListLinks<u32>,
//! }
//!
//! impl Linked<u32> for Order {
//!     fn links(&self) -> &ListLinks<u32> { &self.links }
//!     fn links_mut(&mut self) -> &mut ListLinks<u32> { &mut self.links }
//! }
//!
//! let mut orders: SlotStorage<Order> = SlotStorage::with_capacity(16);
//! let mut queue: List<u32> = List::new();
//!
//! for price in [30, 10, 20] {
//!     let key = orders.try_insert(Order { price, links: ListLinks::new() }).unwrap();
//!     queue.insert_back(&mut orders, key);
//! }
//!
//! queue.sort(&mut orders, |a, b| a.price.cmp(&b.price));
//!
//! let prices: Vec<u64> = queue.iter(&orders).map(|o| o.price).collect();
//! assert_eq!(prices, vec![10, 20, 30]);
//! ```

use core::cmp::Ordering;
use std::marker::PhantomData;

use crate::{Key, Storage};

/// Previous/next links embedded in a list record.
///
/// `K::NONE` in either field refers to the list head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLinks<K: Key> {
    prev: K,
    next: K,
}

impl<K: Key> ListLinks<K> {
    /// Creates unlinked links.
    #[inline]
    pub const fn new() -> Self {
        Self {
            prev: K::NONE,
            next: K::NONE,
        }
    }

    /// Returns the previous key, `K::NONE` for the head.
    #[inline]
    pub const fn prev(&self) -> K {
        self.prev
    }

    /// Returns the next key, `K::NONE` for the head.
    #[inline]
    pub const fn next(&self) -> K {
        self.next
    }
}

impl<K: Key> Default for ListLinks<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for records that can be linked into a [`List`].
///
/// A record can sit in several lists at once by embedding one
/// [`ListLinks`] per list, with a wrapper type selecting which one to use.
pub trait Linked<K: Key> {
    /// Returns the embedded links.
    fn links(&self) -> &ListLinks<K>;

    /// Returns the embedded links mutably.
    fn links_mut(&mut self) -> &mut ListLinks<K>;
}

/// A circular doubly-linked list over external storage.
#[derive(Debug, Clone)]
pub struct List<K: Key> {
    /// `next` is the front, `prev` is the back.
    head: ListLinks<K>,
    len: usize,
}

impl<K: Key> Default for List<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> List<K> {
    /// Creates an empty list.
    #[inline]
    pub const fn new() -> Self {
        Self {
            head: ListLinks::new(),
            len: 0,
        }
    }

    /// Returns the number of linked records.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no records are linked.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the front key.
    #[inline]
    pub fn front(&self) -> Option<K> {
        Some(self.head.next).filter(|k| k.is_some())
    }

    /// Returns the back key.
    #[inline]
    pub fn back(&self) -> Option<K> {
        Some(self.head.prev).filter(|k| k.is_some())
    }

    /// Returns the key after `key`, or `None` if `key` is the back.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    #[inline]
    pub fn next<T, S>(&self, storage: &S, key: K) -> Option<K>
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let next = storage.get(key).expect("invalid key").links().next;
        Some(next).filter(|k| k.is_some())
    }

    /// Returns the key before `key`, or `None` if `key` is the front.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    #[inline]
    pub fn prev<T, S>(&self, storage: &S, key: K) -> Option<K>
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let prev = storage.get(key).expect("invalid key").links().prev;
        Some(prev).filter(|k| k.is_some())
    }

    /// Links `key` at the back.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    #[inline]
    pub fn insert_back<T, S>(&mut self, storage: &mut S, key: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let back = self.head.prev;
        self.link(storage, back, K::NONE, key);
        self.len += 1;
    }

    /// Links `key` at the front.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    #[inline]
    pub fn insert_front<T, S>(&mut self, storage: &mut S, key: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let front = self.head.next;
        self.link(storage, K::NONE, front, key);
        self.len += 1;
    }

    /// Links `key` immediately before `reference`.
    ///
    /// A `reference` of `K::NONE` names the head, so the record lands at the
    /// back.
    ///
    /// # Panics
    ///
    /// Panics if `reference` or `key` is not valid in storage.
    #[inline]
    pub fn insert_before<T, S>(&mut self, storage: &mut S, reference: K, key: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let prev = self.prev_of(storage, reference);
        self.link(storage, prev, reference, key);
        self.len += 1;
    }

    /// Links `key` immediately after `reference`.
    ///
    /// A `reference` of `K::NONE` names the head, so the record lands at the
    /// front.
    ///
    /// # Panics
    ///
    /// Panics if `reference` or `key` is not valid in storage.
    #[inline]
    pub fn insert_after<T, S>(&mut self, storage: &mut S, reference: K, key: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let next = self.next_of(storage, reference);
        self.link(storage, reference, next, key);
        self.len += 1;
    }

    /// Unlinks `key`.
    ///
    /// The record stays in storage and its own links are left stale; relink
    /// it before reading them again.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    #[inline]
    pub fn remove<T, S>(&mut self, storage: &mut S, key: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        debug_assert!(self.len > 0, "remove from empty list");
        self.unlink(storage, key);
        self.len -= 1;
    }

    /// Puts `new` in `old`'s position. `old`'s links are left stale.
    ///
    /// # Panics
    ///
    /// Panics if `old` or `new` is not valid in storage.
    #[inline]
    pub fn replace<T, S>(&mut self, storage: &mut S, old: K, new: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let links = *storage.get(old).expect("invalid key").links();
        self.link(storage, links.prev, links.next, new);
    }

    /// Moves every record of `other` to the back of this list.
    ///
    /// Both lists must share `storage`.
    pub fn append<T, S>(&mut self, storage: &mut S, other: &mut List<K>)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        if other.is_empty() {
            return;
        }

        let first = other.head.next;
        let last = other.head.prev;
        let back = self.head.prev;

        self.set_prev(storage, first, back);
        self.set_next(storage, back, first);
        self.set_next(storage, last, K::NONE);
        self.head.prev = last;

        self.len += other.len;
        *other = List::new();
    }

    /// Forgets every record without touching storage.
    ///
    /// Records keep stale links.
    #[inline]
    pub fn clear(&mut self) {
        self.head = ListLinks::new();
        self.len = 0;
    }

    /// Returns an iterator over keys, front to back.
    ///
    /// Also iterates back to front via [`DoubleEndedIterator`].
    #[inline]
    pub fn keys<'a, T, S>(&'a self, storage: &'a S) -> Keys<'a, K, T, S>
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        Keys {
            storage,
            front: self.head.next,
            back: self.head.prev,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator over records, front to back.
    #[inline]
    pub fn iter<'a, T, S>(&'a self, storage: &'a S) -> Iter<'a, K, T, S>
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        Iter {
            keys: self.keys(storage),
        }
    }

    /// Returns a cursor positioned at the front.
    ///
    /// On an empty list the cursor starts at the head.
    #[inline]
    pub fn cursor_front(&mut self) -> Cursor<'_, K> {
        let current = self.head.next;
        Cursor {
            list: self,
            current,
        }
    }

    /// Returns a cursor positioned at the back.
    #[inline]
    pub fn cursor_back(&mut self) -> Cursor<'_, K> {
        let current = self.head.prev;
        Cursor {
            list: self,
            current,
        }
    }

    /// Keeps only the records for which `f` returns `true`.
    ///
    /// Rejected records are unlinked, front to back, and stay in storage.
    pub fn retain<T, S, F>(&mut self, storage: &mut S, mut f: F)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
        F: FnMut(K, &mut T) -> bool,
    {
        let mut key = self.head.next;
        while key.is_some() {
            let record = storage.get_mut(key).expect("invalid key");
            let next = record.links().next;
            if !f(key, record) {
                self.remove(storage, key);
            }
            key = next;
        }
    }

    /// Sorts the list in place by relinking records.
    ///
    /// Partition sort: the front of each sublist is the pivot, and every
    /// record that compares `Less` than it is moved in front of it. Not
    /// stable. O(n log n) on average, O(n²) on already-sorted input. Uses no
    /// memory beyond O(log n) stack.
    pub fn sort<T, S, F>(&mut self, storage: &mut S, mut cmp: F)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        self.sort_between(storage, K::NONE, K::NONE, &mut cmp);
    }

    /// Sorts the records strictly between `before` and `after`.
    fn sort_between<T, S, F>(&mut self, storage: &mut S, mut before: K, mut after: K, cmp: &mut F)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        loop {
            let pivot = self.next_of(storage, before);
            if pivot == after {
                return;
            }
            let mut item = self.prev_of(storage, after);
            if item == pivot {
                return;
            }

            let mut moved = 0usize;
            let mut kept = 0usize;

            while item != pivot {
                let prev = self.prev_of(storage, item);
                let less = {
                    // Safety: item and pivot are linked, hence occupied
                    let (a, b) = unsafe { (storage.get_unchecked(item), storage.get_unchecked(pivot)) };
                    cmp(a, b) == Ordering::Less
                };
                if less {
                    self.unlink(storage, item);
                    let pivot_prev = self.prev_of(storage, pivot);
                    self.link(storage, pivot_prev, pivot, item);
                    moved += 1;
                } else {
                    kept += 1;
                }
                item = prev;
            }

            // Recurse into the smaller side, loop on the larger one.
            if moved < kept {
                self.sort_between(storage, before, pivot, cmp);
                before = pivot;
            } else {
                self.sort_between(storage, pivot, after, cmp);
                after = pivot;
            }
        }
    }

    // =========================================================================
    // Link primitives - K::NONE routes to the head
    // =========================================================================

    #[inline]
    fn next_of<T, S>(&self, storage: &S, key: K) -> K
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        if key.is_none() {
            self.head.next
        } else {
            storage.get(key).expect("invalid key").links().next
        }
    }

    #[inline]
    fn prev_of<T, S>(&self, storage: &S, key: K) -> K
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        if key.is_none() {
            self.head.prev
        } else {
            storage.get(key).expect("invalid key").links().prev
        }
    }

    #[inline]
    fn set_next<T, S>(&mut self, storage: &mut S, key: K, next: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        if key.is_none() {
            self.head.next = next;
        } else {
            storage.get_mut(key).expect("invalid key").links_mut().next = next;
        }
    }

    #[inline]
    fn set_prev<T, S>(&mut self, storage: &mut S, key: K, prev: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        if key.is_none() {
            self.head.prev = prev;
        } else {
            storage.get_mut(key).expect("invalid key").links_mut().prev = prev;
        }
    }

    /// Splices `key` between the adjacent pair `prev`/`next`. Does not touch `len`.
    #[inline]
    fn link<T, S>(&mut self, storage: &mut S, prev: K, next: K, key: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        assert!(key.is_some(), "cannot link the head");
        *storage.get_mut(key).expect("invalid key").links_mut() = ListLinks { prev, next };
        self.set_next(storage, prev, key);
        self.set_prev(storage, next, key);
    }

    /// Closes the ring over `key`. Does not touch `len`.
    #[inline]
    fn unlink<T, S>(&mut self, storage: &mut S, key: K)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let links = *storage.get(key).expect("invalid key").links();
        self.set_next(storage, links.prev, links.next);
        self.set_prev(storage, links.next, links.prev);
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Iterator over list keys. See [`List::keys`].
pub struct Keys<'a, K: Key, T, S> {
    storage: &'a S,
    front: K,
    back: K,
    remaining: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, K, T, S> Iterator for Keys<'a, K, T, S>
where
    K: Key,
    T: Linked<K>,
    S: Storage<T, Key = K>,
{
    type Item = K;

    #[inline]
    fn next(&mut self) -> Option<K> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.front;
        self.front = self.storage.get(key).expect("invalid key").links().next;
        self.remaining -= 1;
        Some(key)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, T, S> DoubleEndedIterator for Keys<'a, K, T, S>
where
    K: Key,
    T: Linked<K>,
    S: Storage<T, Key = K>,
{
    #[inline]
    fn next_back(&mut self) -> Option<K> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.back;
        self.back = self.storage.get(key).expect("invalid key").links().prev;
        self.remaining -= 1;
        Some(key)
    }
}

impl<'a, K, T, S> ExactSizeIterator for Keys<'a, K, T, S>
where
    K: Key,
    T: Linked<K>,
    S: Storage<T, Key = K>,
{
}

/// Iterator over list records. See [`List::iter`].
pub struct Iter<'a, K: Key, T, S> {
    keys: Keys<'a, K, T, S>,
}

impl<'a, K, T, S> Iterator for Iter<'a, K, T, S>
where
    K: Key,
    T: Linked<K> + 'a,
    S: Storage<T, Key = K>,
{
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        let key = self.keys.next()?;
        let storage = self.keys.storage;
        storage.get(key)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<'a, K, T, S> DoubleEndedIterator for Iter<'a, K, T, S>
where
    K: Key,
    T: Linked<K> + 'a,
    S: Storage<T, Key = K>,
{
    #[inline]
    fn next_back(&mut self) -> Option<&'a T> {
        let key = self.keys.next_back()?;
        let storage = self.keys.storage;
        storage.get(key)
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// A position in a [`List`] that survives removal of the current record.
///
/// The cursor walks the ring, including a "ghost" position at the head
/// between back and front where [`Cursor::current`] is `None`.
///
/// ```
/// use keel_collections::{Linked, List, ListLinks, SlotStorage, Storage};
///
/// #[derive(Debug)]
/// struct Job { id: u32, links: ListLinks<u32> }
///
/// impl Linked<u32> for Job {
///     fn links(&self) -> &ListLinks<u32> { &self.links }
///     fn links_mut(&mut self) -> &mut ListLinks<u32> { &mut self.links }
/// }
///
/// let mut jobs: SlotStorage<Job> = SlotStorage::with_capacity(8);
/// let mut list: List<u32> = List::new();
/// for id in 0..6 {
///     let key = jobs.try_insert(Job { id, links: ListLinks::new() }).unwrap();
///     list.insert_back(&mut jobs, key);
/// }
///
/// let mut cursor = list.cursor_front();
/// while let Some(key) = cursor.current() {
///     if jobs.get(key).unwrap().id % 2 == 1 {
///         cursor.remove_current(&mut jobs);
///     } else {
///         cursor.move_next(&jobs);
///     }
/// }
///
/// let ids: Vec<u32> = list.iter(&jobs).map(|j| j.id).collect();
/// assert_eq!(ids, vec![0, 2, 4]);
/// ```
pub struct Cursor<'a, K: Key> {
    list: &'a mut List<K>,
    current: K,
}

impl<'a, K: Key> Cursor<'a, K> {
    /// Returns the current key, or `None` at the head.
    #[inline]
    pub fn current(&self) -> Option<K> {
        Some(self.current).filter(|k| k.is_some())
    }

    /// Advances toward the back, wrapping through the head.
    #[inline]
    pub fn move_next<T, S>(&mut self, storage: &S)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        self.current = self.list.next_of(storage, self.current);
    }

    /// Steps toward the front, wrapping through the head.
    #[inline]
    pub fn move_prev<T, S>(&mut self, storage: &S)
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        self.current = self.list.prev_of(storage, self.current);
    }

    /// Unlinks the current record and moves to the next one.
    ///
    /// Returns the removed key, or `None` at the head.
    pub fn remove_current<T, S>(&mut self, storage: &mut S) -> Option<K>
    where
        T: Linked<K>,
        S: Storage<T, Key = K>,
    {
        let key = self.current()?;
        let next = self.list.next_of(storage, key);
        self.list.remove(storage, key);
        self.current = next;
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SlotStorage;
    use proptest::prelude::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[derive(Debug)]
    struct Node {
        value: u64,
        links: ListLinks<u32>,
    }

    impl Node {
        fn new(value: u64) -> Self {
            Self {
                value,
                links: ListLinks::new(),
            }
        }
    }

    impl Linked<u32> for Node {
        fn links(&self) -> &ListLinks<u32> {
            &self.links
        }
        fn links_mut(&mut self) -> &mut ListLinks<u32> {
            &mut self.links
        }
    }

    fn values(list: &List<u32>, storage: &SlotStorage<Node>) -> Vec<u64> {
        list.iter(storage).map(|n| n.value).collect()
    }

    fn fill(storage: &mut SlotStorage<Node>, list: &mut List<u32>, values: &[u64]) -> Vec<u32> {
        values
            .iter()
            .map(|&v| {
                let key = storage.try_insert(Node::new(v)).unwrap();
                list.insert_back(storage, key);
                key
            })
            .collect()
    }

    /// Walks the ring both ways and checks every link points back.
    fn assert_ring(list: &List<u32>, storage: &SlotStorage<Node>) {
        let mut count = 0;
        let mut prev = u32::NONE;
        let mut key = list.head.next;
        while key.is_some() {
            let links = storage.get(key).unwrap().links();
            assert_eq!(links.prev, prev, "broken prev link at {key}");
            prev = key;
            key = links.next;
            count += 1;
            assert!(count <= list.len(), "ring longer than len");
        }
        assert_eq!(list.head.prev, prev, "head.prev is not the back");
        assert_eq!(count, list.len());
        assert_eq!(list.is_empty(), count == 0);
    }

    #[test]
    fn new_list_is_empty() {
        let list: List<u32> = List::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);
    }

    #[test]
    fn insert_back_and_front() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();

        let a = storage.try_insert(Node::new(1)).unwrap();
        let b = storage.try_insert(Node::new(2)).unwrap();
        let c = storage.try_insert(Node::new(3)).unwrap();

        list.insert_back(&mut storage, b);
        list.insert_front(&mut storage, a);
        list.insert_back(&mut storage, c);

        assert_eq!(values(&list, &storage), vec![1, 2, 3]);
        assert_eq!(list.front(), Some(a));
        assert_eq!(list.back(), Some(c));
        assert_eq!(list.next(&storage, a), Some(b));
        assert_eq!(list.prev(&storage, a), None);
        assert_eq!(list.next(&storage, c), None);
        assert_ring(&list, &storage);
    }

    #[test]
    fn insert_before_and_after() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();

        let keys = fill(&mut storage, &mut list, &[1, 4]);
        let two = storage.try_insert(Node::new(2)).unwrap();
        let three = storage.try_insert(Node::new(3)).unwrap();
        let five = storage.try_insert(Node::new(5)).unwrap();
        let zero = storage.try_insert(Node::new(0)).unwrap();

        list.insert_after(&mut storage, keys[0], two);
        list.insert_before(&mut storage, keys[1], three);
        list.insert_after(&mut storage, keys[1], five);
        list.insert_before(&mut storage, keys[0], zero);

        assert_eq!(values(&list, &storage), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(list.front(), Some(zero));
        assert_eq!(list.back(), Some(five));
        assert_ring(&list, &storage);
    }

    #[test]
    fn head_as_reference() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();

        fill(&mut storage, &mut list, &[2]);
        let first = storage.try_insert(Node::new(1)).unwrap();
        let last = storage.try_insert(Node::new(3)).unwrap();

        list.insert_after(&mut storage, u32::NONE, first);
        list.insert_before(&mut storage, u32::NONE, last);

        assert_eq!(values(&list, &storage), vec![1, 2, 3]);
        assert_ring(&list, &storage);
    }

    #[test]
    fn remove_front_middle_back() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        let keys = fill(&mut storage, &mut list, &[1, 2, 3, 4, 5]);

        list.remove(&mut storage, keys[2]);
        assert_eq!(values(&list, &storage), vec![1, 2, 4, 5]);

        list.remove(&mut storage, keys[0]);
        assert_eq!(values(&list, &storage), vec![2, 4, 5]);

        list.remove(&mut storage, keys[4]);
        assert_eq!(values(&list, &storage), vec![2, 4]);
        assert_ring(&list, &storage);

        list.remove(&mut storage, keys[1]);
        list.remove(&mut storage, keys[3]);
        assert!(list.is_empty());
        assert_ring(&list, &storage);
    }

    #[test]
    fn remove_leaves_links_stale() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        let keys = fill(&mut storage, &mut list, &[1, 2, 3]);

        list.remove(&mut storage, keys[1]);

        let links = storage.get(keys[1]).unwrap().links();
        assert_eq!(links.prev(), keys[0]);
        assert_eq!(links.next(), keys[2]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        let keys = fill(&mut storage, &mut list, &[1, 2, 3]);

        let new = storage.try_insert(Node::new(20)).unwrap();
        list.replace(&mut storage, keys[1], new);
        assert_eq!(values(&list, &storage), vec![1, 20, 3]);
        assert_eq!(list.len(), 3);

        let front = storage.try_insert(Node::new(10)).unwrap();
        list.replace(&mut storage, keys[0], front);
        let back = storage.try_insert(Node::new(30)).unwrap();
        list.replace(&mut storage, keys[2], back);

        assert_eq!(values(&list, &storage), vec![10, 20, 30]);
        assert_eq!(list.front(), Some(front));
        assert_eq!(list.back(), Some(back));
        assert_ring(&list, &storage);
    }

    #[test]
    fn keys_double_ended() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        let keys = fill(&mut storage, &mut list, &[1, 2, 3, 4]);

        let rev: Vec<u32> = list.keys(&storage).rev().collect();
        assert_eq!(rev, vec![keys[3], keys[2], keys[1], keys[0]]);

        let mut it = list.keys(&storage);
        assert_eq!(it.len(), 4);
        assert_eq!(it.next(), Some(keys[0]));
        assert_eq!(it.next_back(), Some(keys[3]));
        assert_eq!(it.next(), Some(keys[1]));
        assert_eq!(it.next_back(), Some(keys[2]));
        assert_eq!(it.next(), None);
        assert_eq!(it.next_back(), None);
    }

    #[test]
    fn append_moves_all() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut a: List<u32> = List::new();
        let mut b: List<u32> = List::new();

        fill(&mut storage, &mut a, &[1, 2]);
        fill(&mut storage, &mut b, &[3, 4, 5]);

        a.append(&mut storage, &mut b);
        assert_eq!(values(&a, &storage), vec![1, 2, 3, 4, 5]);
        assert!(b.is_empty());
        assert_ring(&a, &storage);

        // Appending into an empty list
        let mut c: List<u32> = List::new();
        c.append(&mut storage, &mut a);
        assert_eq!(values(&c, &storage), vec![1, 2, 3, 4, 5]);
        assert!(a.is_empty());
        assert_ring(&c, &storage);
    }

    #[test]
    fn clear_forgets_records() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        let keys = fill(&mut storage, &mut list, &[1, 2]);

        list.clear();
        assert!(list.is_empty());
        assert_eq!(storage.len(), 2);

        list.insert_back(&mut storage, keys[1]);
        assert_eq!(values(&list, &storage), vec![2]);
    }

    #[test]
    fn cursor_walks_through_head() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        let keys = fill(&mut storage, &mut list, &[1, 2]);

        let mut cursor = list.cursor_back();
        assert_eq!(cursor.current(), Some(keys[1]));
        cursor.move_next(&storage);
        assert_eq!(cursor.current(), None);
        cursor.move_next(&storage);
        assert_eq!(cursor.current(), Some(keys[0]));
        cursor.move_prev(&storage);
        assert_eq!(cursor.current(), None);
        cursor.move_prev(&storage);
        assert_eq!(cursor.current(), Some(keys[1]));
    }

    #[test]
    fn cursor_remove_all() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        let keys = fill(&mut storage, &mut list, &[1, 2, 3]);

        let mut removed = Vec::new();
        let mut cursor = list.cursor_front();
        while let Some(key) = cursor.remove_current(&mut storage) {
            removed.push(key);
        }

        assert_eq!(removed, keys);
        assert!(list.is_empty());
        assert_ring(&list, &storage);
    }

    #[test]
    fn retain_even() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        fill(&mut storage, &mut list, &[1, 2, 3, 4, 5, 6]);

        list.retain(&mut storage, |_, node| node.value % 2 == 0);

        assert_eq!(values(&list, &storage), vec![2, 4, 6]);
        assert_ring(&list, &storage);
    }

    #[test]
    fn sort_small_cases() {
        for input in [
            vec![],
            vec![1],
            vec![2, 1],
            vec![1, 2],
            vec![3, 1, 2],
            vec![5, 5, 5],
            vec![1, 2, 3, 4, 5],
            vec![5, 4, 3, 2, 1],
            vec![4, 1, 3, 1, 5, 9, 2, 6],
        ] {
            let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
            let mut list: List<u32> = List::new();
            fill(&mut storage, &mut list, &input);

            list.sort(&mut storage, |a, b| a.value.cmp(&b.value));

            let mut expected = input.clone();
            expected.sort();
            assert_eq!(values(&list, &storage), expected);
            assert_ring(&list, &storage);
        }
    }

    #[test]
    fn sort_descending_comparator() {
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(16);
        let mut list: List<u32> = List::new();
        fill(&mut storage, &mut list, &[3, 9, 1, 7]);

        list.sort(&mut storage, |a, b| b.value.cmp(&a.value));

        assert_eq!(values(&list, &storage), vec![9, 7, 3, 1]);
    }

    #[test]
    fn sort_already_sorted_large() {
        // Worst case for a front pivot; recursion depth stays bounded.
        let n = 5_000;
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(n);
        let mut list: List<u32> = List::new();
        let input: Vec<u64> = (0..n as u64).collect();
        fill(&mut storage, &mut list, &input);

        list.sort(&mut storage, |a, b| a.value.cmp(&b.value));

        assert_eq!(values(&list, &storage), input);
    }

    #[test]
    fn random_ops_keep_ring() {
        const CAPACITY: usize = 256;

        let mut rng = SmallRng::seed_from_u64(0x11_57);
        let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(CAPACITY);
        let mut list: List<u32> = List::new();
        let mut linked: Vec<u32> = Vec::new();
        let mut free: Vec<u32> = (0..CAPACITY)
            .map(|i| storage.try_insert(Node::new(i as u64)).unwrap())
            .collect();

        for _ in 0..10_000 {
            let op = rng.random_range(0..6);
            if op < 4 && !free.is_empty() {
                let key = free.swap_remove(rng.random_range(0..free.len()));
                match op {
                    0 => list.insert_back(&mut storage, key),
                    1 => list.insert_front(&mut storage, key),
                    _ if linked.is_empty() => list.insert_back(&mut storage, key),
                    2 => {
                        let r = linked[rng.random_range(0..linked.len())];
                        list.insert_before(&mut storage, r, key);
                    }
                    _ => {
                        let r = linked[rng.random_range(0..linked.len())];
                        list.insert_after(&mut storage, r, key);
                    }
                }
                linked.push(key);
            } else if !linked.is_empty() {
                let key = linked.swap_remove(rng.random_range(0..linked.len()));
                list.remove(&mut storage, key);
                free.push(key);
            }
        }

        assert_ring(&list, &storage);
        assert_eq!(list.len(), linked.len());
    }

    proptest! {
        #[test]
        fn sort_is_non_decreasing(input in proptest::collection::vec(0u64..50, 0..200)) {
            let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(200);
            let mut list: List<u32> = List::new();
            fill(&mut storage, &mut list, &input);

            list.sort(&mut storage, |a, b| a.value.cmp(&b.value));

            let mut expected = input.clone();
            expected.sort();
            prop_assert_eq!(values(&list, &storage), expected);
            assert_ring(&list, &storage);
        }
    }

    #[cfg(target_arch = "x86_64")]
    mod latency {
        use super::*;
        use hdrhistogram::Histogram;

        #[inline]
        fn rdtscp() -> u64 {
            unsafe { core::arch::x86_64::__rdtscp(&mut 0) }
        }

        fn print_histogram(name: &str, hist: &Histogram<u64>) {
            println!(
                "{:24} p50: {:4} cycles | p99: {:4} cycles | p999: {:5} cycles | min: {:4} | max: {:5}",
                name,
                hist.value_at_quantile(0.50),
                hist.value_at_quantile(0.99),
                hist.value_at_quantile(0.999),
                hist.min(),
                hist.max(),
            );
        }

        const WARMUP: usize = 10_000;
        const ITERATIONS: usize = 100_000;

        #[test]
        #[ignore]
        fn bench_list_insert_remove() {
            let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(1024);
            let mut list: List<u32> = List::new();
            let keys: Vec<u32> = (0..1024)
                .map(|i| storage.try_insert(Node::new(i)).unwrap())
                .collect();
            for &key in &keys[1..] {
                list.insert_back(&mut storage, key);
            }

            let mut insert = Histogram::<u64>::new(3).unwrap();
            let mut remove = Histogram::<u64>::new(3).unwrap();

            for i in 0..WARMUP + ITERATIONS {
                let start = rdtscp();
                list.insert_back(&mut storage, keys[0]);
                let mid = rdtscp();
                list.remove(&mut storage, keys[0]);
                let end = rdtscp();

                if i >= WARMUP {
                    insert.record(mid - start).unwrap();
                    remove.record(end - mid).unwrap();
                }
            }

            print_histogram("insert_back", &insert);
            print_histogram("remove", &remove);
        }

        #[test]
        #[ignore]
        fn bench_list_sort_1k() {
            let mut rng = SmallRng::seed_from_u64(7);
            let mut storage: SlotStorage<Node> = SlotStorage::with_capacity(1024);
            let mut list: List<u32> = List::new();
            for _ in 0..1024 {
                let key = storage.try_insert(Node::new(0)).unwrap();
                list.insert_back(&mut storage, key);
            }

            let mut hist = Histogram::<u64>::new(3).unwrap();
            for _ in 0..1_000 {
                for key in list.keys(&storage).collect::<Vec<_>>() {
                    storage.get_mut(key).unwrap().value = rng.random();
                }
                let start = rdtscp();
                list.sort(&mut storage, |a, b| a.value.cmp(&b.value));
                hist.record(rdtscp() - start).unwrap();
            }

            print_histogram("sort (1024)", &hist);
        }
    }
}
