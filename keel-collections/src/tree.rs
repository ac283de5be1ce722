//! Intrusive red-black tree over external storage.
//!
//! Records embed [`TreeLinks`] and expose them through [`TreeEntry`].
//! `K::NONE` plays the shared black leaf: every missing child and the root's
//! parent is `K::NONE`. The only sentinel state that is ever written is its
//! parent link, which the tree stores itself so removal can rebalance
//! starting from an empty position.
//!
//! Ordering is supplied per call. Insertion sends ties to the right, so
//! records that compare equal keep their insertion order in an in-order walk.

use core::cmp::Ordering;
use core::mem;
use std::marker::PhantomData;

use crate::{Key, Storage};

/// Node color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Red node.
    Red,
    /// Black node. The sentinel is always black.
    Black,
}

/// Parent, child and color links embedded in a tree record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLinks<K: Key> {
    parent: K,
    left: K,
    right: K,
    color: Color,
}

impl<K: Key> TreeLinks<K> {
    /// Creates unlinked links.
    #[inline]
    pub const fn new() -> Self {
        Self {
            parent: K::NONE,
            left: K::NONE,
            right: K::NONE,
            color: Color::Black,
        }
    }

    /// Returns the parent key, `K::NONE` at the root.
    #[inline]
    pub const fn parent(&self) -> K {
        self.parent
    }

    /// Returns the left child key.
    #[inline]
    pub const fn left(&self) -> K {
        self.left
    }

    /// Returns the right child key.
    #[inline]
    pub const fn right(&self) -> K {
        self.right
    }

    /// Returns the node color.
    #[inline]
    pub const fn color(&self) -> Color {
        self.color
    }
}

impl<K: Key> Default for TreeLinks<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for records that can be linked into a [`Tree`].
pub trait TreeEntry<K: Key> {
    /// Returns the embedded links.
    fn tree_links(&self) -> &TreeLinks<K>;

    /// Returns the embedded links mutably.
    fn tree_links_mut(&mut self) -> &mut TreeLinks<K>;
}

/// A red-black tree of storage keys.
///
/// # Example
///
/// ```
/// use keel_collections::{SlotStorage, Storage, Tree, TreeEntry, TreeLinks};
///
/// #[derive(Debug)]
/// struct Session {
///     id: u64,
///     links: TreeLinks<u32>,
/// }
///
/// impl TreeEntry<u32> for Session {
///     fn tree_links(&self) -> &TreeLinks<u32> { &self.links }
///     fn tree_links_mut(&mut self) -> &mut TreeLinks<u32> { &mut self.links }
/// }
///
/// let mut sessions: SlotStorage<Session> = SlotStorage::with_capacity(16);
/// let mut tree: Tree<u32> = Tree::new();
///
/// for id in [42, 7, 19] {
///     let key = sessions.try_insert(Session { id, links: TreeLinks::new() }).unwrap();
///     tree.insert(&mut sessions, key, |a, b| a.id.cmp(&b.id));
/// }
///
/// let found = tree.search(&sessions, |s| s.id.cmp(&19)).unwrap();
/// assert_eq!(sessions.get(found).unwrap().id, 19);
///
/// let min = tree.find_min(&sessions).unwrap();
/// assert_eq!(sessions.get(min).unwrap().id, 7);
///
/// tree.remove(&mut sessions, found);
/// assert!(tree.search(&sessions, |s| s.id.cmp(&19)).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Tree<K: Key> {
    root: K,
    /// Parent link of the sentinel. Only meaningful during removal.
    nil_parent: K,
    len: usize,
}

impl<K: Key> Default for Tree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> Tree<K> {
    /// Creates an empty tree.
    #[inline]
    pub const fn new() -> Self {
        Self {
            root: K::NONE,
            nil_parent: K::NONE,
            len: 0,
        }
    }

    /// Returns the number of linked records.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the root key.
    #[inline]
    pub fn root(&self) -> Option<K> {
        Some(self.root).filter(|k| k.is_some())
    }

    /// Forgets every record without touching storage.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Links `key` into the tree.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    pub fn insert<T, S, F>(&mut self, storage: &mut S, key: K, mut cmp: F)
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T, &T) -> Ordering,
    {
        assert!(storage.get(key).is_some(), "invalid key");

        let mut parent = K::NONE;
        let mut cur = self.root;
        let mut go_left = false;
        while cur.is_some() {
            parent = cur;
            // Safety: key checked above, cur is linked
            go_left = unsafe { cmp(storage.get_unchecked(key), storage.get_unchecked(cur)) }.is_lt();
            cur = if go_left {
                links(storage, cur).left
            } else {
                links(storage, cur).right
            };
        }

        if parent.is_none() {
            self.root = key;
        } else if go_left {
            links_mut(storage, parent).left = key;
        } else {
            links_mut(storage, parent).right = key;
        }

        *links_mut(storage, key) = TreeLinks {
            parent,
            left: K::NONE,
            right: K::NONE,
            color: Color::Red,
        };
        self.len += 1;

        self.fix_insert(storage, key);
    }

    /// Unlinks `key`. The record stays in storage with stale links.
    ///
    /// A node with two children is replaced by an in-order neighbor. The
    /// predecessor and successor candidates are walked in lock-step and
    /// whichever is reached first is used.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    pub fn remove<T, S>(&mut self, storage: &mut S, key: K)
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        let node = *storage.get(key).expect("invalid key").tree_links();
        debug_assert!(self.len > 0, "remove from empty tree");

        let (spliced, child) = if node.left.is_none() {
            (key, node.right)
        } else if node.right.is_none() {
            (key, node.left)
        } else {
            let mut prev = node.left;
            let mut next = node.right;
            loop {
                let prev_right = links(storage, prev).right;
                if prev_right.is_none() {
                    break (prev, links(storage, prev).left);
                }
                let next_left = links(storage, next).left;
                if next_left.is_none() {
                    break (next, links(storage, next).right);
                }
                prev = prev_right;
                next = next_left;
            }
        };

        let spliced_parent = links(storage, spliced).parent;
        self.replace_child(storage, spliced_parent, spliced, child);
        self.set_parent(storage, child, spliced_parent);
        let broken = links(storage, spliced).color == Color::Black;

        if spliced != key {
            // Re-read: splicing may have rewritten one of key's children.
            let node = *links(storage, key);
            self.replace_child(storage, node.parent, key, spliced);
            {
                let moved = links_mut(storage, spliced);
                moved.parent = node.parent;
                moved.left = node.left;
                moved.right = node.right;
                moved.color = node.color;
            }
            self.set_parent(storage, node.left, spliced);
            self.set_parent(storage, node.right, spliced);
        }

        self.len -= 1;

        if broken {
            self.fix_remove(storage, child);
        }
    }

    /// Finds a record using a one-sided comparison.
    ///
    /// `matcher(record)` returns `Less` if the record sorts before the
    /// target, `Greater` if after, `Equal` on a match.
    pub fn search<T, S, F>(&self, storage: &S, mut matcher: F) -> Option<K>
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
        F: FnMut(&T) -> Ordering,
    {
        let mut cur = self.root;
        while cur.is_some() {
            // Safety: cur is linked
            let record = unsafe { storage.get_unchecked(cur) };
            cur = match matcher(record) {
                Ordering::Equal => return Some(cur),
                Ordering::Less => record.tree_links().right,
                Ordering::Greater => record.tree_links().left,
            };
        }
        None
    }

    /// Returns the leftmost key.
    pub fn find_min<T, S>(&self, storage: &S) -> Option<K>
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        self.root().map(|root| leftmost(storage, root))
    }

    /// Returns the rightmost key.
    pub fn find_max<T, S>(&self, storage: &S) -> Option<K>
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        self.root().map(|root| rightmost(storage, root))
    }

    /// Returns the in-order successor of `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    pub fn next<T, S>(&self, storage: &S, key: K) -> Option<K>
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        assert!(storage.get(key).is_some(), "invalid key");
        Some(successor(storage, key)).filter(|k| k.is_some())
    }

    /// Returns the in-order predecessor of `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not valid in storage.
    pub fn prev<T, S>(&self, storage: &S, key: K) -> Option<K>
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        assert!(storage.get(key).is_some(), "invalid key");
        Some(predecessor(storage, key)).filter(|k| k.is_some())
    }

    /// Returns an iterator over keys in order.
    pub fn keys<'a, T, S>(&self, storage: &'a S) -> Keys<'a, K, T, S>
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        Keys {
            storage,
            next: self.find_min(storage).unwrap_or(K::NONE),
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    // =========================================================================
    // Rebalancing
    // =========================================================================

    fn fix_insert<T, S>(&mut self, storage: &mut S, key: K)
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        let mut node = key;
        let mut parent = self.parent(storage, node);

        while color(storage, parent) == Color::Red {
            // A red parent is never the root, so the grandparent exists.
            let grand = links(storage, parent).parent;

            if parent == links(storage, grand).left {
                let uncle = links(storage, grand).right;
                if color(storage, uncle) == Color::Red {
                    set_color(storage, parent, Color::Black);
                    set_color(storage, grand, Color::Red);
                    set_color(storage, uncle, Color::Black);
                    node = grand;
                    parent = self.parent(storage, node);
                    continue;
                }

                if node == links(storage, parent).right {
                    self.rotate_left(storage, parent);
                    mem::swap(&mut node, &mut parent);
                }

                set_color(storage, parent, Color::Black);
                set_color(storage, grand, Color::Red);
                self.rotate_right(storage, grand);
            } else {
                let uncle = links(storage, grand).left;
                if color(storage, uncle) == Color::Red {
                    set_color(storage, parent, Color::Black);
                    set_color(storage, grand, Color::Red);
                    set_color(storage, uncle, Color::Black);
                    node = grand;
                    parent = self.parent(storage, node);
                    continue;
                }

                if node == links(storage, parent).left {
                    self.rotate_right(storage, parent);
                    mem::swap(&mut node, &mut parent);
                }

                set_color(storage, parent, Color::Black);
                set_color(storage, grand, Color::Red);
                self.rotate_left(storage, grand);
            }
        }

        let root = self.root;
        set_color(storage, root, Color::Black);
    }

    /// Restores black height after a black node was spliced out above `node`.
    ///
    /// `node` may be the sentinel, in which case its parent comes from
    /// `nil_parent`.
    fn fix_remove<T, S>(&mut self, storage: &mut S, mut node: K)
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        while color(storage, node) == Color::Black && node != self.root {
            let parent = self.parent(storage, node);

            if node == links(storage, parent).left {
                let mut sibling = links(storage, parent).right;
                if color(storage, sibling) == Color::Red {
                    set_color(storage, parent, Color::Red);
                    set_color(storage, sibling, Color::Black);
                    self.rotate_left(storage, parent);
                    sibling = links(storage, parent).right;
                }

                let mut far = links(storage, sibling).right;
                let near = links(storage, sibling).left;
                if color(storage, far) == Color::Black && color(storage, near) == Color::Black {
                    set_color(storage, sibling, Color::Red);
                    node = parent;
                    continue;
                }

                if color(storage, far) == Color::Black {
                    set_color(storage, sibling, Color::Red);
                    set_color(storage, near, Color::Black);
                    self.rotate_right(storage, sibling);
                    far = sibling;
                    sibling = near;
                }

                let parent_color = color(storage, parent);
                set_color(storage, sibling, parent_color);
                set_color(storage, parent, Color::Black);
                set_color(storage, far, Color::Black);
                self.rotate_left(storage, parent);
                node = self.root;
            } else {
                let mut sibling = links(storage, parent).left;
                if color(storage, sibling) == Color::Red {
                    set_color(storage, parent, Color::Red);
                    set_color(storage, sibling, Color::Black);
                    self.rotate_right(storage, parent);
                    sibling = links(storage, parent).left;
                }

                let mut far = links(storage, sibling).left;
                let near = links(storage, sibling).right;
                if color(storage, far) == Color::Black && color(storage, near) == Color::Black {
                    set_color(storage, sibling, Color::Red);
                    node = parent;
                    continue;
                }

                if color(storage, far) == Color::Black {
                    set_color(storage, sibling, Color::Red);
                    set_color(storage, near, Color::Black);
                    self.rotate_left(storage, sibling);
                    far = sibling;
                    sibling = near;
                }

                let parent_color = color(storage, parent);
                set_color(storage, sibling, parent_color);
                set_color(storage, parent, Color::Black);
                set_color(storage, far, Color::Black);
                self.rotate_right(storage, parent);
                node = self.root;
            }
        }

        set_color(storage, node, Color::Black);
    }

    fn rotate_left<T, S>(&mut self, storage: &mut S, node: K)
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        let child = links(storage, node).right;
        let inner = links(storage, child).left;

        links_mut(storage, node).right = inner;
        if inner.is_some() {
            links_mut(storage, inner).parent = node;
        }

        let parent = links(storage, node).parent;
        self.replace_child(storage, parent, node, child);

        let c = links_mut(storage, child);
        c.parent = parent;
        c.left = node;
        links_mut(storage, node).parent = child;
    }

    fn rotate_right<T, S>(&mut self, storage: &mut S, node: K)
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        let child = links(storage, node).left;
        let inner = links(storage, child).right;

        links_mut(storage, node).left = inner;
        if inner.is_some() {
            links_mut(storage, inner).parent = node;
        }

        let parent = links(storage, node).parent;
        self.replace_child(storage, parent, node, child);

        let c = links_mut(storage, child);
        c.parent = parent;
        c.right = node;
        links_mut(storage, node).parent = child;
    }

    // =========================================================================
    // Sentinel-aware link access
    // =========================================================================

    /// Points `parent`'s link to `old` at `new`. `K::NONE` parent means root.
    #[inline]
    fn replace_child<T, S>(&mut self, storage: &mut S, parent: K, old: K, new: K)
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        if parent.is_none() {
            self.root = new;
        } else {
            let p = links_mut(storage, parent);
            if p.left == old {
                p.left = new;
            } else {
                p.right = new;
            }
        }
    }

    #[inline]
    fn parent<T, S>(&self, storage: &S, key: K) -> K
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        if key.is_none() {
            self.nil_parent
        } else {
            links(storage, key).parent
        }
    }

    #[inline]
    fn set_parent<T, S>(&mut self, storage: &mut S, key: K, parent: K)
    where
        T: TreeEntry<K>,
        S: Storage<T, Key = K>,
    {
        if key.is_none() {
            self.nil_parent = parent;
        } else {
            links_mut(storage, key).parent = parent;
        }
    }
}

#[inline]
fn links<'a, K, T, S>(storage: &'a S, key: K) -> &'a TreeLinks<K>
where
    K: Key,
    T: TreeEntry<K> + 'a,
    S: Storage<T, Key = K>,
{
    debug_assert!(key.is_some(), "sentinel has no links");
    // Safety: keys linked into a tree are occupied
    unsafe { storage.get_unchecked(key) }.tree_links()
}

#[inline]
fn links_mut<'a, K, T, S>(storage: &'a mut S, key: K) -> &'a mut TreeLinks<K>
where
    K: Key,
    T: TreeEntry<K> + 'a,
    S: Storage<T, Key = K>,
{
    debug_assert!(key.is_some(), "sentinel has no links");
    // Safety: keys linked into a tree are occupied
    unsafe { storage.get_unchecked_mut(key) }.tree_links_mut()
}

#[inline]
fn color<K, T, S>(storage: &S, key: K) -> Color
where
    K: Key,
    T: TreeEntry<K>,
    S: Storage<T, Key = K>,
{
    if key.is_none() {
        Color::Black
    } else {
        links(storage, key).color
    }
}

/// The sentinel stays black; painting it black is a no-op.
#[inline]
fn set_color<K, T, S>(storage: &mut S, key: K, color: Color)
where
    K: Key,
    T: TreeEntry<K>,
    S: Storage<T, Key = K>,
{
    if key.is_none() {
        debug_assert!(color == Color::Black, "sentinel must stay black");
    } else {
        links_mut(storage, key).color = color;
    }
}

fn leftmost<K, T, S>(storage: &S, mut key: K) -> K
where
    K: Key,
    T: TreeEntry<K>,
    S: Storage<T, Key = K>,
{
    loop {
        let left = links(storage, key).left;
        if left.is_none() {
            return key;
        }
        key = left;
    }
}

fn rightmost<K, T, S>(storage: &S, mut key: K) -> K
where
    K: Key,
    T: TreeEntry<K>,
    S: Storage<T, Key = K>,
{
    loop {
        let right = links(storage, key).right;
        if right.is_none() {
            return key;
        }
        key = right;
    }
}

fn successor<K, T, S>(storage: &S, key: K) -> K
where
    K: Key,
    T: TreeEntry<K>,
    S: Storage<T, Key = K>,
{
    let right = links(storage, key).right;
    if right.is_some() {
        return leftmost(storage, right);
    }

    let mut child = key;
    let mut parent = links(storage, key).parent;
    while parent.is_some() && child == links(storage, parent).right {
        child = parent;
        parent = links(storage, parent).parent;
    }
    parent
}

fn predecessor<K, T, S>(storage: &S, key: K) -> K
where
    K: Key,
    T: TreeEntry<K>,
    S: Storage<T, Key = K>,
{
    let left = links(storage, key).left;
    if left.is_some() {
        return rightmost(storage, left);
    }

    let mut child = key;
    let mut parent = links(storage, key).parent;
    while parent.is_some() && child == links(storage, parent).left {
        child = parent;
        parent = links(storage, parent).parent;
    }
    parent
}

/// In-order iterator over tree keys. See [`Tree::keys`].
pub struct Keys<'a, K: Key, T, S> {
    storage: &'a S,
    next: K,
    remaining: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, K, T, S> Iterator for Keys<'a, K, T, S>
where
    K: Key,
    T: TreeEntry<K>,
    S: Storage<T, Key = K>,
{
    type Item = K;

    #[inline]
    fn next(&mut self) -> Option<K> {
        if self.next.is_none() {
            return None;
        }
        let key = self.next;
        self.next = successor(self.storage, key);
        self.remaining -= 1;
        Some(key)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, T, S> ExactSizeIterator for Keys<'a, K, T, S>
where
    K: Key,
    T: TreeEntry<K>,
    S: Storage<T, Key = K>,
{
}
