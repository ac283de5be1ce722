//! Intrusive collections over external storage.
//!
//! The key idea: separate storage from structure.
//!
//! ```text
//! Storage (slab)        - owns records, provides stable keys
//! List / Heap / Tree    - coordinate keys, never own records
//! ```
//!
//! Records embed the links each structure needs ([`ListLinks`],
//! [`TreeLinks`], a heap slot) and implement the matching trait
//! ([`Linked`], [`TreeEntry`], [`HeapEntry`]). Links are plain keys, with
//! the key type's reserved [`Key::NONE`] standing in for the list head, the
//! tree's black leaf, or "not in a heap". A record can be in a list, a heap
//! and a tree at the same time, all sharing one storage.
//!
//! Benefits:
//! - **Stable keys**: removing a record never invalidates other keys
//! - **No allocation in lists and trees**: all link state lives in records
//! - **O(1) unlink**: lists and heaps find a record's position from the
//!   record itself
//!
//! # Quick Start
//!
//! ```
//! use keel_collections::{Linked, List, ListLinks, SlotStorage, Storage};
//!
//! #[derive(Debug)]
//! struct Order {
//!     qty: u64,
//!     links: ListLinks<u32>,
//! }
//!
//! impl Linked<u32> for Order {
//!     fn links(&self) -> &ListLinks<u32> { &self.links }
//!     fn links_mut(&mut self) -> &mut ListLinks<u32> { &mut self.links }
//! }
//!
//! let mut orders: SlotStorage<Order> = SlotStorage::with_capacity(1000);
//! let mut queue: List<u32> = List::new();
//!
//! let key = orders.try_insert(Order { qty: 10, links: ListLinks::new() }).unwrap();
//! queue.insert_back(&mut orders, key);
//!
//! // O(1) removal from anywhere; the record stays in storage
//! queue.remove(&mut orders, key);
//! assert!(queue.is_empty());
//! assert_eq!(orders.get(key).unwrap().qty, 10);
//! ```
//!
//! # Critical Invariant: Same Storage Instance
//!
//! All operations on a structure must use the same storage instance, and a
//! record must be unlinked before it is removed from storage. Both are the
//! caller's responsibility (same discipline as the `slab` crate).
//!
//! # Data Structures
//!
//! | Structure | Use Case | Key Operations |
//! |-----------|----------|----------------|
//! | [`Sequence`] | Power-of-two buffers | resize, double |
//! | [`List`] | FIFO queues, free lists | O(1) insert/remove, in-place sort |
//! | [`Heap`] | Timers, priority queues | O(log n) insert/adjust/remove |
//! | [`Tree`] | Ordered indexes | O(log n) insert/remove/search |
//!
//! # Feature Flags
//!
//! - `slab` - Enable [`Storage`] impl for `slab::Slab`

#![warn(missing_docs)]

pub mod heap;
pub mod key;
pub mod list;
pub mod sequence;
pub mod storage;
pub mod tree;

pub use heap::{Heap, HeapEntry, SEGMENT_LEN};
pub use key::Key;
pub use list::{Cursor, Linked, List, ListLinks};
pub use sequence::{AllocError, Sequence};
pub use storage::{Full, SlotStorage, Storage};
pub use tree::{Color, Tree, TreeEntry, TreeLinks};
