//! Per-chunk bookkeeping for the block pool.
//!
//! A chunk is laid out as a small header followed by equally sized blocks:
//!
//! ```text
//! +--------------+---------+---------+-----+---------+
//! | ChunkHeader  | block   | block   | ... | block   |
//! +--------------+---------+---------+-----+---------+
//! ^ chunk start                                 chunk end ^
//! ```
//!
//! Blocks are packed against the chunk end, so any slack from rounding sits
//! right after the header. Free blocks hold the address of the next free
//! block in their first word.

use std::ptr::{self, NonNull};

use keel_collections::{Linked, ListLinks};

use crate::sys::Chunk;
use crate::{CHUNK_SIZE, HEADER_SIZE};

/// Written at the start of every chunk so `free` can find the metadata
/// from a block address alone.
#[repr(C, align(16))]
pub(crate) struct ChunkHeader {
    /// Key of the owning [`ChunkMeta`] in the pool's chunk slab.
    pub index: usize,
}

const _: () = assert!(size_of::<ChunkHeader>() <= HEADER_SIZE);

/// Metadata for one chunk. Lives in the pool's slab and is linked into
/// either the usable or the unusable ring.
#[derive(Debug)]
pub(crate) struct ChunkMeta {
    chunk: Chunk,
    /// First free block, or null when the chunk is full.
    free_head: *mut u8,
    /// Number of blocks on the free list.
    free_blocks: u32,
    links: ListLinks<usize>,
}

impl ChunkMeta {
    /// Take ownership of a fresh chunk, stamp its header with `index` and
    /// thread every block onto the free list.
    pub(crate) fn new(chunk: Chunk, index: usize, block_size: usize, blocks: u32) -> Self {
        debug_assert!(block_size >= size_of::<usize>());
        debug_assert!(HEADER_SIZE + blocks as usize * block_size <= CHUNK_SIZE);

        let base = chunk.as_ptr();
        // Safety: the chunk is CHUNK_SIZE bytes, 16-aligned, and the header
        // fits in HEADER_SIZE
        unsafe { ptr::write(base.cast::<ChunkHeader>(), ChunkHeader { index }) };

        // Thread from the end downwards; the head is the highest block
        let mut next: *mut u8 = ptr::null_mut();
        for i in 0..blocks as usize {
            // Safety: offset stays within [HEADER_SIZE, CHUNK_SIZE)
            let block = unsafe { base.add(CHUNK_SIZE - (blocks as usize - i) * block_size) };
            unsafe { ptr::write(block.cast::<*mut u8>(), next) };
            next = block;
        }

        Self {
            chunk,
            free_head: next,
            free_blocks: blocks,
            links: ListLinks::new(),
        }
    }

    /// Chunk start address.
    #[inline]
    pub(crate) fn base(&self) -> usize {
        self.chunk.as_ptr() as usize
    }

    #[inline]
    pub(crate) fn free_blocks(&self) -> u32 {
        self.free_blocks
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.free_blocks == 0
    }

    /// Pop the head of the free list.
    ///
    /// # Safety
    ///
    /// The chunk must not be full.
    #[inline]
    pub(crate) unsafe fn pop_unchecked(&mut self) -> NonNull<u8> {
        debug_assert!(!self.free_head.is_null());
        let block = self.free_head;
        // Safety: free blocks store the next free address in their first word
        self.free_head = unsafe { ptr::read(block.cast::<*mut u8>()) };
        self.free_blocks -= 1;
        // Safety: caller guarantees the list was non-empty
        unsafe { NonNull::new_unchecked(block) }
    }

    /// Push `block` onto the free list.
    ///
    /// # Safety
    ///
    /// `block` must be a block of this chunk that is currently allocated.
    #[inline]
    pub(crate) unsafe fn push(&mut self, block: NonNull<u8>) {
        let block = block.as_ptr();
        unsafe { ptr::write(block.cast::<*mut u8>(), self.free_head) };
        self.free_head = block;
        self.free_blocks += 1;
    }
}

impl Linked<usize> for ChunkMeta {
    #[inline]
    fn links(&self) -> &ListLinks<usize> {
        &self.links
    }

    #[inline]
    fn links_mut(&mut self) -> &mut ListLinks<usize> {
        &mut self.links
    }
}

// =============================================================================
// Tests
// =============================================================================
