//! Fixed-size block pool over 64 KiB aligned chunks.
//!
//! Every chunk is [`CHUNK_SIZE`] bytes and aligned to its own size, so the
//! owning chunk of any block is found by masking the block address. Each
//! chunk keeps an intrusive free list threaded through its free blocks.
//!
//! Chunks live on one of two rings:
//!
//! ```text
//! usable:    front [fully free ...] [partially used ...] back  <- allocate here
//! unusable:  chunks with no free block
//! ```
//!
//! Allocation pops from the chunk at the back of the usable ring, which is
//! the most recently active one. Fully free chunks drift to the front, where
//! [`Pool::shrink_to_fit`] releases them.
//!
//! # Example
//!
//! ```
//! use keel_pool::PoolBuilder;
//!
//! let mut pool = PoolBuilder::default().block_size(48).build()?;
//!
//! let block = pool.allocate()?;
//! assert!(pool.contains(block.as_ptr()));
//!
//! // Safety: block came from this pool and is freed once
//! unsafe { pool.free(block) };
//! assert_eq!(pool.shrink_to_fit(), 1);
//! # Ok::<(), keel_pool::PoolError>(())
//! ```

#![warn(missing_docs)]

mod meta;
mod sys;

use std::fmt;
use std::ptr::NonNull;

use keel_collections::List;
use slab::Slab;
use tracing::{debug, trace, warn};

use meta::{ChunkHeader, ChunkMeta};
use sys::Chunk;

// =============================================================================
// Constants
// =============================================================================

/// Size and alignment of every chunk.
pub const CHUNK_SIZE: usize = 65536;

/// Bytes reserved at the start of each chunk for its header.
pub const HEADER_SIZE: usize = 16;

/// Largest block a chunk can hold.
pub const MAX_BLOCK_SIZE: usize = CHUNK_SIZE - HEADER_SIZE;

const WORD: usize = size_of::<usize>();

// =============================================================================
// Public Types
// =============================================================================

/// Error during pool construction or allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// Block size is zero.
    ZeroBlockSize,
    /// Block size exceeds what a chunk can hold.
    BlockTooLarge {
        /// Requested block size.
        block_size: usize,
        /// Largest supported block size.
        max: usize,
    },
    /// The platform could not provide a chunk.
    AllocationFailed,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::ZeroBlockSize => write!(f, "block size cannot be zero"),
            PoolError::BlockTooLarge { block_size, max } => {
                write!(f, "block size ({block_size}) exceeds chunk payload ({max})")
            }
            PoolError::AllocationFailed => write!(f, "chunk allocation failed"),
        }
    }
}

impl std::error::Error for PoolError {}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Pool`].
#[derive(Clone, Debug, Default)]
pub struct PoolBuilder {
    block_size: usize,
    reserve: usize,
}

impl PoolBuilder {
    /// Size of each block in bytes. Widened to at least one pointer and
    /// rounded up to pointer alignment at build time. Required.
    pub fn block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    /// Number of chunks to allocate up front. Default: 0.
    pub fn reserve(mut self, chunks: usize) -> Self {
        self.reserve = chunks;
        self
    }

    /// Build the pool.
    pub fn build(self) -> Result<Pool, PoolError> {
        if self.block_size == 0 {
            return Err(PoolError::ZeroBlockSize);
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(PoolError::BlockTooLarge {
                block_size: self.block_size,
                max: MAX_BLOCK_SIZE,
            });
        }

        let block_size = self.block_size.max(WORD).next_multiple_of(WORD);
        let blocks_per_chunk = (MAX_BLOCK_SIZE / block_size) as u32;

        let mut pool = Pool {
            chunks: Slab::with_capacity(self.reserve),
            usable: List::new(),
            unusable: List::new(),
            block_size,
            blocks_per_chunk,
            len: 0,
        };

        for _ in 0..self.reserve {
            pool.grow()?;
        }

        debug!(
            block_size,
            blocks_per_chunk,
            reserved = self.reserve,
            "pool built"
        );
        Ok(pool)
    }
}

// =============================================================================
// Pool
// =============================================================================

/// A pool of fixed-size blocks.
///
/// Blocks are raw, uninitialized memory aligned to at least a pointer.
/// The pool never touches a block while it is allocated.
pub struct Pool {
    chunks: Slab<ChunkMeta>,
    usable: List<usize>,
    unusable: List<usize>,
    block_size: usize,
    blocks_per_chunk: u32,
    len: usize,
}

// Safety: the pool exclusively owns every chunk; blocks handed out are raw
// memory whose use is the caller's concern.
unsafe impl Send for Pool {}

impl Pool {
    /// Create a pool with the given block size and no reserved chunks.
    pub fn new(block_size: usize) -> Result<Self, PoolError> {
        PoolBuilder::default().block_size(block_size).build()
    }

    /// Allocate one block.
    ///
    /// Acquires a new chunk only when no chunk has a free block.
    pub fn allocate(&mut self) -> Result<NonNull<u8>, PoolError> {
        let index = match self.usable.back() {
            Some(index) => index,
            None => self.grow()?,
        };

        let meta = &mut self.chunks[index];
        // Safety: chunks on the usable ring have at least one free block
        let block = unsafe { meta.pop_unchecked() };
        let full = meta.is_full();
        self.len += 1;

        if full {
            self.usable.remove(&mut self.chunks, index);
            self.unusable.insert_back(&mut self.chunks, index);
        }

        Ok(block)
    }

    /// Return a block to the pool.
    ///
    /// # Safety
    ///
    /// `block` must have come from [`allocate`](Self::allocate) on this
    /// pool and must not have been freed since.
    pub unsafe fn free(&mut self, block: NonNull<u8>) {
        let base = Chunk::base_of(block.as_ptr() as usize);
        // Safety: block lives in one of our chunks, whose header is written
        // at construction
        let index = unsafe { (*(base as *const ChunkHeader)).index };
        debug_assert!(
            self.chunks.get(index).is_some_and(|m| m.base() == base),
            "block does not belong to this pool"
        );

        // Safety: index came from a live chunk header
        let meta = unsafe { self.chunks.get_unchecked_mut(index) };
        let was_full = meta.is_full();
        unsafe { meta.push(block) };
        let now_free = meta.free_blocks() == self.blocks_per_chunk;
        self.len -= 1;

        if was_full {
            self.unusable.remove(&mut self.chunks, index);
            self.usable.insert_back(&mut self.chunks, index);
            return;
        }

        if !now_free {
            return;
        }

        // Park behind other free chunks so shrink_to_fit finds a free prefix
        let Some(prev) = self.usable.prev(&self.chunks, index) else {
            return;
        };
        if self.chunks[prev].free_blocks() == self.blocks_per_chunk {
            return;
        }

        self.usable.remove(&mut self.chunks, index);
        self.usable.insert_front(&mut self.chunks, index);
    }

    /// Release fully free chunks from the front of the usable ring,
    /// stopping at the first chunk that has a live block.
    ///
    /// Returns the number of chunks released.
    pub fn shrink_to_fit(&mut self) -> usize {
        let mut released = 0;

        while let Some(index) = self.usable.front() {
            if self.chunks[index].free_blocks() < self.blocks_per_chunk {
                break;
            }
            self.usable.remove(&mut self.chunks, index);
            let meta = self.chunks.remove(index);
            trace!(index, base = meta.base(), "chunk released");
            released += 1;
        }

        if released > 0 {
            debug!(released, remaining = self.chunks.len(), "pool shrunk");
        }
        released
    }

    /// Number of live blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no block is allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks currently held.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Effective block size after widening and rounding.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks carved from each chunk.
    #[inline]
    pub fn blocks_per_chunk(&self) -> usize {
        self.blocks_per_chunk as usize
    }

    /// Returns `true` if `ptr` is the start of a block in one of this
    /// pool's chunks. Says nothing about whether the block is live.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        let base = Chunk::base_of(addr);
        // Offset first; base + CHUNK_SIZE overflows for the top chunk
        let first = base + (CHUNK_SIZE - self.blocks_per_chunk() * self.block_size);

        addr >= first
            && (addr - first) % self.block_size == 0
            && self.chunks.iter().any(|(_, meta)| meta.base() == base)
    }

    /// Acquire a chunk and put it at the front of the usable ring.
    #[cold]
    fn grow(&mut self) -> Result<usize, PoolError> {
        let chunk = Chunk::alloc().map_err(|error| {
            warn!(%error, chunks = self.chunks.len(), "chunk allocation failed");
            PoolError::AllocationFailed
        })?;

        let entry = self.chunks.vacant_entry();
        let index = entry.key();
        let meta = ChunkMeta::new(chunk, index, self.block_size, self.blocks_per_chunk);
        debug!(index, base = meta.base(), "chunk acquired");
        entry.insert(meta);

        self.usable.insert_front(&mut self.chunks, index);
        Ok(index)
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("block_size", &self.block_size)
            .field("blocks_per_chunk", &self.blocks_per_chunk)
            .field("len", &self.len)
            .field("usable", &self.usable.len())
            .field("unusable", &self.unusable.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
