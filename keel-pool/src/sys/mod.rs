//! Platform-specific chunk allocation (internal).

#[cfg(not(unix))]
mod alloc;

#[cfg(unix)]
mod unix;

use std::ptr::NonNull;

#[cfg(not(unix))]
use alloc::{alloc_chunk, drop_chunk};

#[cfg(unix)]
use unix::{alloc_chunk, drop_chunk};

use crate::CHUNK_SIZE;

/// A [`CHUNK_SIZE`] region aligned to its own size.
///
/// The alignment lets any interior pointer be masked back to the chunk
/// start. Memory is freed when dropped.
pub(crate) struct Chunk {
    ptr: NonNull<u8>,
}

impl Chunk {
    /// Allocate one aligned chunk.
    pub(crate) fn alloc() -> std::io::Result<Self> {
        alloc_chunk().map(|ptr| Chunk { ptr })
    }

    /// Returns a pointer to the start of the chunk.
    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Start address of the chunk containing `addr`.
    #[inline]
    pub(crate) const fn base_of(addr: usize) -> usize {
        addr & !(CHUNK_SIZE - 1)
    }
}

unsafe impl Send for Chunk {}

impl Drop for Chunk {
    fn drop(&mut self) {
        // Safety: ptr came from alloc_chunk and is released once
        unsafe { drop_chunk(self.ptr) }
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Chunk").field(&self.ptr).finish()
    }
}
