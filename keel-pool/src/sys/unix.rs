//! Unix implementation using posix_memalign.

use std::io;
use std::ptr::NonNull;

use crate::CHUNK_SIZE;

// =============================================================================
// Allocation
// =============================================================================

#[cfg(miri)]
pub(crate) fn alloc_chunk() -> io::Result<NonNull<u8>> {
    let layout = std::alloc::Layout::from_size_align(CHUNK_SIZE, CHUNK_SIZE)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let ptr = unsafe { std::alloc::alloc(layout) };
    NonNull::new(ptr).ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "allocation failed"))
}

#[cfg(not(miri))]
pub(crate) fn alloc_chunk() -> io::Result<NonNull<u8>> {
    let mut ptr: *mut libc::c_void = std::ptr::null_mut();

    // posix_memalign reports failure through its return code, not errno
    let rc = unsafe { libc::posix_memalign(&mut ptr, CHUNK_SIZE, CHUNK_SIZE) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }

    NonNull::new(ptr as *mut u8)
        .ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "allocation failed"))
}

// =============================================================================
// Deallocation
// =============================================================================

/// # Safety
/// ptr must be from a previous alloc_chunk call.
pub(crate) unsafe fn drop_chunk(ptr: NonNull<u8>) {
    #[cfg(miri)]
    {
        let layout = std::alloc::Layout::from_size_align(CHUNK_SIZE, CHUNK_SIZE)
            .expect("invalid layout");
        unsafe {
            std::alloc::dealloc(ptr.as_ptr(), layout);
        }
    }

    #[cfg(not(miri))]
    unsafe {
        libc::free(ptr.as_ptr() as *mut libc::c_void);
    }
}
