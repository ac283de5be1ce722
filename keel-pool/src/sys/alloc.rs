//! Default implementation using std::alloc.

use std::alloc::Layout;
use std::io;
use std::ptr::NonNull;

use crate::CHUNK_SIZE;

const CHUNK_LAYOUT: Layout = match Layout::from_size_align(CHUNK_SIZE, CHUNK_SIZE) {
    Ok(layout) => layout,
    Err(_) => panic!("invalid chunk layout"),
};

pub(crate) fn alloc_chunk() -> io::Result<NonNull<u8>> {
    let ptr = unsafe { std::alloc::alloc(CHUNK_LAYOUT) };

    NonNull::new(ptr).ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "allocation failed"))
}

/// # Safety
/// ptr must be from a previous alloc_chunk call.
pub(crate) unsafe fn drop_chunk(ptr: NonNull<u8>) {
    unsafe {
        std::alloc::dealloc(ptr.as_ptr(), CHUNK_LAYOUT);
    }
}
