//! Length-prefixed byte strings.

use crate::error::CodecError;
use crate::varint::{pack_varint, unpack_varint, varint_len};

/// Encoded size of a byte string of `len` bytes, prefix included.
#[inline]
pub const fn bytes_len(len: usize) -> usize {
    varint_len(len as i64) + len
}

/// Write `bytes` behind a varint length prefix.
///
/// Returns the number of bytes written. Nothing is written on error.
pub fn pack_bytes(buf: &mut [u8], bytes: &[u8]) -> Result<usize, CodecError> {
    let total = bytes_len(bytes.len());
    if buf.len() < total {
        return Err(CodecError::space(total, buf.len()));
    }

    let prefix = pack_varint(buf, bytes.len() as i64)?;
    buf[prefix..total].copy_from_slice(bytes);
    Ok(total)
}

/// Read a length-prefixed byte string.
///
/// Returns a view into `data` and the number of bytes consumed.
pub fn unpack_bytes(data: &[u8]) -> Result<(&[u8], usize), CodecError> {
    let (len, prefix) = unpack_varint(data)?;

    if len < 0 || len as u64 > isize::MAX as u64 {
        return Err(CodecError::InvalidLength);
    }
    let len = len as usize;

    let total = prefix.checked_add(len).ok_or(CodecError::InvalidLength)?;
    match data.get(prefix..total) {
        Some(bytes) => Ok((bytes, total)),
        None => Err(CodecError::data(total, data.len())),
    }
}
