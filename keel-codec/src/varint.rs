//! Tagged variable-length signed integers.
//!
//! The count of leading one bits in the first byte selects the width:
//!
//! ```text
//! 0xxxxxxx                          1 byte,  7-bit payload
//! 10xxxxxx xxxxxxxx                 2 bytes, 14-bit payload
//! 110xxxxx + 3 bytes                4 bytes, 29-bit payload
//! 1110xxxx + 7 bytes                8 bytes, 60-bit payload
//! 11111111 + 8 bytes                9 bytes, full i64 big-endian
//! ```
//!
//! Payloads are two's complement, so small negative numbers stay small.

use crate::error::CodecError;
use crate::fixed::{pack_i16, pack_i32, pack_i64, pack_i8};

const TAG_2: i64 = 0x8000;
const MASK_2: i64 = 0xBFFF;
const TAG_4: i64 = 0xC000_0000;
const MASK_4: i64 = 0xDFFF_FFFF;
const TAG_8: u64 = 0xE000_0000_0000_0000;
const MASK_8: u64 = 0xEFFF_FFFF_FFFF_FFFF;

/// Lead byte of the 9-byte form.
pub const ESCAPE: u8 = 0xFF;

/// Largest encoded size of a varint.
pub const MAX_VARINT_LEN: usize = 9;

/// Encoded size of `value` in bytes.
#[inline]
pub const fn varint_len(value: i64) -> usize {
    let sign = value >> 63;
    if value >> 6 == sign {
        1
    } else if value >> 13 == sign {
        2
    } else if value >> 28 == sign {
        4
    } else if value >> 59 == sign {
        8
    } else {
        MAX_VARINT_LEN
    }
}

/// Write `value` in the shortest tagged form.
///
/// Returns the number of bytes written. Nothing is written on error.
pub fn pack_varint(buf: &mut [u8], value: i64) -> Result<usize, CodecError> {
    match varint_len(value) {
        1 => pack_i8(buf, (value & 0x7F) as i8),
        2 => pack_i16(buf, ((value | TAG_2) & MASK_2) as i16),
        4 => pack_i32(buf, ((value | TAG_4) & MASK_4) as i32),
        8 => pack_i64(buf, ((value as u64 | TAG_8) & MASK_8) as i64),
        _ => {
            if buf.len() < MAX_VARINT_LEN {
                return Err(CodecError::space(MAX_VARINT_LEN, buf.len()));
            }
            buf[0] = ESCAPE;
            pack_i64(&mut buf[1..], value).map(|n| n + 1)
        }
    }
}

/// Read a tagged varint.
///
/// Returns the value and the number of bytes consumed.
pub fn unpack_varint(data: &[u8]) -> Result<(i64, usize), CodecError> {
    let Some(&lead) = data.first() else {
        return Err(CodecError::data(1, 0));
    };

    if lead & 0x80 == 0 {
        // Shift the tag out, then sign-extend back
        return Ok((((lead << 1) as i8 >> 1) as i64, 1));
    }

    if lead & 0x40 == 0 {
        let bytes = need::<2>(data)?;
        let raw = u16::from_be_bytes(*bytes);
        return Ok((((raw << 2) as i16 >> 2) as i64, 2));
    }

    if lead & 0x20 == 0 {
        let bytes = need::<4>(data)?;
        let raw = u32::from_be_bytes(*bytes);
        return Ok((((raw << 3) as i32 >> 3) as i64, 4));
    }

    if lead & 0x10 == 0 {
        let bytes = need::<8>(data)?;
        let raw = u64::from_be_bytes(*bytes);
        return Ok((((raw << 4) as i64 >> 4), 8));
    }

    let bytes = need::<MAX_VARINT_LEN>(data)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[1..]);
    Ok((i64::from_be_bytes(raw), MAX_VARINT_LEN))
}

#[inline]
fn need<const N: usize>(data: &[u8]) -> Result<&[u8; N], CodecError> {
    data.first_chunk::<N>()
        .ok_or_else(|| CodecError::data(N, data.len()))
}
