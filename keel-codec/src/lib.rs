//! Compact big-endian binary encoding.
//!
//! Three building blocks, all writing into caller-provided buffers:
//!
//! - fixed-width integers (`pack_i8` .. `pack_i64`), big-endian two's
//!   complement
//! - tagged varints, 1 to 9 bytes, where the lead byte's prefix selects the
//!   width (see [`varint`])
//! - byte strings behind a varint length prefix
//!
//! Every function returns the number of bytes written or consumed. On
//! failure the error carries the byte shortfall.
//!
//! # Example
//!
//! ```
//! use keel_codec::{CodecError, pack_varint, unpack_varint};
//!
//! let mut buf = [0u8; 9];
//! assert_eq!(pack_varint(&mut buf, 63)?, 1);
//! assert_eq!(buf[0], 0x3F);
//!
//! assert_eq!(pack_varint(&mut buf, 64)?, 2);
//! assert_eq!(buf[0] >> 6, 0b10);
//! assert_eq!(unpack_varint(&buf)?, (64, 2));
//!
//! assert_eq!(
//!     pack_varint(&mut [], i64::MIN),
//!     Err(CodecError::OutOfSpace { needed: 9 })
//! );
//! # Ok::<(), CodecError>(())
//! ```

#![no_std]
#![warn(missing_docs)]

mod bytes;
mod cursor;
mod error;
mod fixed;
pub mod varint;

pub use bytes::{bytes_len, pack_bytes, unpack_bytes};
pub use cursor::{Reader, Writer};
pub use error::CodecError;
pub use fixed::{pack_i8, pack_i16, pack_i32, pack_i64, unpack_i8, unpack_i16, unpack_i32, unpack_i64};
pub use varint::{MAX_VARINT_LEN, pack_varint, unpack_varint, varint_len};
