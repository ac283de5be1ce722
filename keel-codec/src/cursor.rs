//! Cursors for composing several fields into one frame.

use crate::bytes::{pack_bytes, unpack_bytes};
use crate::error::CodecError;
use crate::fixed::{pack_i8, pack_i16, pack_i32, pack_i64, unpack_i8, unpack_i16, unpack_i32, unpack_i64};
use crate::varint::{pack_varint, unpack_varint};

/// Writes fields back to back into a buffer.
///
/// A failed write leaves the position where it was.
///
/// ```
/// use keel_codec::{Reader, Writer};
///
/// let mut buf = [0u8; 32];
/// let mut w = Writer::new(&mut buf);
/// w.put_i16(-2)?;
/// w.put_varint(1_000)?;
/// w.put_bytes(b"abc")?;
/// let n = w.position();
///
/// let mut r = Reader::new(&buf[..n]);
/// assert_eq!(r.get_i16()?, -2);
/// assert_eq!(r.get_varint()?, 1_000);
/// assert_eq!(r.get_bytes()?, b"abc");
/// assert!(r.is_empty());
/// # Ok::<(), keel_codec::CodecError>(())
/// ```
#[derive(Debug)]
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

/// Reads fields back to back from a buffer.
///
/// A failed read leaves the position where it was.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

macro_rules! impl_put {
    ($($name:ident => $pack:ident($ty:ty);)*) => {
        $(
            #[doc = concat!("Append a big-endian `", stringify!($ty), "`.")]
            #[inline]
            pub fn $name(&mut self, value: $ty) -> Result<(), CodecError> {
                let n = $pack(&mut self.buf[self.pos..], value)?;
                self.pos += n;
                Ok(())
            }
        )*
    };
}

macro_rules! impl_get {
    ($($name:ident => $unpack:ident($ty:ty);)*) => {
        $(
            #[doc = concat!("Read a big-endian `", stringify!($ty), "`.")]
            #[inline]
            pub fn $name(&mut self) -> Result<$ty, CodecError> {
                let (value, n) = $unpack(self.remaining())?;
                self.pos += n;
                Ok(value)
            }
        )*
    };
}

impl<'a> Writer<'a> {
    /// Start writing at the beginning of `buf`.
    #[inline]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes still available.
    #[inline]
    pub fn capacity_left(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The written prefix of the buffer.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Release the buffer, returning the written prefix.
    #[inline]
    pub fn into_written(self) -> &'a mut [u8] {
        let Writer { buf, pos } = self;
        &mut buf[..pos]
    }

    impl_put! {
        put_i8 => pack_i8(i8);
        put_i16 => pack_i16(i16);
        put_i32 => pack_i32(i32);
        put_i64 => pack_i64(i64);
    }

    /// Append a tagged varint.
    #[inline]
    pub fn put_varint(&mut self, value: i64) -> Result<(), CodecError> {
        let n = pack_varint(&mut self.buf[self.pos..], value)?;
        self.pos += n;
        Ok(())
    }

    /// Append a length-prefixed byte string.
    #[inline]
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let n = pack_bytes(&mut self.buf[self.pos..], bytes)?;
        self.pos += n;
        Ok(())
    }
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `data`.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unread input.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        let data = self.data;
        &data[self.pos..]
    }

    /// Returns `true` once all input is consumed.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    impl_get! {
        get_i8 => unpack_i8(i8);
        get_i16 => unpack_i16(i16);
        get_i32 => unpack_i32(i32);
        get_i64 => unpack_i64(i64);
    }

    /// Read a tagged varint.
    #[inline]
    pub fn get_varint(&mut self) -> Result<i64, CodecError> {
        let (value, n) = unpack_varint(self.remaining())?;
        self.pos += n;
        Ok(value)
    }

    /// Read a length-prefixed byte string, borrowing from the input.
    #[inline]
    pub fn get_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let (bytes, n) = unpack_bytes(self.remaining())?;
        self.pos += n;
        Ok(bytes)
    }
}
