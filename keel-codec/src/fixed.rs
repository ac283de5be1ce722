//! Fixed-width big-endian integers.

use crate::error::CodecError;

macro_rules! impl_fixed {
    ($($ty:ty => $pack:ident, $unpack:ident;)*) => {
        $(
            #[doc = concat!("Write `value` as a big-endian `", stringify!($ty), "`.")]
            ///
            /// Returns the number of bytes written.
            #[inline]
            pub fn $pack(buf: &mut [u8], value: $ty) -> Result<usize, CodecError> {
                const N: usize = size_of::<$ty>();
                let Some(dst) = buf.get_mut(..N) else {
                    return Err(CodecError::space(N, buf.len()));
                };
                dst.copy_from_slice(&value.to_be_bytes());
                Ok(N)
            }

            #[doc = concat!("Read a big-endian `", stringify!($ty), "`.")]
            ///
            /// Returns the value and the number of bytes consumed.
            #[inline]
            pub fn $unpack(data: &[u8]) -> Result<($ty, usize), CodecError> {
                const N: usize = size_of::<$ty>();
                match data.first_chunk::<N>() {
                    Some(bytes) => Ok((<$ty>::from_be_bytes(*bytes), N)),
                    None => Err(CodecError::data(N, data.len())),
                }
            }
        )*
    };
}

impl_fixed! {
    i8 => pack_i8, unpack_i8;
    i16 => pack_i16, unpack_i16;
    i32 => pack_i32, unpack_i32;
    i64 => pack_i64, unpack_i64;
}
