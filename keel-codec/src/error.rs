//! Error types for encoding and decoding.

use core::fmt;

/// Encoding or decoding failure.
///
/// `needed` is always the shortfall in bytes: what the operation requires
/// minus what the buffer had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Output buffer too small.
    OutOfSpace {
        /// Additional bytes the buffer would need.
        needed: usize,
    },
    /// Input ended before the value was complete.
    OutOfData {
        /// Additional bytes the input would need.
        needed: usize,
    },
    /// A byte-string length prefix was negative or too large.
    InvalidLength,
}

impl CodecError {
    /// Byte shortfall, or `None` for [`CodecError::InvalidLength`].
    #[inline]
    pub const fn needed(self) -> Option<usize> {
        match self {
            CodecError::OutOfSpace { needed } | CodecError::OutOfData { needed } => Some(needed),
            CodecError::InvalidLength => None,
        }
    }

    #[inline]
    pub(crate) const fn space(required: usize, available: usize) -> Self {
        CodecError::OutOfSpace {
            needed: required - available,
        }
    }

    #[inline]
    pub(crate) const fn data(required: usize, available: usize) -> Self {
        CodecError::OutOfData {
            needed: required - available,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::OutOfSpace { needed } => {
                write!(f, "buffer too small: {needed} more bytes needed")
            }
            CodecError::OutOfData { needed } => {
                write!(f, "input truncated: {needed} more bytes needed")
            }
            CodecError::InvalidLength => write!(f, "invalid length prefix"),
        }
    }
}

impl core::error::Error for CodecError {}
