//! Key trait for storage indices and embedded links.
//!
//! Every link a record embeds (list neighbours, tree parent/children, heap
//! slot) is a [`Key`]. The reserved [`Key::NONE`] value plays the part of
//! the null reference or sentinel, so links never need `Option`.

/// A copyable index type with a reserved sentinel value.
///
/// Implemented for the unsigned integer types with `NONE = MAX`. Custom key
/// types (e.g. a strongly-typed timer id) can implement it as well.
///
/// # Example
///
/// ```
/// use keel_collections::Key;
///
/// let key: u32 = 42;
/// assert!(key.is_some());
/// assert!(u32::NONE.is_none());
/// assert_eq!(u32::from_usize(7).as_usize(), 7);
/// ```
///
/// # Custom Key Types
///
/// ```
/// use keel_collections::Key;
///
/// #[derive(Copy, Clone, PartialEq, Eq, Debug)]
/// struct TimerId(u32);
///
/// impl Key for TimerId {
///     const NONE: Self = TimerId(u32::MAX);
///
///     fn from_usize(val: usize) -> Self {
///         TimerId(val as u32)
///     }
///
///     fn as_usize(self) -> usize {
///         self.0 as usize
///     }
/// }
///
/// assert!(TimerId::NONE.is_none());
/// ```
pub trait Key: Copy + Eq {
    /// Sentinel value representing "no key".
    ///
    /// Inside a list it denotes the list head, inside a tree the shared
    /// black leaf, inside a heap entry "not in a heap".
    const NONE: Self;

    /// Creates a key from a `usize` value.
    fn from_usize(val: usize) -> Self;

    /// Returns the key as a `usize`.
    fn as_usize(self) -> usize;

    /// Returns `true` if this is the sentinel value.
    #[inline]
    fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Returns `true` if this is not the sentinel value.
    #[inline]
    fn is_some(self) -> bool {
        !self.is_none()
    }
}

macro_rules! impl_key_for_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Key for $ty {
                const NONE: Self = <$ty>::MAX;

                #[inline]
                fn from_usize(val: usize) -> Self {
                    debug_assert!(val < <$ty>::MAX as usize, "key out of range");
                    val as Self
                }

                #[inline]
                fn as_usize(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

impl_key_for_unsigned!(u8, u16, u32, u64, usize);
