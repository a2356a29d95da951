//! Typed row keys.
//!
//! [`Strong<T, Tag>`] wraps an integer so that keys of different tables cannot be
//! mixed up. It has the layout of `T` and archives exactly like it.

use crate::archive::{Archive, Verify};
use crate::de::{EndianFixup, Validator};
use crate::error::Result;
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ser::Serializer;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A key usable to address the rows of the row-store containers.
pub trait RowKey: Copy + 'static {
    /// The key for row `index`. Indices beyond the key's range wrap.
    fn from_index(index: usize) -> Self;

    /// The row index of this key.
    fn index(self) -> usize;
}

macro_rules! impl_row_key {
    ($($ty:ty),*) => {
        $(
            impl RowKey for $ty {
                fn from_index(index: usize) -> Self {
                    index as $ty
                }

                fn index(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

impl_row_key!(u32, u64, usize);

/// An integer distinguished by a phantom `Tag` type.
///
/// ```
/// use tessera::Strong;
///
/// enum NodeTag {}
/// type NodeIdx = Strong<u32, NodeTag>;
///
/// let a = NodeIdx::new(3);
/// assert_eq!(a.value(), 3);
/// assert!(a < NodeIdx::new(4));
/// ```
#[repr(transparent)]
pub struct Strong<T, Tag> {
    value: T,
    _tag: PhantomData<fn() -> Tag>,
}

impl<T, Tag> Strong<T, Tag> {
    /// Wraps `value`.
    pub const fn new(value: T) -> Self {
        Self {
            value,
            _tag: PhantomData,
        }
    }

    /// Unwraps the value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Copy, Tag> Strong<T, Tag> {
    /// The wrapped value.
    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: RowKey, Tag: 'static> RowKey for Strong<T, Tag> {
    fn from_index(index: usize) -> Self {
        Self::new(T::from_index(index))
    }

    fn index(self) -> usize {
        self.value.index()
    }
}

impl<T, Tag> From<T> for Strong<T, Tag> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Clone, Tag> Clone for Strong<T, Tag> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: Copy, Tag> Copy for Strong<T, Tag> {}

impl<T: Default, Tag> Default for Strong<T, Tag> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: PartialEq, Tag> PartialEq for Strong<T, Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq, Tag> Eq for Strong<T, Tag> {}

impl<T: PartialOrd, Tag> PartialOrd for Strong<T, Tag> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<T: Ord, Tag> Ord for Strong<T, Tag> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: Hash, Tag> Hash for Strong<T, Tag> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: fmt::Debug, Tag> fmt::Debug for Strong<T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

impl<T: fmt::Display, Tag> fmt::Display for Strong<T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl<T: Archive, Tag: 'static> Archive for Strong<T, Tag> {
    type Archived = Strong<T::Archived, Tag>;

    const TRACK_ADDRESS: bool = T::TRACK_ADDRESS;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        self.value.serialize_into(serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        T::fingerprint(hasher)
    }
}

// SAFETY: transparent over `T`.
unsafe impl<T: Verify, Tag: 'static> Verify for Strong<T, Tag> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: same layout as `T`.
        unsafe { T::verify(ptr.cast(), validator) }
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: same layout as `T`.
        unsafe { T::fix_endian(ptr.cast(), fixup) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    enum Tag {}

    #[test]
    fn strong_keys_are_transparent() -> Result<()> {
        assert_eq!(std::mem::size_of::<Strong<u32, Tag>>(), 4);
        assert_eq!(fingerprint::<Strong<u32, Tag>>()?, fingerprint::<u32>()?);
        let key = Strong::<u32, Tag>::from_index(7);
        assert_eq!(key.index(), 7);
        Ok(())
    }
}
