//! Archived `Option<T>`: a one-byte tag followed by the value slot.

use crate::archive::{Archive, Verify};
use crate::de::{EndianFixup, Validator};
use crate::error::Result;
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ser::Serializer;
use std::mem::offset_of;

/// Archived form of `Option<T>`.
///
/// A `None` leaves the value slot zeroed and is never read.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ArchivedOption<T> {
    /// No value.
    None,
    /// A value.
    Some(T),
}

/// Layout of the `Some` variant of a `#[repr(u8)]` enum.
#[repr(C)]
struct SomeRepr<T> {
    tag: u8,
    value: T,
}

impl<T> ArchivedOption<T> {
    /// True if there is a value.
    pub fn is_some(&self) -> bool {
        matches!(self, Self::Some(_))
    }

    /// True if there is no value.
    pub fn is_none(&self) -> bool {
        !self.is_some()
    }

    /// The value, if any.
    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Some(value) => Some(value),
            Self::None => None,
        }
    }
}

impl<T: PartialEq<U>, U> PartialEq<Option<U>> for ArchivedOption<T> {
    fn eq(&self, other: &Option<U>) -> bool {
        match (self, other) {
            (Self::Some(a), Some(b)) => a == b,
            (Self::None, None) => true,
            _ => false,
        }
    }
}

impl<T: Archive> Archive for Option<T> {
    type Archived = ArchivedOption<T::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        let Some(value) = self else {
            return Ok(());
        };
        serializer.write_scalar(pos, 1u8)?;
        value.serialize_into(
            serializer,
            pos + offset_of!(SomeRepr<T::Archived>, value) as u64,
        )
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("optional");
        hasher.visit::<T>()
    }
}

// SAFETY: the tag is checked before the payload is touched.
unsafe impl<T: Verify> Verify for ArchivedOption<T> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        let repr = ptr.cast::<SomeRepr<T>>();
        // SAFETY: the tag is the first byte of an in-range value.
        match unsafe { *std::ptr::addr_of!((*repr).tag) } {
            0 => Ok(()),
            // SAFETY: the payload lies inside the checked value.
            1 => unsafe { T::verify(std::ptr::addr_of!((*repr).value), validator) },
            tag => Err(validator.invalid(format!("option tag {tag}"))),
        }
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        let repr = ptr.cast::<SomeRepr<T>>();
        // SAFETY: as in `verify`.
        if unsafe { *std::ptr::addr_of!((*repr).tag) } == 1 {
            // SAFETY: as in `verify`.
            unsafe { T::fix_endian(std::ptr::addr_of_mut!((*repr).value), fixup)? };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize, serialize, Mode, TesseraError};

    #[test]
    fn some_and_none_read_back() -> Result<()> {
        let value = vec![Some(3u32), None, Some(9)];
        let bytes = serialize(&value, Mode::NONE)?;
        let archived = deserialize::<Vec<Option<u32>>>(&bytes, Mode::NONE)?;
        assert_eq!(archived[0], Some(3u32));
        assert!(archived[1].is_none());
        assert_eq!(archived[2].as_ref(), Some(&9));
        Ok(())
    }

    #[test]
    fn unknown_tag_is_rejected() -> Result<()> {
        let mut bytes = serialize(&Some(1u16), Mode::NONE)?;
        bytes[0] = 2;
        assert!(matches!(
            deserialize::<Option<u16>>(&bytes, Mode::NONE),
            Err(TesseraError::InvalidData(_))
        ));
        Ok(())
    }
}
