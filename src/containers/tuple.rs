//! Archived tuples.
//!
//! A tuple of up to six elements archives to a `#[repr(C)]` struct with one public
//! positional field per element, so `archived.0`, `archived.1` and so on read like
//! the owned tuple.

use crate::archive::{Archive, Verify};
use crate::de::{EndianFixup, Validator};
use crate::error::Result;
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ser::Serializer;
use std::mem::offset_of;

macro_rules! impl_tuple {
    ($name:ident, $count:literal; $($ty:ident $oty:ident $idx:tt),+) => {
        /// Archived form of a tuple of the same arity.
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(C)]
        pub struct $name<$($ty),+>($(pub $ty),+);

        impl<$($ty: Archive),+> Archive for ($($ty,)+) {
            type Archived = $name<$($ty::Archived),+>;

            fn serialize_into<W: Target + ?Sized>(
                &self,
                serializer: &mut Serializer<'_, W>,
                pos: u64,
            ) -> Result<()> {
                $(
                    self.$idx.serialize_into(
                        serializer,
                        pos + offset_of!(Self::Archived, $idx) as u64,
                    )?;
                )+
                Ok(())
            }

            fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
                hasher.write_tag("tuple");
                hasher.write_u64($count);
                $(hasher.visit::<$ty>()?;)+
                Ok(())
            }
        }

        // SAFETY: every element is verified in place.
        unsafe impl<$($ty: Verify),+> Verify for $name<$($ty),+> {
            unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
                // SAFETY: elements of an in-range value.
                unsafe {
                    $($ty::verify(std::ptr::addr_of!((*ptr).$idx), validator)?;)+
                }
                Ok(())
            }

            unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
                // SAFETY: elements of an in-range value.
                unsafe {
                    $($ty::fix_endian(std::ptr::addr_of_mut!((*ptr).$idx), fixup)?;)+
                }
                Ok(())
            }
        }

        impl<$($ty: PartialEq<$oty>, $oty),+> PartialEq<($($oty,)+)> for $name<$($ty),+> {
            fn eq(&self, other: &($($oty,)+)) -> bool {
                true $(&& self.$idx == other.$idx)+
            }
        }
    };
}

impl_tuple!(ArchivedTuple1, 1; A OA 0);
impl_tuple!(ArchivedTuple2, 2; A OA 0, B OB 1);
impl_tuple!(ArchivedTuple3, 3; A OA 0, B OB 1, C OC 2);
impl_tuple!(ArchivedTuple4, 4; A OA 0, B OB 1, C OC 2, D OD 3);
impl_tuple!(ArchivedTuple5, 5; A OA 0, B OB 1, C OC 2, D OD 3, E OE 4);
impl_tuple!(ArchivedTuple6, 6; A OA 0, B OB 1, C OC 2, D OD 3, E OE 4, F OF 5);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize, serialize, Mode};

    #[test]
    fn elements_keep_their_layout() -> Result<()> {
        let value = (7u8, 1u64, String::from("pair"));
        let bytes = serialize(&value, Mode::NONE)?;
        let archived = deserialize::<(u8, u64, String)>(&bytes, Mode::NONE)?;
        assert_eq!(archived.0, 7);
        assert_eq!(archived.1, 1);
        assert_eq!(archived.2, "pair");
        assert_eq!(offset_of!(ArchivedTuple3<u8, u64, u8>, 1), 8);
        Ok(())
    }

    #[test]
    fn archived_tuple_compares_with_owned() -> Result<()> {
        let bytes = serialize(&(1u32, 2i16), Mode::NONE)?;
        let archived = deserialize::<(u32, i16)>(&bytes, Mode::NONE)?;
        assert!(*archived == (1u32, 2i16));
        assert!(*archived != (1u32, 3i16));
        Ok(())
    }
}
