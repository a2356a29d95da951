//! Owning and non-owning pointers.
//!
//! * `Box<T>` archives to [`ArchivedBox`], a non-null relative pointer to an
//!   out-of-line archived `T`.
//! * `Rc<T>` and `Arc<T>` archive to [`ArchivedRc`]. Pointees are deduplicated by
//!   address, so every clone of one `Rc` refers to a single archived copy.
//! * [`Ptr<T>`] archives to [`ArchivedPtr`], a nullable relative pointer to wherever
//!   its target was archived by its owner.

use crate::archive::{Archive, Verify};
use crate::de::{EndianFixup, Validator};
use crate::error::Result;
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ptr::{Ptr, RelPtr};
use crate::ser::Serializer;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

macro_rules! archived_pointer {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[repr(transparent)]
        pub struct $name<T> {
            ptr: RelPtr<T>,
        }

        impl<T> $name<T> {
            /// The raw relative pointer.
            pub fn as_rel(&self) -> &RelPtr<T> {
                &self.ptr
            }

            /// The pointee.
            pub fn get(&self) -> &T {
                // SAFETY: validation checked the pointer is non-null and in range.
                unsafe { &*self.ptr.as_ptr() }
            }
        }

        impl<T> Deref for $name<T> {
            type Target = T;

            fn deref(&self) -> &T {
                self.get()
            }
        }

        impl<T> AsRef<T> for $name<T> {
            fn as_ref(&self) -> &T {
                self.get()
            }
        }

        impl<T: fmt::Debug> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self.get(), f)
            }
        }

        impl<T: PartialEq<U>, U> PartialEq<$name<U>> for $name<T> {
            fn eq(&self, other: &$name<U>) -> bool {
                self.get() == other.get()
            }
        }

        impl<T: Eq> Eq for $name<T> {}

        // SAFETY: the target is checked by the validator.
        unsafe impl<T: Verify> Verify for $name<T> {
            unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
                // SAFETY: in range per the caller.
                validator.verify_rel(unsafe { &(*ptr).ptr })
            }

            unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
                fixup.fix_owned(ptr.cast::<RelPtr<T>>())
            }
        }
    };
}

archived_pointer! {
    /// Archived form of `Box<T>`.
    ArchivedBox
}

archived_pointer! {
    /// Archived form of `Rc<T>` and `Arc<T>`; shared targets appear once.
    ArchivedRc
}

impl<T: Archive> Archive for Box<T> {
    type Archived = ArchivedBox<T::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        let target = serializer.serialize_boxed(&**self)?;
        serializer.write_rel(pos, target)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("box");
        hasher.visit::<T>()
    }
}

macro_rules! impl_shared_archive {
    ($($ty:ident),*) => {
        $(
            impl<T: Archive> Archive for $ty<T> {
                type Archived = ArchivedRc<T::Archived>;

                fn serialize_into<W: Target + ?Sized>(
                    &self,
                    serializer: &mut Serializer<'_, W>,
                    pos: u64,
                ) -> Result<()> {
                    let target = serializer.serialize_shared(&**self)?;
                    serializer.write_rel(pos, target)
                }

                fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
                    hasher.write_tag("shared");
                    hasher.visit::<T>()
                }
            }
        )*
    };
}

impl_shared_archive!(Rc, Arc);

/// Archived form of [`Ptr<T>`]: a nullable, non-owning relative pointer.
#[repr(transparent)]
pub struct ArchivedPtr<T> {
    ptr: RelPtr<T>,
}

impl<T> ArchivedPtr<T> {
    /// True if the pointer is null.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// The target, `None` if null.
    pub fn get(&self) -> Option<&T> {
        if self.ptr.is_null() {
            return None;
        }
        // SAFETY: validation checked a non-null pointer is in range.
        Some(unsafe { &*self.ptr.as_ptr() })
    }

    /// The raw relative pointer.
    pub fn as_rel(&self) -> &RelPtr<T> {
        &self.ptr
    }
}

impl<T> fmt::Debug for ArchivedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.ptr, f)
    }
}

/// Pointers compare by target address.
impl<T> PartialEq for ArchivedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for ArchivedPtr<T> {}

impl<T: Archive> Archive for Ptr<T> {
    type Archived = ArchivedPtr<T::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        serializer.write_ptr_to(pos, self.as_ptr())
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("ptr");
        hasher.visit::<T>()
    }
}

// SAFETY: a non-null target is checked by the validator.
unsafe impl<T: Verify> Verify for ArchivedPtr<T> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: in range per the caller.
        validator.verify_rel_nullable(unsafe { &(*ptr).ptr })
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // The target is converted by its owner.
        fixup.fix_rel(ptr.cast::<RelPtr<T>>()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize, serialize, Mode, TesseraError};

    #[test]
    fn boxed_value_adds_its_size() -> Result<()> {
        let bytes = serialize(&Box::new(7i32), Mode::NONE)?;
        assert_eq!(bytes.len(), 8 + 4);
        assert_eq!(**deserialize::<Box<i32>>(&bytes, Mode::NONE)?, 7);
        Ok(())
    }

    #[test]
    fn shared_values_are_written_once() -> Result<()> {
        let shared = Rc::new(vec![1u64, 2, 3]);
        let pair = vec![Rc::clone(&shared), shared];
        let bytes = serialize(&pair, Mode::NONE)?;
        let archived = deserialize::<Vec<Rc<Vec<u64>>>>(&bytes, Mode::NONE)?;
        assert!(std::ptr::eq(archived[0].get(), archived[1].get()));
        assert_eq!(*archived[1].get(), vec![1u64, 2, 3]);
        Ok(())
    }

    #[test]
    fn null_box_is_rejected() -> Result<()> {
        let mut bytes = serialize(&Box::new(1u8), Mode::NONE)?;
        bytes[..8].copy_from_slice(&i64::MIN.to_le_bytes());
        assert!(matches!(
            deserialize::<Box<u8>>(&bytes, Mode::NONE),
            Err(TesseraError::NullDereference)
        ));
        Ok(())
    }

    #[test]
    fn pointer_to_unserialized_value_dangles() {
        let orphan = 3u32;
        let res = serialize(&Ptr::new(&orphan), Mode::NONE);
        assert!(matches!(res, Err(TesseraError::DanglingPointer { .. })));
    }
}
