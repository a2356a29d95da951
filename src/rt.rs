//! Runtime support for `#[derive(Archive)]` and `#[derive(Reflect)]`.
//! Not part of the public API.

pub use crate::archive::{Archive, Verify};
pub use crate::de::{EndianFixup, Validator};
pub use crate::error::{Result, TesseraError};
pub use crate::fingerprint::TypeHasher;
pub use crate::io::Target;
pub use crate::reflect::{FieldVisitor, FieldVisitorMut, Reflect};
pub use crate::ser::Serializer;
pub use crate::variant::Variant;
pub use std::mem::offset_of;
pub use std::ptr::{addr_of, addr_of_mut};

/// Reads the `u32` tag at the start of an archived enum.
///
/// # Safety
/// `ptr` must point at an in-range, aligned archived enum.
#[inline]
pub unsafe fn read_tag<T>(ptr: *const T) -> u32 {
    // SAFETY: forwarded to the caller; every archived enum starts with its tag.
    unsafe { *ptr.cast::<u32>() }
}

/// Swaps the tag of an archived enum to host order and returns it.
#[inline]
pub fn fix_tag<T>(ptr: *mut T, fixup: &mut EndianFixup<'_>) -> Result<u32> {
    fixup.swap(ptr.cast::<u32>())
}

/// The error for a tag outside `0..count`.
#[cold]
pub fn invalid_tag(type_name: &str, tag: u32, count: u32) -> TesseraError {
    TesseraError::invalid(format!(
        "{type_name}: variant tag {tag} out of range (count {count})"
    ))
}
