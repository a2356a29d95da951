//! Archived vectors.
//!
//! The owned vector is `std::vec::Vec`. Its archived form is a relative pointer plus
//! a 64-bit length; the elements live out of line, contiguously, in archived form.
//! An empty vector stores a null pointer and no elements.

use crate::archive::{Archive, Verify};
use crate::de::{EndianFixup, Validator};
use crate::error::Result;
use crate::fingerprint::TypeHasher;
use crate::impls::archived_len;
use crate::io::Target;
use crate::ptr::RelPtr;
use crate::ser::Serializer;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::offset_of;
use std::ops::{Deref, Index};
use std::slice::SliceIndex;

/// Archived form of `Vec<T>` (and of every other contiguous sequence).
#[repr(C)]
pub struct ArchivedVec<T> {
    ptr: RelPtr<T>,
    len: u64,
}

impl<T> ArchivedVec<T> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: a non-empty archived vector was validated to point at `len`
        // in-range, aligned elements (or the caller vouched for the buffer).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len as usize) }
    }

    /// The element at `index`, if any.
    pub fn get<I: SliceIndex<[T]>>(&self, index: I) -> Option<&I::Output> {
        self.as_slice().get(index)
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Copies the elements into an owned vector.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_slice().to_vec()
    }

    /// Writes the archived form of `items` at `pos`.
    pub fn serialize_from_slice<U, W>(
        items: &[U],
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()>
    where
        U: Archive<Archived = T>,
        W: Target + ?Sized,
    {
        let ptr_pos = pos + offset_of!(Self, ptr) as u64;
        let len_pos = pos + offset_of!(Self, len) as u64;
        if items.is_empty() {
            serializer.write_null(ptr_pos)?;
            return serializer.write_scalar(len_pos, 0u64);
        }
        let data = serializer.alloc::<T>(items.len())?;
        U::serialize_slice(items, serializer, data)?;
        serializer.write_rel(ptr_pos, data)?;
        serializer.write_scalar(len_pos, archived_len::<u64>(items.len())?)
    }

    /// Writes an archived vector at `pos` whose elements are produced by `write`,
    /// called with the position of each element slot.
    pub fn serialize_with<W, F>(
        len: usize,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
        mut write: F,
    ) -> Result<()>
    where
        W: Target + ?Sized,
        F: FnMut(&mut Serializer<'_, W>, usize, u64) -> Result<()>,
    {
        let ptr_pos = pos + offset_of!(Self, ptr) as u64;
        let len_pos = pos + offset_of!(Self, len) as u64;
        if len == 0 {
            serializer.write_null(ptr_pos)?;
            return serializer.write_scalar(len_pos, 0u64);
        }
        let data = serializer.alloc::<T>(len)?;
        let stride = std::mem::size_of::<T>() as u64;
        for i in 0..len {
            write(serializer, i, data + i as u64 * stride)?;
        }
        serializer.write_rel(ptr_pos, data)?;
        serializer.write_scalar(len_pos, archived_len::<u64>(len)?)
    }
}

impl<T> Deref for ArchivedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, I: SliceIndex<[T]>> Index<I> for ArchivedVec<T> {
    type Output = I::Output;

    fn index(&self, index: I) -> &I::Output {
        &self.as_slice()[index]
    }
}

impl<'a, T> IntoIterator for &'a ArchivedVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for ArchivedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq<U>, U> PartialEq<ArchivedVec<U>> for ArchivedVec<T> {
    fn eq(&self, other: &ArchivedVec<U>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for ArchivedVec<T> {}

impl<T: PartialEq<U>, U> PartialEq<Vec<U>> for ArchivedVec<T> {
    fn eq(&self, other: &Vec<U>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: PartialEq<U>, U> PartialEq<[U]> for ArchivedVec<T> {
    fn eq(&self, other: &[U]) -> bool {
        self.as_slice() == other
    }
}

impl<T: PartialEq<U>, U, const N: usize> PartialEq<[U; N]> for ArchivedVec<T> {
    fn eq(&self, other: &[U; N]) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: PartialOrd> PartialOrd for ArchivedVec<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Ord> Ord for ArchivedVec<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: Hash> Hash for ArchivedVec<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<T: Archive> Archive for Vec<T> {
    type Archived = ArchivedVec<T::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        ArchivedVec::serialize_from_slice(self, serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("vector");
        hasher.visit::<T>()
    }
}

impl<T: Archive> Archive for Box<[T]> {
    type Archived = ArchivedVec<T::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        ArchivedVec::serialize_from_slice(self, serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        <Vec<T> as Archive>::fingerprint(hasher)
    }
}

// SAFETY: the element range is checked and every element verified.
unsafe impl<T: Verify> Verify for ArchivedVec<T> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: `Self` is in range per the caller and only holds integers.
        let this = unsafe { &*ptr };
        validator.verify_rel_slice(&this.ptr, this.len)
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: field addresses of an in-range value.
        let (rel, len) = unsafe {
            (
                std::ptr::addr_of_mut!((*ptr).ptr),
                std::ptr::addr_of_mut!((*ptr).len),
            )
        };
        let len = fixup.swap(len)?;
        fixup.fix_slice(rel, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize, serialize, Mode};

    #[test]
    fn empty_vector_has_no_payload() -> Result<()> {
        let bytes = serialize(&Vec::<u64>::new(), Mode::NONE)?;
        assert_eq!(bytes.len(), std::mem::size_of::<ArchivedVec<u64>>());
        let archived = deserialize::<Vec<u64>>(&bytes, Mode::NONE)?;
        assert!(archived.is_empty());
        assert!(archived.ptr.is_null());
        Ok(())
    }

    #[test]
    fn nested_vectors_compare_with_owned() -> Result<()> {
        let value = vec![vec![1u16, 2], vec![], vec![3]];
        let bytes = serialize(&value, Mode::NONE)?;
        let archived = deserialize::<Vec<Vec<u16>>>(&bytes, Mode::NONE)?;
        assert_eq!(archived.len(), 3);
        assert_eq!(archived[0], vec![1u16, 2]);
        assert!(archived[1].is_empty());
        assert_eq!(archived[2].to_vec(), vec![3]);
        Ok(())
    }
}
