//! Pointer flavors.
//!
//! * [`Ptr`] is a process-local, absolute pointer for owned object graphs (the
//!   non-owning edges of a graph whose nodes are owned by `Box`es or vectors).
//! * [`RelPtr`] is a relocatable pointer: a signed displacement from its own address
//!   to its target. It is what every pointer becomes inside an archive.
//!
//! Both implement [`Pointer`]. Only [`RelPtr`] knows about displacements.

use crate::error::{Result, TesseraError};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Operations shared by both pointer flavors.
pub trait Pointer<T> {
    /// True if the pointer does not reference anything.
    fn is_null(&self) -> bool;

    /// The resolved address, null if [`Pointer::is_null`].
    fn as_ptr(&self) -> *const T;

    /// Points `self` at `target` (null clears it).
    ///
    /// # Safety
    /// For [`RelPtr`], the displacement is computed from the current address of
    /// `self`; moving `self` afterwards invalidates it.
    unsafe fn set(&mut self, target: *const T) -> Result<()>;

    /// Dereferences the pointer.
    ///
    /// # Safety
    /// The target must be a live, properly aligned `T` for the returned lifetime.
    unsafe fn get<'a>(&self) -> Result<&'a T> {
        let ptr = self.as_ptr();
        if ptr.is_null() {
            return Err(TesseraError::NullDereference);
        }
        // SAFETY: non-null and valid per the caller's contract.
        Ok(unsafe { &*ptr })
    }
}

/// Process-local pointer holding an absolute address.
///
/// `Ptr` never owns its target. Serializing a `Ptr` requires its target to be
/// serialized as well, through an owner (`Box`, `Rc`, a vector element, the root);
/// otherwise serialization fails with [`TesseraError::DanglingPointer`].
#[repr(transparent)]
pub struct Ptr<T> {
    ptr: *const T,
}

impl<T> Ptr<T> {
    /// A null pointer.
    pub const fn null() -> Self {
        Self {
            ptr: std::ptr::null(),
        }
    }

    /// Points at `target`.
    pub const fn new(target: &T) -> Self {
        Self { ptr: target }
    }

    /// Points at a raw address.
    pub const fn from_raw(ptr: *const T) -> Self {
        Self { ptr }
    }

    /// True if null.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// The stored address.
    pub const fn as_ptr(&self) -> *const T {
        self.ptr
    }

    /// Dereferences the pointer.
    ///
    /// # Safety
    /// The target must still be alive and not mutably borrowed for `'a`.
    pub unsafe fn get<'a>(&self) -> Result<&'a T> {
        // SAFETY: forwarded to the caller.
        unsafe { Pointer::get(self) }
    }
}

impl<T> Pointer<T> for Ptr<T> {
    fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    fn as_ptr(&self) -> *const T {
        self.ptr
    }

    unsafe fn set(&mut self, target: *const T) -> Result<()> {
        self.ptr = target;
        Ok(())
    }
}

impl<T> Default for Ptr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ptr<T> {}

impl<T> PartialEq for Ptr<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ptr, other.ptr)
    }
}

impl<T> Eq for Ptr<T> {}

impl<T> Hash for Ptr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.ptr as usize).hash(state);
    }
}

impl<T> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ptr({:p})", self.ptr)
    }
}

impl<T> From<&T> for Ptr<T> {
    fn from(target: &T) -> Self {
        Self::new(target)
    }
}

/// Relocatable pointer: a displacement relative to the pointer's own address.
///
/// The displacement `i64::MIN` is reserved for null, so a zero displacement (a
/// pointer to itself) stays a valid, non-null value.
#[repr(transparent)]
pub struct RelPtr<T> {
    offset: i64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RelPtr<T> {
    /// Reserved displacement meaning "null".
    pub const NULL_OFFSET: i64 = i64::MIN;

    /// A null relative pointer.
    pub const fn null() -> Self {
        Self::from_offset(Self::NULL_OFFSET)
    }

    /// A pointer with the given raw displacement.
    pub const fn from_offset(offset: i64) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }

    /// Displacement between two archive positions, as stored by a pointer at `from`
    /// referring to `to`.
    pub fn displacement(from: u64, to: u64) -> Result<i64> {
        let diff = i128::from(to) - i128::from(from);
        i64::try_from(diff)
            .ok()
            .filter(|d| *d != Self::NULL_OFFSET)
            .ok_or_else(|| TesseraError::Overflow(format!("displacement {from} -> {to}")))
    }

    /// True if null.
    pub const fn is_null(&self) -> bool {
        self.offset == Self::NULL_OFFSET
    }

    /// Raw displacement.
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    /// Resolved address, null if [`RelPtr::is_null`]. The address is computed with
    /// wrapping arithmetic and may lie outside any allocation; it is only
    /// dereferenced after validation.
    pub fn as_ptr(&self) -> *const T {
        if self.is_null() {
            return std::ptr::null();
        }
        (self as *const Self)
            .cast::<u8>()
            .wrapping_offset(self.offset as isize)
            .cast::<T>()
    }

    /// Dereferences the pointer.
    ///
    /// # Safety
    /// The enclosing buffer must have been validated (or be trusted), and it must
    /// outlive `'a` at its current address.
    pub unsafe fn get<'a>(&self) -> Result<&'a T> {
        // SAFETY: forwarded to the caller.
        unsafe { Pointer::get(self) }
    }
}

impl<T> Pointer<T> for RelPtr<T> {
    fn is_null(&self) -> bool {
        RelPtr::is_null(self)
    }

    fn as_ptr(&self) -> *const T {
        RelPtr::as_ptr(self)
    }

    unsafe fn set(&mut self, target: *const T) -> Result<()> {
        if target.is_null() {
            self.offset = Self::NULL_OFFSET;
            return Ok(());
        }
        let from = self as *const Self as usize as u64;
        self.offset = Self::displacement(from, target as usize as u64)?;
        Ok(())
    }
}

impl<T> Clone for RelPtr<T> {
    fn clone(&self) -> Self {
        Self::from_offset(self.offset)
    }
}

impl<T> PartialEq for RelPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.as_ptr(), other.as_ptr())
    }
}

impl<T> Eq for RelPtr<T> {}

impl<T> fmt::Debug for RelPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("RelPtr(null)")
        } else {
            write!(f, "RelPtr({:+})", self.offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_distinct_from_self_reference() {
        let null = RelPtr::<u32>::null();
        let this = RelPtr::<u32>::from_offset(0);
        assert!(null.is_null());
        assert!(!this.is_null());
        assert_eq!(this.as_ptr() as usize, &this as *const _ as usize);
    }

    #[test]
    fn set_and_get_follow_the_target() -> Result<()> {
        #[repr(C)]
        struct Pair {
            value: u64,
            ptr: RelPtr<u64>,
        }

        let mut pair = Pair {
            value: 42,
            ptr: RelPtr::null(),
        };
        let target: *const u64 = &pair.value;
        // SAFETY: `pair` is not moved between `set` and `get`.
        unsafe {
            pair.ptr.set(target)?;
            assert_eq!(pair.ptr.offset(), -8);
            assert_eq!(*pair.ptr.get()?, 42);
        }
        Ok(())
    }

    #[test]
    fn null_dereference_is_an_error() {
        let local = Ptr::<u8>::default();
        // SAFETY: null pointers are never dereferenced.
        let res = unsafe { local.get() };
        assert!(matches!(res, Err(TesseraError::NullDereference)));
    }

    #[test]
    fn local_pointers_compare_by_address() {
        let values = [1, 1];
        assert_ne!(Ptr::new(&values[0]), Ptr::new(&values[1]));
        assert_eq!(Ptr::new(&values[0]), Ptr::from_raw(values.as_ptr()));
    }
}
