//! The traits that connect owned types to their archived views.
//!
//! [`Archive`] is implemented by owned types (usually through `#[derive(Archive)]`)
//! and knows how to write the archived form at a reserved position. [`Verify`] is
//! implemented by the archived view types and knows how to check, and byte-swap, a
//! value sitting in untrusted memory.

use crate::de::{EndianFixup, Validator};
use crate::error::Result;
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ser::Serializer;

/// An owned type with a fixed-layout archived view.
///
/// `serialize_into` is called with `pos` pointing at a zero-filled slot of
/// `size_of::<Self::Archived>()` bytes, aligned for `Self::Archived`. It writes the
/// value's own scalars there and allocates any out-of-line data through the
/// serializer.
///
/// Implementing this trait by hand is the way to customize how a type is archived;
/// the engine never looks past it.
pub trait Archive: Sized + 'static {
    /// The `#[repr(C)]` view read from archive bytes.
    type Archived: Verify;

    /// Schema version stored in the version trailer when this type is the root.
    const VERSION: u32 = 0;

    /// Whether addresses of values of this type are recorded in the dedup table when
    /// they are written as slice elements, making them valid [`crate::Ptr`] targets.
    const TRACK_ADDRESS: bool = true;

    /// Writes the archived form of `self` at `pos`.
    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()>;

    /// Writes `items` as a contiguous archived array starting at `pos`.
    fn serialize_slice<W: Target + ?Sized>(
        items: &[Self],
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        let stride = std::mem::size_of::<Self::Archived>() as u64;
        let mut at = pos;
        for item in items {
            if Self::TRACK_ADDRESS {
                serializer.register(item, at);
            }
            item.serialize_into(serializer, at)?;
            at += stride;
        }
        Ok(())
    }

    /// Feeds the structural shape of the type into `hasher`.
    fn fingerprint(hasher: &mut TypeHasher) -> Result<()>;
}

/// Validation and byte-order conversion of an archived view.
///
/// # Safety
/// Implementations must check everything that makes a `Self` read from arbitrary
/// bytes safe to use: every relative pointer and length must go through the
/// [`Validator`], and every field with invalid bit patterns (`bool`, `char`, enum tags)
/// must be checked. Safe deserialization relies on this.
pub unsafe trait Verify: Sized + 'static {
    /// Checks the value at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be aligned and `size_of::<Self>()` bytes at `ptr` must lie inside the
    /// validator's range.
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()>;

    /// Checks `len` consecutive values starting at `ptr`.
    ///
    /// # Safety
    /// As for [`Verify::verify`], for the whole array.
    unsafe fn verify_slice(
        ptr: *const Self,
        len: usize,
        validator: &mut Validator<'_>,
    ) -> Result<()> {
        for i in 0..len {
            // SAFETY: `i < len` keeps the element inside the caller's range.
            unsafe { Self::verify(ptr.add(i), validator)? };
        }
        Ok(())
    }

    /// Swaps every scalar of the value at `ptr` between archive and host byte order,
    /// following pointers to out-of-line data.
    ///
    /// # Safety
    /// As for [`Verify::verify`], with exclusive access to the bytes.
    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()>;

    /// Byte-swaps `len` consecutive values starting at `ptr`.
    ///
    /// # Safety
    /// As for [`Verify::fix_endian`], for the whole array.
    unsafe fn fix_endian_slice(
        ptr: *mut Self,
        len: usize,
        fixup: &mut EndianFixup<'_>,
    ) -> Result<()> {
        for i in 0..len {
            // SAFETY: `i < len` keeps the element inside the caller's range.
            unsafe { Self::fix_endian(ptr.add(i), fixup)? };
        }
        Ok(())
    }
}

/// A plain number that can be written byte-for-byte.
///
/// # Safety
/// The type must have no padding and every bit pattern must be a valid value.
pub unsafe trait Scalar: Copy + 'static {
    /// Reverses the byte order.
    fn swap_bytes(self) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            // SAFETY: primitive integers have no padding and no invalid values.
            unsafe impl Scalar for $t {
                #[inline]
                fn swap_bytes(self) -> Self {
                    <$t>::swap_bytes(self)
                }
            }
        )*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128);

// SAFETY: floats have no padding; every bit pattern is some (possibly NaN) value.
unsafe impl Scalar for f32 {
    #[inline]
    fn swap_bytes(self) -> Self {
        f32::from_bits(self.to_bits().swap_bytes())
    }
}

// SAFETY: as for `f32`.
unsafe impl Scalar for f64 {
    #[inline]
    fn swap_bytes(self) -> Self {
        f64::from_bits(self.to_bits().swap_bytes())
    }
}

/// The raw bytes of a scalar slice.
pub(crate) fn scalar_bytes<S: Scalar>(values: &[S]) -> &[u8] {
    // SAFETY: `Scalar` types have no padding, so every byte is initialized.
    unsafe { std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values)) }
}

/// Swaps the scalar at `ptr` in place and returns the host-order value.
///
/// # Safety
/// `ptr` must be valid for reads and writes and aligned.
pub unsafe fn swap_in_place<S: Scalar>(ptr: *mut S) -> S {
    // SAFETY: forwarded to the caller.
    unsafe {
        let value = ptr.read().swap_bytes();
        ptr.write(value);
        value
    }
}
