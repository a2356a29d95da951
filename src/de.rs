//! The deserialization engine.
//!
//! Reading an archive never copies it. [`deserialize`] checks the trailers, then walks
//! the archived value with a [`Validator`] that confirms every pointer and length
//! stays inside the buffer and every constrained field (`bool`, `char`, enum tags,
//! UTF-8) holds a valid value. Only then is the buffer reinterpreted as
//! `&T::Archived`.
//!
//! [`deserialize_mut`] additionally accepts archives written in the other byte order
//! and converts them in place with an [`EndianFixup`] pass before validating.

use crate::archive::{swap_in_place, Archive, Scalar, Verify};
use crate::error::{Result, TesseraError};
use crate::fingerprint::fingerprint;
use crate::format::{read_u64, Sections, VersionTrailer, ARCHIVE_ALIGN, FORMAT_VERSION};
use crate::io::xxhash;
use crate::mode::Mode;
use crate::ptr::RelPtr;
use std::any::TypeId;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};

/// Address range of the payload being read.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    start: usize,
    end: usize,
}

impl Bounds {
    fn new(bytes: &[u8]) -> Self {
        let start = bytes.as_ptr() as usize;
        Self {
            start,
            end: start + bytes.len(),
        }
    }

    fn check<T>(&self, ptr: *const T, count: usize) -> Result<()> {
        let addr = ptr as usize;
        let len = size_of::<T>()
            .checked_mul(count)
            .ok_or_else(|| TesseraError::Overflow(format!("{count} elements")))?;
        if addr < self.start {
            return Err(TesseraError::invalid(format!(
                "reference {} bytes before the archive start",
                self.start - addr
            )));
        }
        let available = (self.end - self.start) as u64;
        let end = addr
            .checked_add(len)
            .ok_or_else(|| TesseraError::truncated(u64::MAX, available))?;
        if end > self.end {
            return Err(TesseraError::truncated((end - self.start) as u64, available));
        }
        if addr % align_of::<T>() != 0 {
            return Err(TesseraError::Misaligned {
                align: align_of::<T>(),
            });
        }
        Ok(())
    }
}

/// Maximum number of nested pointer or slice hops followed in one walk.
///
/// Archives nested deeper than this are rejected with `InvalidData`, which keeps a
/// forged chain from exhausting the stack.
pub const MAX_DEPTH: usize = 512;

fn too_deep() -> TesseraError {
    TesseraError::invalid(format!("archive nesting exceeds {MAX_DEPTH} levels"))
}

fn element_count(len: u64) -> Result<usize> {
    usize::try_from(len).map_err(|_| TesseraError::Overflow(format!("length {len}")))
}

/// Bounds and value checker for archived data.
///
/// Every method that follows a reference checks the referenced range first, which is
/// what makes the [`Verify`] calls it performs sound.
#[derive(Debug)]
pub struct Validator<'a> {
    base: *const u8,
    bounds: Bounds,
    deep: bool,
    depth: usize,
    visited: HashSet<(usize, TypeId)>,
    _bytes: PhantomData<&'a [u8]>,
}

impl<'a> Validator<'a> {
    /// A validator over `bytes`; `deep` enables container invariant checks.
    pub fn new(bytes: &'a [u8], deep: bool) -> Self {
        Self {
            base: bytes.as_ptr(),
            bounds: Bounds::new(bytes),
            deep,
            depth: 0,
            visited: HashSet::new(),
            _bytes: PhantomData,
        }
    }

    /// True if container invariants (`DEEP_CHECK`) are verified as well.
    pub fn deep_check(&self) -> bool {
        self.deep
    }

    /// Verifies the value of type `T` at the start of the buffer.
    pub fn verify_root<T: Verify>(&mut self) -> Result<&'a T> {
        let root = self.base.cast::<T>();
        self.verify_target(root)?;
        // SAFETY: verified above; the buffer is borrowed for 'a.
        Ok(unsafe { &*root })
    }

    /// Fails unless `count` values of `T` at `ptr` lie inside the buffer, aligned.
    pub fn check_range<T>(&self, ptr: *const T, count: usize) -> Result<()> {
        self.bounds.check(ptr, count)
    }

    /// Checks and verifies the single value at `ptr`, at most once per type.
    pub fn verify_target<T: Verify>(&mut self, ptr: *const T) -> Result<()> {
        self.check_range(ptr, 1)?;
        if !self.visited.insert((ptr as usize, TypeId::of::<T>())) {
            return Ok(());
        }
        self.enter()?;
        // SAFETY: the range was checked above and stays borrowed for 'a.
        let result = unsafe { T::verify(ptr, self) };
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(too_deep());
        }
        self.depth += 1;
        Ok(())
    }

    /// Follows a relative pointer that must not be null.
    pub fn verify_rel<T: Verify>(&mut self, rel: &RelPtr<T>) -> Result<()> {
        if rel.is_null() {
            return Err(TesseraError::NullDereference);
        }
        self.verify_target(rel.as_ptr())
    }

    /// Follows a relative pointer that may be null.
    pub fn verify_rel_nullable<T: Verify>(&mut self, rel: &RelPtr<T>) -> Result<()> {
        if rel.is_null() {
            return Ok(());
        }
        self.verify_target(rel.as_ptr())
    }

    /// Checks and verifies the `len` values a relative pointer refers to. A zero
    /// length never dereferences the pointer.
    pub fn verify_rel_slice<T: Verify>(&mut self, rel: &RelPtr<T>, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        if rel.is_null() {
            return Err(TesseraError::NullDereference);
        }
        let count = element_count(len)?;
        let ptr = rel.as_ptr();
        self.check_range(ptr, count)?;
        self.enter()?;
        // SAFETY: the whole array was checked above.
        let result = unsafe { T::verify_slice(ptr, count, self) };
        self.depth -= 1;
        result
    }

    /// Builds an `InvalidData` error.
    pub fn invalid(&self, msg: impl Into<String>) -> TesseraError {
        TesseraError::invalid(msg)
    }
}

/// In-place byte-order conversion of archived data.
///
/// Pointers are followed only where they own their target; shared targets are
/// converted once. Every access is range checked, so a corrupt archive produces an
/// error or garbage values that the validation pass rejects afterwards.
#[derive(Debug)]
pub struct EndianFixup<'a> {
    base: *mut u8,
    bounds: Bounds,
    depth: usize,
    visited: HashSet<(usize, TypeId)>,
    _bytes: PhantomData<&'a mut [u8]>,
}

impl<'a> EndianFixup<'a> {
    /// A fix-up pass over `bytes`.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            bounds: Bounds::new(bytes),
            base: bytes.as_mut_ptr(),
            depth: 0,
            visited: HashSet::new(),
            _bytes: PhantomData,
        }
    }

    /// Converts the value of type `T` at the start of the buffer.
    pub fn fix_root<T: Verify>(&mut self) -> Result<()> {
        self.fix_target(self.base.cast::<T>())
    }

    /// Swaps the scalar at `ptr` and returns its host-order value.
    pub fn swap<S: Scalar>(&mut self, ptr: *mut S) -> Result<S> {
        self.bounds.check(ptr, 1)?;
        // SAFETY: in range, aligned, and exclusively borrowed for 'a.
        Ok(unsafe { swap_in_place(ptr) })
    }

    /// Swaps a relative pointer and returns its target, `None` if null.
    pub fn fix_rel<T>(&mut self, rel: *mut RelPtr<T>) -> Result<Option<*mut T>> {
        let offset = self.swap(rel.cast::<i64>())?;
        if offset == RelPtr::<T>::NULL_OFFSET {
            return Ok(None);
        }
        Ok(Some(
            rel.cast::<u8>().wrapping_offset(offset as isize).cast::<T>(),
        ))
    }

    /// Converts the value at `ptr`, at most once per type.
    pub fn fix_target<T: Verify>(&mut self, ptr: *mut T) -> Result<()> {
        self.bounds.check(ptr, 1)?;
        if !self.visited.insert((ptr as usize, TypeId::of::<T>())) {
            return Ok(());
        }
        self.enter()?;
        // SAFETY: the range was checked above.
        let result = unsafe { T::fix_endian(ptr, self) };
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(too_deep());
        }
        self.depth += 1;
        Ok(())
    }

    /// Swaps an owning relative pointer and converts its target.
    pub fn fix_owned<T: Verify>(&mut self, rel: *mut RelPtr<T>) -> Result<()> {
        match self.fix_rel(rel)? {
            Some(target) => self.fix_target(target),
            None => Ok(()),
        }
    }

    /// Swaps a relative pointer to `len` values (`len` already in host order) and
    /// converts them.
    pub fn fix_slice<T: Verify>(&mut self, rel: *mut RelPtr<T>, len: u64) -> Result<()> {
        let Some(target) = self.fix_rel(rel)? else {
            return Ok(());
        };
        if len == 0 {
            return Ok(());
        }
        let count = element_count(len)?;
        self.bounds.check(target, count)?;
        self.enter()?;
        // SAFETY: the whole array was checked above.
        let result = unsafe { T::fix_endian_slice(target, count, self) };
        self.depth -= 1;
        result
    }
}

/// Runs the trailer checks and returns the payload length.
fn check_trailers<T: Archive>(bytes: &[u8], mode: Mode) -> Result<usize> {
    let sections = Sections::locate(bytes.len(), mode)?;

    if let Some(range) = &sections.version {
        let trailer = VersionTrailer::from_bytes(&bytes[range.clone()])?;
        if trailer.format_version != FORMAT_VERSION {
            return Err(TesseraError::VersionMismatch {
                expected: u64::from(FORMAT_VERSION),
                found: u64::from(trailer.format_version),
            });
        }
        if trailer.schema_version != T::VERSION {
            return Err(TesseraError::VersionMismatch {
                expected: u64::from(T::VERSION),
                found: u64::from(trailer.schema_version),
            });
        }
    }

    if let Some(range) = &sections.checksum {
        let stored = read_u64(bytes, range.start)?;
        let actual = xxhash(&bytes[..range.start]);
        if stored != actual {
            return Err(TesseraError::IntegrityMismatch {
                what: "checksum",
                expected: actual,
                found: stored,
            });
        }
    }

    if let Some(range) = &sections.version {
        let stored = read_u64(bytes, range.start)?;
        let expected = fingerprint::<T>()?;
        if stored != expected {
            return Err(TesseraError::IntegrityMismatch {
                what: "fingerprint",
                expected,
                found: stored,
            });
        }
    }

    let payload = sections.payload.end;
    if (bytes.as_ptr() as usize) % ARCHIVE_ALIGN != 0 {
        return Err(TesseraError::Misaligned {
            align: ARCHIVE_ALIGN,
        });
    }
    let root = size_of::<T::Archived>();
    if payload < root {
        return Err(TesseraError::truncated(root as u64, payload as u64));
    }
    Ok(payload)
}

/// Validates `bytes` as an archive of `T` and returns the archived view.
///
/// Fails with `InvalidData` if the archive was written in the other byte order; use
/// [`deserialize_mut`] for those.
pub fn deserialize<T: Archive>(bytes: &[u8], mode: Mode) -> Result<&T::Archived> {
    let payload = check_trailers::<T>(bytes, mode)?;
    if mode.needs_swap() {
        return Err(TesseraError::invalid(
            "archive byte order differs from the host; convert it with deserialize_mut",
        ));
    }
    let root = Validator::new(&bytes[..payload], mode.deep_check()).verify_root::<T::Archived>()?;
    tracing::debug!(size = bytes.len(), %mode, "archive validated");
    Ok(root)
}

/// Like [`deserialize`], but converts a foreign byte order archive to host order in
/// place first.
///
/// After conversion the buffer is a host-order archive: the checksum trailer, if any,
/// is rewritten, and the buffer reads back with the mode minus
/// [`Mode::SERIALIZE_BIG_ENDIAN`] (on a little-endian host).
pub fn deserialize_mut<T: Archive>(bytes: &mut [u8], mode: Mode) -> Result<&T::Archived> {
    let payload = check_trailers::<T>(bytes, mode)?;
    if mode.needs_swap() {
        EndianFixup::new(&mut bytes[..payload]).fix_root::<T::Archived>()?;
        if let Some(range) = Sections::locate(bytes.len(), mode)?.checksum {
            let sum = xxhash(&bytes[..range.start]);
            bytes[range].copy_from_slice(&sum.to_le_bytes());
        }
        tracing::debug!(size = bytes.len(), "archive converted to host byte order");
    }
    let bytes: &[u8] = bytes;
    Validator::new(&bytes[..payload], mode.deep_check()).verify_root::<T::Archived>()
}

/// Reinterprets `bytes` as an archive of `T` without any check.
///
/// # Safety
/// `bytes` must hold a valid host-order archive of `T` written by this crate, starting
/// at an 8-aligned address.
pub unsafe fn unchecked_deserialize<T: Archive>(bytes: &[u8]) -> &T::Archived {
    // SAFETY: forwarded to the caller.
    unsafe { &*bytes.as_ptr().cast::<T::Archived>() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::ByteBuf;

    #[test]
    fn bounds_reject_out_of_range_and_misaligned() {
        let buf = ByteBuf::from_slice(&[0u8; 16]);
        let bounds = Bounds::new(&buf);
        let base = buf.as_ptr();
        assert!(bounds.check(base.cast::<u64>(), 2).is_ok());
        assert!(matches!(
            bounds.check(base.cast::<u64>(), 3),
            Err(TesseraError::TruncatedBuffer { needed: 24, available: 16 })
        ));
        assert!(matches!(
            bounds.check(base.wrapping_add(4).cast::<u64>(), 1),
            Err(TesseraError::Misaligned { align: 8 })
        ));
        assert!(bounds.check(base.wrapping_sub(8).cast::<u64>(), 1).is_err());
    }

    #[test]
    fn null_slice_with_length_is_rejected() {
        let buf = ByteBuf::from_slice(&[0u8; 8]);
        let mut v = Validator::new(&buf, false);
        let rel = RelPtr::<u32>::null();
        assert!(v.verify_rel_slice(&rel, 0).is_ok());
        assert!(matches!(
            v.verify_rel_slice(&rel, 1),
            Err(TesseraError::NullDereference)
        ));
    }
}
