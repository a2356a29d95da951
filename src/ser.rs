//! The serialization engine.
//!
//! Serialization is a single top-down walk. The root slot is reserved first; every
//! value then fills in the slot reserved for it and appends (zero-filled, aligned)
//! slots for its out-of-line data, recursing into them. All positions are absolute
//! offsets into the target, so they survive any reallocation of the storage.
//!
//! ```text
//! serialize_into
//!   ├── reserve root slot, register root
//!   ├── Archive::serialize_into (recursive)
//!   │     ├── write_scalar / write_rel
//!   │     ├── alloc -> child slots
//!   │     └── write_ptr_to -> dedup hit | pending
//!   ├── resolve pending pointers
//!   └── trailers: version (16 B), checksum (8 B)
//! ```

use crate::archive::{scalar_bytes, Archive, Scalar};
use crate::buf::ByteBuf;
use crate::error::{Result, TesseraError};
use crate::fingerprint::fingerprint;
use crate::format::{VersionTrailer, ARCHIVE_ALIGN};
use crate::io::Target;
use crate::mode::Mode;
use crate::ptr::RelPtr;
use std::any::TypeId;
use std::collections::HashMap;
use std::mem::{align_of, size_of};
use std::ops::Range;

type AddressKey = (usize, TypeId);

#[derive(Debug)]
struct Pending {
    field: u64,
    key: AddressKey,
}

/// Outcome of a successful [`serialize_into`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    /// Archive bytes in the target, trailers included.
    pub range: Range<u64>,
    /// The checksum trailer value, if one was written.
    pub checksum: Option<u64>,
}

/// Serialization state for one call: the target, the mode, and the dedup table.
#[derive(Debug)]
pub struct Serializer<'t, W: Target + ?Sized> {
    target: &'t mut W,
    mode: Mode,
    swap: bool,
    seen: HashMap<AddressKey, u64>,
    pending: Vec<Pending>,
}

impl<'t, W: Target + ?Sized> Serializer<'t, W> {
    pub(crate) fn new(target: &'t mut W, mode: Mode) -> Self {
        Self {
            target,
            mode,
            swap: mode.needs_swap(),
            seen: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// The mode of this call.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Appends a zero-filled, aligned slot for `count` values of `A`.
    pub fn alloc<A>(&mut self, count: usize) -> Result<u64> {
        let len = size_of::<A>()
            .checked_mul(count)
            .ok_or_else(|| TesseraError::Overflow(format!("{count} elements")))?;
        self.target.write_zeroed(len, align_of::<A>())
    }

    /// Writes a scalar at `pos` in the archive byte order.
    pub fn write_scalar<S: Scalar>(&mut self, pos: u64, value: S) -> Result<()> {
        let value = if self.swap { value.swap_bytes() } else { value };
        self.target.write_at(pos, scalar_bytes(std::slice::from_ref(&value)))
    }

    /// Writes consecutive scalars starting at `pos` in the archive byte order.
    pub fn write_scalars<S: Scalar>(&mut self, pos: u64, values: &[S]) -> Result<()> {
        if self.swap {
            let swapped: Vec<S> = values.iter().map(|v| v.swap_bytes()).collect();
            self.target.write_at(pos, scalar_bytes(&swapped))
        } else {
            self.target.write_at(pos, scalar_bytes(values))
        }
    }

    /// Writes raw bytes at `pos`; they are not subject to byte-order conversion.
    pub fn write_bytes(&mut self, pos: u64, bytes: &[u8]) -> Result<()> {
        self.target.write_at(pos, bytes)
    }

    /// Writes the relative pointer stored at `field` so it refers to `target`.
    pub fn write_rel(&mut self, field: u64, target: u64) -> Result<()> {
        let offset = RelPtr::<()>::displacement(field, target)?;
        self.write_scalar(field, offset)
    }

    /// Writes a null relative pointer at `field`.
    pub fn write_null(&mut self, field: u64) -> Result<()> {
        self.write_scalar(field, RelPtr::<()>::NULL_OFFSET)
    }

    /// Records that the value at `value` was archived at `pos`.
    pub fn register<T: 'static>(&mut self, value: *const T, pos: u64) {
        self.seen.insert((value as usize, TypeId::of::<T>()), pos);
    }

    /// Archive position of an already registered value.
    pub fn position_of<T: 'static>(&self, value: *const T) -> Option<u64> {
        self.seen.get(&(value as usize, TypeId::of::<T>())).copied()
    }

    /// Writes a relative pointer at `field` to the archived copy of `value`.
    ///
    /// If `value` has not been written yet the pointer is resolved after the walk;
    /// a target that is never written fails the call with `DanglingPointer`.
    pub fn write_ptr_to<T: 'static>(&mut self, field: u64, value: *const T) -> Result<()> {
        if value.is_null() {
            return self.write_null(field);
        }
        match self.position_of(value) {
            Some(pos) => {
                tracing::trace!(field, pos, "pointer target already written");
                self.write_rel(field, pos)
            }
            None => {
                self.pending.push(Pending {
                    field,
                    key: (value as usize, TypeId::of::<T>()),
                });
                self.write_null(field)
            }
        }
    }

    /// Archives `value` into a fresh out-of-line slot and returns its position.
    ///
    /// The value is registered before it is written, so pointers inside it that refer
    /// back to it resolve immediately.
    pub fn serialize_boxed<T: Archive>(&mut self, value: &T) -> Result<u64> {
        let pos = self.alloc::<T::Archived>(1)?;
        self.register(value, pos);
        value.serialize_into(self, pos)?;
        Ok(pos)
    }

    /// Archives `value` unless it was archived before; returns its position.
    pub fn serialize_shared<T: Archive>(&mut self, value: &T) -> Result<u64> {
        if let Some(pos) = self.position_of(value) {
            tracing::trace!(pos, "shared value deduplicated");
            return Ok(pos);
        }
        self.serialize_boxed(value)
    }

    fn resolve_pending(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            tracing::trace!(count = self.pending.len(), "resolving pending pointers");
        }
        for Pending { field, key } in std::mem::take(&mut self.pending) {
            let pos = self
                .seen
                .get(&key)
                .copied()
                .ok_or(TesseraError::DanglingPointer { address: key.0 })?;
            self.write_rel(field, pos)?;
        }
        Ok(())
    }
}

/// Serializes `value` into `target` and returns where the archive landed.
///
/// The archive starts at the next [`ARCHIVE_ALIGN`]-aligned position of the target.
pub fn serialize_into<T, W>(target: &mut W, value: &T, mode: Mode) -> Result<Written>
where
    T: Archive,
    W: Target + ?Sized,
{
    let start = target.write_zeroed(
        size_of::<T::Archived>(),
        align_of::<T::Archived>().max(ARCHIVE_ALIGN),
    )?;
    tracing::debug!(%mode, start, root_size = size_of::<T::Archived>(), "serialize start");

    let pending = {
        let mut serializer = Serializer::new(&mut *target, mode);
        serializer.register(value, start);
        value.serialize_into(&mut serializer, start)?;
        let pending = serializer.pending.len();
        serializer.resolve_pending()?;
        pending
    };

    if mode.has_version() {
        let trailer = VersionTrailer::new(fingerprint::<T>()?, T::VERSION);
        target.write(&trailer.to_bytes(), ARCHIVE_ALIGN)?;
    }
    let checksum = if mode.has_integrity() {
        let sum = target.checksum(start)?;
        target.write(&sum.to_le_bytes(), 1)?;
        Some(sum)
    } else {
        None
    };
    target.flush()?;

    let end = target.size();
    tracing::debug!(size = end - start, pending, "serialize finished");
    Ok(Written {
        range: start..end,
        checksum,
    })
}

/// Serializes `value` into a fresh aligned buffer.
pub fn serialize<T: Archive>(value: &T, mode: Mode) -> Result<ByteBuf> {
    let mut buf = ByteBuf::new();
    serialize_into(&mut buf, value, mode)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_follow_the_archive_byte_order() -> Result<()> {
        let mut buf = ByteBuf::new();
        let mut s = Serializer::new(&mut buf, Mode::SERIALIZE_BIG_ENDIAN);
        let pos = s.alloc::<u32>(2)?;
        s.write_scalars(pos, &[1u32, 2])?;
        let expected: &[u8] = if cfg!(target_endian = "little") {
            &[0, 0, 0, 1, 0, 0, 0, 2]
        } else {
            &[1, 0, 0, 0, 2, 0, 0, 0]
        };
        assert_eq!(&buf[..], expected);
        Ok(())
    }

    #[test]
    fn unresolved_pointer_is_dangling() -> Result<()> {
        let orphan = 5u32;
        let mut buf = ByteBuf::new();
        let mut s = Serializer::new(&mut buf, Mode::NONE);
        let field = s.alloc::<i64>(1)?;
        s.write_ptr_to(field, &orphan as *const u32)?;
        assert!(matches!(
            s.resolve_pending(),
            Err(TesseraError::DanglingPointer { .. })
        ));
        Ok(())
    }

    #[test]
    fn registered_target_resolves_later() -> Result<()> {
        let value = 5u32;
        let mut buf = ByteBuf::new();
        let mut s = Serializer::new(&mut buf, Mode::NONE);
        let field = s.alloc::<i64>(1)?;
        s.write_ptr_to(field, &value as *const u32)?;
        let pos = s.alloc::<u32>(1)?;
        s.register(&value as *const u32, pos);
        s.resolve_pending()?;
        assert_eq!(&buf[..8], &8i64.to_le_bytes());
        Ok(())
    }
}
