//! Defines the physical layout of a tessera archive.
//!
//! # Layout
//! ```text
//! [ Root ] [ Overflow ... ] [ pad to 8 ] [ Version Trailer ]? [ Checksum ]?
//! ```
//!
//! The root is the fixed-size archived form of the root type and always starts at
//! offset 0. Overflow data (vector elements, long strings, boxed values) follows in the
//! order it was first written. Trailers are present only when the matching [`Mode`]
//! flag is set and are always little-endian, independent of the archive byte order.

use crate::error::{Result, TesseraError};
use crate::mode::Mode;
use std::ops::Range;

/// Alignment of the archive start and of the trailer block.
pub const ARCHIVE_ALIGN: usize = 8;

/// Version of the binary layout produced by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the version trailer.
/// Fingerprint(8) + FormatVersion(4) + SchemaVersion(4) = 16
pub const VERSION_TRAILER_SIZE: usize = 16;

/// Size of the checksum trailer.
pub const CHECKSUM_SIZE: usize = 8;

/// The trailer written with [`Mode::WITH_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionTrailer {
    /// Structural hash of the root type.
    pub fingerprint: u64,
    /// Binary layout version, see [`FORMAT_VERSION`].
    pub format_version: u32,
    /// User schema version (`#[tessera(version = N)]` on the root type).
    pub schema_version: u32,
}

impl VersionTrailer {
    /// Creates a trailer for the current format version.
    pub fn new(fingerprint: u64, schema_version: u32) -> Self {
        Self {
            fingerprint,
            format_version: FORMAT_VERSION,
            schema_version,
        }
    }

    /// Serializes the trailer (little endian).
    pub fn to_bytes(&self) -> [u8; VERSION_TRAILER_SIZE] {
        let mut buf = [0u8; VERSION_TRAILER_SIZE];
        buf[0..8].copy_from_slice(&self.fingerprint.to_le_bytes());
        buf[8..12].copy_from_slice(&self.format_version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.schema_version.to_le_bytes());
        buf
    }

    /// Deserializes the trailer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let fingerprint = read_u64(bytes, 0)?;
        let format_version = read_u32(bytes, 8)?;
        let schema_version = read_u32(bytes, 12)?;
        Ok(Self {
            fingerprint,
            format_version,
            schema_version,
        })
    }
}

/// Where the parts of an archive of a given length live, derived from the mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections {
    /// Root and overflow region (including trailing alignment padding).
    pub payload: Range<usize>,
    /// Version trailer, if present.
    pub version: Option<Range<usize>>,
    /// Checksum trailer, if present.
    pub checksum: Option<Range<usize>>,
}

impl Sections {
    /// Splits an archive of `len` bytes according to `mode`.
    pub fn locate(len: usize, mode: Mode) -> Result<Self> {
        let mut end = len;
        let checksum = if mode.has_integrity() {
            let start = end
                .checked_sub(CHECKSUM_SIZE)
                .ok_or_else(|| TesseraError::truncated(CHECKSUM_SIZE as u64, len as u64))?;
            end = start;
            Some(start..start + CHECKSUM_SIZE)
        } else {
            None
        };
        let version = if mode.has_version() {
            let start = end.checked_sub(VERSION_TRAILER_SIZE).ok_or_else(|| {
                TesseraError::truncated(trailer_len(mode) as u64, len as u64)
            })?;
            end = start;
            Some(start..start + VERSION_TRAILER_SIZE)
        } else {
            None
        };
        Ok(Self {
            payload: 0..end,
            version,
            checksum,
        })
    }
}

/// Total trailer size for `mode`.
pub const fn trailer_len(mode: Mode) -> usize {
    let mut len = 0;
    if mode.has_version() {
        len += VERSION_TRAILER_SIZE;
    }
    if mode.has_integrity() {
        len += CHECKSUM_SIZE;
    }
    len
}

pub(crate) fn read_u64(bytes: &[u8], at: usize) -> Result<u64> {
    bytes
        .get(at..at + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| TesseraError::truncated((at + 8) as u64, bytes.len() as u64))
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| TesseraError::truncated((at + 4) as u64, bytes.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_bytes_are_stable() {
        let trailer = VersionTrailer::new(0x0102_0304_0506_0708, 3);
        let bytes = trailer.to_bytes();
        assert_eq!(bytes[0], 0x08);
        assert_eq!(&bytes[8..12], &FORMAT_VERSION.to_le_bytes());
        assert_eq!(VersionTrailer::from_bytes(&bytes).ok(), Some(trailer));
    }

    #[test]
    fn sections_follow_the_mode() -> Result<()> {
        let s = Sections::locate(64, Mode::WITH_VERSION | Mode::WITH_INTEGRITY)?;
        assert_eq!(s.payload, 0..40);
        assert_eq!(s.version, Some(40..56));
        assert_eq!(s.checksum, Some(56..64));

        let s = Sections::locate(10, Mode::NONE)?;
        assert_eq!(s.payload, 0..10);
        assert!(s.version.is_none() && s.checksum.is_none());

        assert!(Sections::locate(12, Mode::WITH_VERSION | Mode::WITH_INTEGRITY).is_err());
        Ok(())
    }
}
