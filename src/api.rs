//! The high-level entry point.
//!
//! [`Tessera`] bundles the engine calls behind one type, and [`TesseraBuilder`]
//! collects the [`Mode`] flags fluently:
//!
//! ```
//! use tessera::Tessera;
//!
//! let bytes = Tessera::builder()
//!     .with_version()
//!     .with_integrity()
//!     .to_bytes(&vec![1u64, 2, 3])?;
//! let view = Tessera::builder()
//!     .with_version()
//!     .with_integrity()
//!     .read::<Vec<u64>>(&bytes)?;
//! assert_eq!(view.as_slice(), &[1, 2, 3]);
//! # Ok::<(), tessera::TesseraError>(())
//! ```

use crate::archive::Archive;
use crate::buf::ByteBuf;
use crate::de::{deserialize, deserialize_mut};
use crate::error::Result;
use crate::io::{FileTarget, Target};
use crate::mode::Mode;
use crate::reader::ArchiveReader;
use crate::ser::{serialize, serialize_into, Written};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The main entry point; every call uses [`Mode::NONE`]. Use
/// [`Tessera::builder`] for other modes.
#[derive(Debug)]
pub struct Tessera;

impl Tessera {
    /// Archives `value` into a fresh buffer.
    pub fn to_bytes<T: Archive>(value: &T) -> Result<ByteBuf> {
        TesseraBuilder::default().to_bytes(value)
    }

    /// Archives `value` into a new file at `path`.
    pub fn save<T: Archive, P: AsRef<Path>>(path: P, value: &T) -> Result<Written> {
        TesseraBuilder::default().save(path, value)
    }

    /// Archives `value` into `target`.
    pub fn write<T: Archive, W: Target + ?Sized>(target: &mut W, value: &T) -> Result<Written> {
        TesseraBuilder::default().write(target, value)
    }

    /// Memory-maps the archive file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ArchiveReader> {
        TesseraBuilder::default().open(path)
    }

    /// A builder to configure the mode.
    pub fn builder() -> TesseraBuilder {
        TesseraBuilder::default()
    }
}

/// Mode configuration for the [`Tessera`] calls.
///
/// Serializable so the mode can live in an application's own config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesseraBuilder {
    mode: Mode,
}

impl TesseraBuilder {
    /// Replaces the mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Adds [`Mode::WITH_VERSION`].
    #[must_use]
    pub fn with_version(self) -> Self {
        self.add(Mode::WITH_VERSION)
    }

    /// Adds [`Mode::WITH_INTEGRITY`].
    #[must_use]
    pub fn with_integrity(self) -> Self {
        self.add(Mode::WITH_INTEGRITY)
    }

    /// Adds [`Mode::DEEP_CHECK`].
    #[must_use]
    pub fn deep_check(self) -> Self {
        self.add(Mode::DEEP_CHECK)
    }

    /// Adds [`Mode::SERIALIZE_BIG_ENDIAN`].
    #[must_use]
    pub fn big_endian(self) -> Self {
        self.add(Mode::SERIALIZE_BIG_ENDIAN)
    }

    fn add(mut self, flags: Mode) -> Self {
        self.mode = self.mode.with(flags);
        self
    }

    /// The configured mode.
    pub fn build(self) -> Mode {
        self.mode
    }

    /// Archives `value` into a fresh buffer.
    pub fn to_bytes<T: Archive>(self, value: &T) -> Result<ByteBuf> {
        serialize(value, self.mode)
    }

    /// Archives `value` into a new file at `path`.
    pub fn save<T: Archive, P: AsRef<Path>>(self, path: P, value: &T) -> Result<Written> {
        let mut target = FileTarget::create(path)?;
        let written = serialize_into(&mut target, value, self.mode)?;
        target.into_file()?;
        Ok(written)
    }

    /// Archives `value` into `target`.
    pub fn write<T: Archive, W: Target + ?Sized>(
        self,
        target: &mut W,
        value: &T,
    ) -> Result<Written> {
        serialize_into(target, value, self.mode)
    }

    /// Validates `bytes` and returns the root view.
    pub fn read<T: Archive>(self, bytes: &[u8]) -> Result<&T::Archived> {
        deserialize::<T>(bytes, self.mode)
    }

    /// Like [`TesseraBuilder::read`], converting a foreign byte order in place.
    pub fn read_mut<T: Archive>(self, bytes: &mut [u8]) -> Result<&T::Archived> {
        deserialize_mut::<T>(bytes, self.mode)
    }

    /// Memory-maps the archive file at `path`.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<ArchiveReader> {
        Ok(ArchiveReader::open(path)?.with_mode(self.mode))
    }
}
