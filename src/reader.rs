//! The read side for archive files.
//!
//! [`ArchiveReader`] memory-maps a file once and hands out validated views into the
//! mapping. Nothing is copied: a view borrows the reader, so the mapping outlives
//! every reference into it.

use crate::archive::Archive;
use crate::de::deserialize;
use crate::error::{Result, TesseraError};
use crate::mode::Mode;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// A memory-mapped archive file.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    mmap: Arc<Mmap>,
    mode: Mode,
}

impl ArchiveReader {
    /// Maps the archive at `path`, read with [`Mode::NONE`] unless changed with
    /// [`ArchiveReader::with_mode`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size == 0 {
            return Err(TesseraError::truncated(1, 0));
        }

        // SAFETY: the mapping is read-only; concurrent modification of the file by
        // another process is outside what this crate can guard against.
        let mmap = unsafe { Mmap::map(&file)? };
        tracing::debug!(path = %path.display(), size = file_size, "archive mapped");
        Ok(Self {
            mmap: Arc::new(mmap),
            mode: Mode::NONE,
        })
    }

    /// Sets the mode the file was written with.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// The mode used by [`ArchiveReader::access`].
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The mapped bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Size of the mapped file.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// True if the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Validates the file as an archive of `T` and returns the root view.
    ///
    /// Validation runs on every call; keep the returned reference around instead of
    /// calling this repeatedly.
    pub fn access<T: Archive>(&self) -> Result<&T::Archived> {
        deserialize::<T>(&self.mmap, self.mode).map_err(|err| {
            tracing::warn!(
                error = %err,
                size = self.mmap.len(),
                mode = %self.mode,
                "archive rejected"
            );
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FileTarget;
    use crate::ser::serialize_into;

    #[test]
    fn mapped_file_reads_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("values.tsr");
        let mode = Mode::WITH_VERSION | Mode::WITH_INTEGRITY;
        let mut target = FileTarget::create(&path)?;
        serialize_into(&mut target, &vec![1u32, 2, 3], mode)?;
        target.into_file()?;

        let reader = ArchiveReader::open(&path)?.with_mode(mode);
        assert_eq!(*reader.access::<Vec<u32>>()?, vec![1u32, 2, 3]);
        assert!(reader.access::<Vec<u64>>().is_err());
        Ok(())
    }

    #[test]
    fn empty_file_is_truncated() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        assert!(matches!(
            ArchiveReader::open(file.path()),
            Err(TesseraError::TruncatedBuffer { .. })
        ));
        Ok(())
    }
}
