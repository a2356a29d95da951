//! Storage targets the serializer writes through.
//!
//! The serializer only appends (with alignment padding) and patches bytes it has
//! already appended, so any medium that can do both is a valid target. Positions are
//! absolute byte offsets into the target; they stay valid across growth of the
//! underlying storage.

use crate::buf::ByteBuf;
use crate::error::{Result, TesseraError};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::hash::Hasher;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use twox_hash::XxHash64;

const ZEROS: [u8; 4096] = [0; 4096];

/// A byte sink for archives.
pub trait Target {
    /// Appends `bytes` after zero padding up to `align`, returning the start position.
    fn write(&mut self, bytes: &[u8], align: usize) -> Result<u64>;

    /// Overwrites previously written bytes at `pos`.
    fn write_at(&mut self, pos: u64, bytes: &[u8]) -> Result<()>;

    /// Current length in bytes.
    fn size(&self) -> u64;

    /// XxHash64 (seed 0) of the bytes in `[from, size)`.
    fn checksum(&mut self, from: u64) -> Result<u64>;

    /// Appends `len` zero bytes after padding to `align`, returning the start position.
    fn write_zeroed(&mut self, len: usize, align: usize) -> Result<u64> {
        let start = self.write(&[], align)?;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(ZEROS.len());
            self.write(&ZEROS[..n], 1)?;
            remaining -= n;
        }
        Ok(start)
    }

    /// Pushes buffered bytes to the backing medium.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Target + ?Sized> Target for &mut T {
    fn write(&mut self, bytes: &[u8], align: usize) -> Result<u64> {
        (**self).write(bytes, align)
    }

    fn write_at(&mut self, pos: u64, bytes: &[u8]) -> Result<()> {
        (**self).write_at(pos, bytes)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn checksum(&mut self, from: u64) -> Result<u64> {
        (**self).checksum(from)
    }

    fn write_zeroed(&mut self, len: usize, align: usize) -> Result<u64> {
        (**self).write_zeroed(len, align)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Bytes of padding needed to bring `pos` up to `align` (a power of two).
pub fn padding_for(pos: u64, align: usize) -> u64 {
    let align = align.max(1) as u64;
    (align - pos % align) % align
}

fn position(pos: u64) -> Result<usize> {
    usize::try_from(pos).map_err(|_| TesseraError::Overflow(format!("position {pos}")))
}

pub(crate) fn xxhash(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}

impl Target for ByteBuf {
    fn write(&mut self, bytes: &[u8], align: usize) -> Result<u64> {
        let start = self.len() + padding_for(self.len() as u64, align) as usize;
        self.resize_zeroed(start);
        self.extend_from_slice(bytes);
        Ok(start as u64)
    }

    fn write_zeroed(&mut self, len: usize, align: usize) -> Result<u64> {
        let start = self.len() + padding_for(self.len() as u64, align) as usize;
        self.resize_zeroed(start + len);
        Ok(start as u64)
    }

    fn write_at(&mut self, pos: u64, bytes: &[u8]) -> Result<()> {
        let start = position(pos)?;
        let available = self.len() as u64;
        let dst = self
            .get_mut(start..start + bytes.len())
            .ok_or_else(|| TesseraError::truncated(pos + bytes.len() as u64, available))?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn checksum(&mut self, from: u64) -> Result<u64> {
        let start = position(from)?;
        let available = self.len() as u64;
        let bytes = self
            .get(start..)
            .ok_or_else(|| TesseraError::truncated(from, available))?;
        Ok(xxhash(bytes))
    }
}

/// Writes an archive to a plain file.
///
/// The most recent bytes are staged in memory, where the serializer's patches land
/// without touching the file. The stage is spilled once it reaches
/// [`FileTarget::SPILL_THRESHOLD`]; only patches to spilled bytes seek.
#[derive(Debug)]
pub struct FileTarget {
    file: File,
    stage: Vec<u8>,
    spilled: u64,
}

impl FileTarget {
    /// Staged bytes that trigger a write to the file.
    pub const SPILL_THRESHOLD: usize = 1 << 20;

    /// Creates (or truncates) the file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            stage: Vec::new(),
            spilled: 0,
        })
    }

    /// Flushes and returns the underlying file.
    pub fn into_file(mut self) -> Result<File> {
        self.spill()?;
        self.file.flush()?;
        Ok(self.file)
    }

    /// Writes the staged bytes out. The file cursor always rests at `spilled`.
    fn spill(&mut self) -> Result<()> {
        if self.stage.is_empty() {
            return Ok(());
        }
        self.file.write_all(&self.stage)?;
        self.spilled += self.stage.len() as u64;
        self.stage.clear();
        Ok(())
    }
}

impl Target for FileTarget {
    fn write(&mut self, bytes: &[u8], align: usize) -> Result<u64> {
        let pad = padding_for(self.size(), align) as usize;
        self.stage.resize(self.stage.len() + pad, 0);
        let start = self.size();
        self.stage.extend_from_slice(bytes);
        if self.stage.len() >= Self::SPILL_THRESHOLD {
            self.spill()?;
        }
        Ok(start)
    }

    fn write_zeroed(&mut self, len: usize, align: usize) -> Result<u64> {
        let start = self.write(&[], align)?;
        self.stage.resize(self.stage.len() + len, 0);
        if self.stage.len() >= Self::SPILL_THRESHOLD {
            self.spill()?;
        }
        Ok(start)
    }

    fn write_at(&mut self, pos: u64, bytes: &[u8]) -> Result<()> {
        let end = pos + bytes.len() as u64;
        if end > self.size() {
            return Err(TesseraError::truncated(end, self.size()));
        }
        let (on_disk, staged) = if pos < self.spilled {
            bytes.split_at(bytes.len().min((self.spilled - pos) as usize))
        } else {
            (&[][..], bytes)
        };
        if !on_disk.is_empty() {
            self.file.seek(SeekFrom::Start(pos))?;
            self.file.write_all(on_disk)?;
            self.file.seek(SeekFrom::Start(self.spilled))?;
        }
        if !staged.is_empty() {
            let at = (pos + on_disk.len() as u64 - self.spilled) as usize;
            self.stage[at..at + staged.len()].copy_from_slice(staged);
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.spilled + self.stage.len() as u64
    }

    fn checksum(&mut self, from: u64) -> Result<u64> {
        self.spill()?;
        let len = self.spilled.saturating_sub(from);
        let mut hasher = XxHash64::with_seed(0);
        self.file.seek(SeekFrom::Start(from))?;
        {
            let mut reader = BufReader::new(&self.file).take(len);
            let mut chunk = [0u8; 8192];
            loop {
                let n = reader.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                hasher.write(&chunk[..n]);
            }
        }
        self.file.seek(SeekFrom::Start(self.spilled))?;
        Ok(hasher.finish())
    }

    fn flush(&mut self) -> Result<()> {
        self.spill()?;
        self.file.flush()?;
        Ok(())
    }
}

/// Writes an archive into a growable memory-mapped file.
///
/// The file is grown by doubling and remapped; [`MmapTarget::finish`] truncates it to
/// the written length.
#[derive(Debug)]
pub struct MmapTarget {
    file: File,
    map: MmapMut,
    size: u64,
}

impl MmapTarget {
    const INITIAL_CAPACITY: u64 = 64 * 1024;

    /// Creates (or truncates) the file at `path` and maps it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(Self::INITIAL_CAPACITY)?;
        // SAFETY: the file was just created by us and is not shared; the map is
        // dropped before the file is truncated or closed.
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { file, map, size: 0 })
    }

    fn reserve(&mut self, needed: u64) -> Result<()> {
        if needed <= self.map.len() as u64 {
            return Ok(());
        }
        let mut capacity = (self.map.len() as u64).max(Self::INITIAL_CAPACITY);
        while capacity < needed {
            capacity = capacity.saturating_mul(2);
        }
        self.map.flush()?;
        self.file.set_len(capacity)?;
        // SAFETY: see `create`; the old map is replaced before any further access.
        self.map = unsafe { MmapMut::map_mut(&self.file)? };
        tracing::trace!(capacity, "mmap target grown");
        Ok(())
    }

    /// The bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.map[..self.size as usize]
    }

    /// Flushes the map and truncates the file to the written length.
    pub fn finish(self) -> Result<File> {
        self.map.flush()?;
        drop(self.map);
        self.file.set_len(self.size)?;
        Ok(self.file)
    }
}

impl Target for MmapTarget {
    fn write(&mut self, bytes: &[u8], align: usize) -> Result<u64> {
        let start = self.size + padding_for(self.size, align);
        let end = start + bytes.len() as u64;
        self.reserve(end)?;
        let (s, e) = (position(start)?, position(end)?);
        self.map[self.size as usize..s].fill(0);
        self.map[s..e].copy_from_slice(bytes);
        self.size = end;
        Ok(start)
    }

    fn write_zeroed(&mut self, len: usize, align: usize) -> Result<u64> {
        let start = self.size + padding_for(self.size, align);
        let end = start + len as u64;
        self.reserve(end)?;
        let (s, e) = (position(self.size)?, position(end)?);
        self.map[s..e].fill(0);
        self.size = end;
        Ok(start)
    }

    fn write_at(&mut self, pos: u64, bytes: &[u8]) -> Result<()> {
        let start = position(pos)?;
        let size = self.size;
        let dst = self
            .map
            .get_mut(start..start + bytes.len())
            .filter(|_| pos + bytes.len() as u64 <= size)
            .ok_or_else(|| TesseraError::truncated(pos + bytes.len() as u64, size))?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn checksum(&mut self, from: u64) -> Result<u64> {
        let start = position(from)?;
        let bytes = self
            .as_slice()
            .get(start..)
            .ok_or_else(|| TesseraError::truncated(from, self.size))?;
        Ok(xxhash(bytes))
    }

    fn flush(&mut self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }
}
