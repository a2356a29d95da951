//! An 8-byte aligned, growable byte buffer.
//!
//! Archived values are read in place, so the buffer they live in must be at least as
//! aligned as the most aligned archived scalar. `Vec<u8>` only promises byte
//! alignment; [`ByteBuf`] stores its bytes in `u64` words instead.

use std::fmt;
use std::ops::{Deref, DerefMut};

const WORD: usize = std::mem::size_of::<u64>();

/// Growable byte buffer whose start is aligned to [`crate::format::ARCHIVE_ALIGN`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteBuf {
    words: Vec<u64>,
    len: usize,
}

impl ByteBuf {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity.div_ceil(WORD)),
            len: 0,
        }
    }

    /// Copies `bytes` into a fresh aligned buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::with_capacity(bytes.len());
        buf.extend_from_slice(bytes);
        buf
    }

    /// Number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resizes to `new_len`, zero-filling any new bytes.
    pub fn resize_zeroed(&mut self, new_len: usize) {
        if new_len < self.len {
            self.truncate(new_len);
            return;
        }
        self.words.resize(new_len.div_ceil(WORD), 0);
        self.len = new_len;
    }

    /// Shortens the buffer to `len` bytes. Bytes past `len` are zeroed so a later
    /// growth reads zeros again.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let old = self.len;
        self.as_mut_slice()[len..old].fill(0);
        self.len = len;
        self.words.truncate(len.div_ceil(WORD));
    }

    /// Appends `bytes`.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let start = self.len;
        self.resize_zeroed(start + bytes.len());
        self.as_mut_slice()[start..].copy_from_slice(bytes);
    }

    /// Removes all bytes.
    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    /// The buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `words` holds at least `len` initialized bytes and u64 has no
        // padding; u8 has weaker alignment than u64.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    /// The buffer contents, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`, with exclusive access through `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    /// Copies the contents into a plain `Vec<u8>`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Deref for ByteBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for ByteBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for ByteBuf {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for ByteBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuf").field("len", &self.len).finish()
    }
}

impl From<&[u8]> for ByteBuf {
    fn from(bytes: &[u8]) -> Self {
        Self::from_slice(bytes)
    }
}
