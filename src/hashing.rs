//! Stable, platform-independent hashing.
//!
//! Archived hash tables are laid out at serialize time and probed at load time,
//! possibly on another machine, so the hash function must not depend on the process
//! (no random seeds), the word size, or the host byte order. [`FnvHasher`] is a
//! `std::hash::Hasher` with those properties: FNV-1a over little-endian bytes,
//! starting from [`BASE_HASH`].
//!
//! Any type deriving `Hash` hashes its fields in declaration order through this
//! hasher, which is what makes hashing "automatic" for user structs.

use std::hash::{BuildHasher, Hash, Hasher};

/// FNV-1a 64-bit offset basis; the hash of empty input.
pub const BASE_HASH: u64 = 14_695_981_039_346_656_037;

const FNV_PRIME: u64 = 1_099_511_628_211;

/// Folds `bytes` into `seed` with FNV-1a.
pub fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
    bytes
        .iter()
        .fold(seed, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Mixes `value` into `seed`; order sensitive.
pub fn hash_combine(seed: u64, value: u64) -> u64 {
    hash_bytes(&value.to_le_bytes(), seed)
}

/// Hashes `value` with a fresh [`FnvHasher`].
pub fn hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = FnvHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// FNV-1a hasher with fixed-width, little-endian integer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FnvHasher(u64);

impl FnvHasher {
    /// Starts from an explicit seed instead of [`BASE_HASH`].
    pub fn with_seed(seed: u64) -> Self {
        Self(seed)
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self(BASE_HASH)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0 = hash_bytes(bytes, self.0);
    }

    fn write_u16(&mut self, i: u16) {
        self.write(&i.to_le_bytes());
    }

    fn write_u32(&mut self, i: u32) {
        self.write(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.write(&i.to_le_bytes());
    }

    fn write_u128(&mut self, i: u128) {
        self.write(&i.to_le_bytes());
    }

    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    fn write_i16(&mut self, i: i16) {
        self.write_u16(i as u16);
    }

    fn write_i32(&mut self, i: i32) {
        self.write_u32(i as u32);
    }

    fn write_i64(&mut self, i: i64) {
        self.write_u64(i as u64);
    }

    fn write_isize(&mut self, i: isize) {
        self.write_u64(i as u64);
    }
}

/// `BuildHasher` producing [`FnvHasher`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFnvHasher;

impl BuildHasher for BuildFnvHasher {
    type Hasher = FnvHasher;

    fn build_hasher(&self) -> FnvHasher {
        FnvHasher::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_base_hash() {
        assert_eq!(hash_bytes(&[], BASE_HASH), BASE_HASH);
        assert_eq!(FnvHasher::default().finish(), BASE_HASH);
    }

    #[test]
    fn derived_hash_folds_fields_in_order() {
        #[derive(Hash)]
        struct Key {
            code: u32,
            text: &'static [u8],
        }

        let mut manual = FnvHasher::default();
        manual.write_u32(3);
        [b'4', b'3', b'2', b'1'].as_slice().hash(&mut manual);

        assert_eq!(hash(&Key { code: 3, text: b"4321" }), manual.finish());
    }

    #[test]
    fn combine_is_order_sensitive() {
        let a = hash_combine(hash_combine(BASE_HASH, 1), 2);
        let b = hash_combine(hash_combine(BASE_HASH, 2), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn integer_widths_are_host_independent() {
        let mut a = FnvHasher::default();
        a.write_usize(7);
        let mut b = FnvHasher::default();
        b.write_u64(7);
        assert_eq!(a.finish(), b.finish());
    }
}
