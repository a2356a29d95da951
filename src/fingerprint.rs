//! Structural type fingerprints.
//!
//! A fingerprint hashes the *shape* of a type: kind tags, field counts and field
//! fingerprints in declaration order. Names and module paths do not take part, so two
//! structurally identical types fingerprint equally wherever they are declared.
//!
//! Recursive types are cut at the first repetition: a type already being expanded
//! contributes `("cycle", position on the stack)` instead of its fields.

use crate::archive::Archive;
use crate::error::{Result, TesseraError};
use crate::hashing::{hash_bytes, hash_combine, BASE_HASH};
use std::any::TypeId;

/// Expansion depth at which fingerprinting gives up with `CycleOverflow`.
pub const MAX_FINGERPRINT_DEPTH: usize = 256;

/// Accumulates a fingerprint while walking a type's structure.
#[derive(Debug, Clone)]
pub struct TypeHasher {
    state: u64,
    stack: Vec<TypeId>,
}

impl Default for TypeHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeHasher {
    /// A hasher in its initial state.
    pub fn new() -> Self {
        Self {
            state: BASE_HASH,
            stack: Vec::new(),
        }
    }

    /// Mixes in a kind tag such as `"struct"` or `"u32"`.
    pub fn write_tag(&mut self, tag: &str) {
        self.state = hash_combine(hash_bytes(tag.as_bytes(), self.state), tag.len() as u64);
    }

    /// Mixes in a number (a field count, an array length).
    pub fn write_u64(&mut self, value: u64) {
        self.state = hash_combine(self.state, value);
    }

    /// Mixes in the fingerprint of `T`, cutting cycles.
    pub fn visit<T: Archive>(&mut self) -> Result<()> {
        let id = TypeId::of::<T>();
        if let Some(index) = self.stack.iter().position(|t| *t == id) {
            self.write_tag("cycle");
            self.write_u64(index as u64);
            return Ok(());
        }
        if self.stack.len() >= MAX_FINGERPRINT_DEPTH {
            return Err(TesseraError::CycleOverflow {
                depth: self.stack.len(),
            });
        }
        self.stack.push(id);
        let res = T::fingerprint(self);
        self.stack.pop();
        res
    }

    /// The fingerprint accumulated so far.
    pub fn finish(&self) -> u64 {
        self.state
    }
}

/// Fingerprint of `T`.
pub fn fingerprint<T: Archive>() -> Result<u64> {
    let mut hasher = TypeHasher::new();
    hasher.visit::<T>()?;
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_differ() -> Result<()> {
        assert_ne!(fingerprint::<u32>()?, fingerprint::<i32>()?);
        assert_ne!(fingerprint::<u32>()?, fingerprint::<f32>()?);
        assert_eq!(fingerprint::<u64>()?, fingerprint::<u64>()?);
        Ok(())
    }

    #[test]
    fn nesting_changes_the_fingerprint() -> Result<()> {
        assert_ne!(fingerprint::<Vec<u8>>()?, fingerprint::<Vec<Vec<u8>>>()?);
        assert_ne!(fingerprint::<(u8, u16)>()?, fingerprint::<(u16, u8)>()?);
        Ok(())
    }

    #[test]
    fn tag_boundaries_are_unambiguous() {
        let mut a = TypeHasher::new();
        a.write_tag("ab");
        a.write_tag("c");
        let mut b = TypeHasher::new();
        b.write_tag("a");
        b.write_tag("bc");
        assert_ne!(a.finish(), b.finish());
    }
}
