//! Mode flags controlling trailers, verification depth and byte order.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Orthogonal set of archive options.
    ///
    /// The same combination must be passed to the serialize and the deserialize call
    /// of a given buffer: trailers are located by the flags, not discovered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Mode: u32 {
        /// Append a version trailer (type fingerprint, format and schema version).
        const WITH_VERSION = 1 << 0;
        /// Append an XxHash64 checksum of every preceding archive byte.
        const WITH_INTEGRITY = 1 << 1;
        /// Verify container invariants on load in addition to bounds.
        const DEEP_CHECK = 1 << 2;
        /// Write scalars in big-endian order.
        const SERIALIZE_BIG_ENDIAN = 1 << 3;
    }
}

impl Mode {
    /// No trailers, host-independent little-endian layout.
    pub const NONE: Self = Self::empty();

    /// Returns `self` with the flags of `other` added.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        self.union(other)
    }

    /// Returns `self` with the flags of `other` removed.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        self.difference(other)
    }

    /// True if a version trailer is written/expected.
    pub const fn has_version(self) -> bool {
        self.contains(Self::WITH_VERSION)
    }

    /// True if a checksum trailer is written/expected.
    pub const fn has_integrity(self) -> bool {
        self.contains(Self::WITH_INTEGRITY)
    }

    /// True if container invariants are checked on load.
    pub const fn deep_check(self) -> bool {
        self.contains(Self::DEEP_CHECK)
    }

    /// True if scalars are stored big-endian.
    pub const fn is_big_endian(self) -> bool {
        self.contains(Self::SERIALIZE_BIG_ENDIAN)
    }

    /// True if the archive byte order differs from the host's.
    pub const fn needs_swap(self) -> bool {
        self.is_big_endian() != cfg!(target_endian = "big")
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_compose_independently() {
        let mode = Mode::WITH_VERSION | Mode::WITH_INTEGRITY;
        assert!(mode.has_version());
        assert!(mode.has_integrity());
        assert!(!mode.deep_check());
        assert_eq!(mode.without(Mode::WITH_VERSION), Mode::WITH_INTEGRITY);
        assert_eq!(Mode::from_bits(0b0101), Some(Mode::WITH_VERSION | Mode::DEEP_CHECK));
        assert_eq!(Mode::from_bits(0xFF), None);
        assert_eq!(Mode::from_bits_truncate(0xFF), Mode::all());
        assert_eq!(Mode::default(), Mode::NONE);
    }

    #[test]
    fn serde_keeps_the_bits() -> Result<(), Box<dyn std::error::Error>> {
        let config = bincode::config::standard();
        let mode = Mode::WITH_INTEGRITY | Mode::SERIALIZE_BIG_ENDIAN;
        let encoded = bincode::serde::encode_to_vec(mode, config)?;
        let (decoded, _): (Mode, usize) = bincode::serde::decode_from_slice(&encoded, config)?;
        assert_eq!(decoded, mode);
        Ok(())
    }

    #[test]
    fn display_lists_flag_names() {
        assert_eq!(Mode::NONE.to_string(), "NONE");
        assert_eq!(
            (Mode::DEEP_CHECK | Mode::WITH_VERSION).to_string(),
            "WITH_VERSION | DEEP_CHECK"
        );
    }

    #[test]
    fn little_endian_hosts_swap_only_big_endian_archives() {
        if cfg!(target_endian = "little") {
            assert!(!Mode::NONE.needs_swap());
            assert!(Mode::SERIALIZE_BIG_ENDIAN.needs_swap());
        }
    }
}
