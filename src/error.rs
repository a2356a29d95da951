//! Centralized error handling for tessera.
//!
//! Every fallible operation in the crate returns [`Result`], and no code path in the
//! library panics on malformed input. Archive validation failures are reported
//! before any view into the buffer is handed out, so a caller either receives a fully
//! verified view or an error, never a partially valid one.
//!
//! ## Error Categories
//!
//! - **Layout errors** ([`TesseraError::TruncatedBuffer`], [`TesseraError::Misaligned`]):
//!   the supplied byte range cannot contain what the archive claims to hold.
//! - **Compatibility errors** ([`TesseraError::VersionMismatch`],
//!   [`TesseraError::IntegrityMismatch`]): the archive was written for a different
//!   schema or has been corrupted.
//! - **Content errors** ([`TesseraError::InvalidData`], [`TesseraError::NullDereference`]):
//!   a value inside the archive is not a legal bit pattern for its type.
//! - **Serialization errors** ([`TesseraError::DanglingPointer`],
//!   [`TesseraError::Overflow`], [`TesseraError::CycleOverflow`]).
//! - **Container errors** ([`TesseraError::InvalidGrow`]).
//! - **I/O errors** ([`TesseraError::Io`]): storage target failures.
//!
//! ## Usage
//!
//! ```rust
//! use tessera::{Mode, TesseraError};
//!
//! let bytes = tessera::serialize(&vec![1u32, 2, 3], Mode::WITH_INTEGRITY)?;
//! let truncated = &bytes[..bytes.len() - 1];
//!
//! match tessera::deserialize::<Vec<u32>>(truncated, Mode::WITH_INTEGRITY) {
//!     Err(TesseraError::IntegrityMismatch { .. }) | Err(TesseraError::TruncatedBuffer { .. }) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! # Ok::<(), tessera::TesseraError>(())
//! ```

use std::io;
use std::sync::Arc;

/// A specialized `Result` type for tessera operations.
pub type Result<T> = std::result::Result<T, TesseraError>;

/// The master error enum covering all failure domains in tessera.
///
/// The type is `Clone` so errors can be stored or shared across threads; I/O errors
/// are wrapped in an `Arc` for that reason.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TesseraError {
    /// A read would exceed the supplied byte range.
    ///
    /// Raised when the root does not fit, when a relative pointer or length points
    /// past the end of the payload, or when a trailer is missing.
    #[error("truncated buffer: needed {needed} bytes, {available} available")]
    TruncatedBuffer {
        /// Bytes required by the failing read.
        needed: u64,
        /// Bytes actually available at that point.
        available: u64,
    },

    /// The archive format or schema version differs from what the reader expects.
    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version the reader was built for.
        expected: u64,
        /// Version stored in the archive.
        found: u64,
    },

    /// The checksum or the type fingerprint stored in the archive disagrees with the
    /// recomputed value.
    #[error("{what} mismatch: expected {expected:#018x}, found {found:#018x}")]
    IntegrityMismatch {
        /// Which check failed (`"checksum"` or `"fingerprint"`).
        what: &'static str,
        /// Recomputed value.
        expected: u64,
        /// Value stored in the archive.
        found: u64,
    },

    /// A null pointer was dereferenced, or a non-nullable archived pointer was null.
    #[error("null pointer dereference")]
    NullDereference,

    /// A row-store bucket was asked to grow in a way its layout does not allow.
    #[error("invalid grow: row holds {len} elements, requested {requested}")]
    InvalidGrow {
        /// Current row length.
        len: u64,
        /// Requested row length.
        requested: u64,
    },

    /// Type fingerprint expansion exceeded the recursion guard.
    #[error("type fingerprint recursion exceeded depth {depth}")]
    CycleOverflow {
        /// Depth at which expansion was aborted.
        depth: usize,
    },

    /// The archive start is not aligned for the archived root type.
    #[error("archive start is not aligned to {align} bytes")]
    Misaligned {
        /// Required alignment.
        align: usize,
    },

    /// A value inside the archive is not a valid bit pattern for its type
    /// (bad `bool`, `char`, variant tag, UTF-8, or byte order).
    #[error("invalid archive data: {0}")]
    InvalidData(String),

    /// A process-local pointer referenced an object that was never serialized.
    #[error("dangling pointer: target at {address:#x} was never serialized")]
    DanglingPointer {
        /// Source address of the missing target.
        address: usize,
    },

    /// A length or offset does not fit into its archived width.
    #[error("overflow: {0}")]
    Overflow(String),

    /// Low-level I/O failure in a storage target.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),
}

impl From<io::Error> for TesseraError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl TesseraError {
    pub(crate) fn truncated(needed: u64, available: u64) -> Self {
        Self::TruncatedBuffer { needed, available }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}
