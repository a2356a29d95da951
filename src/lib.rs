//! # Tessera
//!
//! Zero-copy, relocatable binary archives for Rust object graphs.
//!
//! ## Overview
//!
//! Tessera writes a typed object graph into one contiguous byte buffer whose layout
//! *is* the in-memory representation of an archived view type. Reading an archive
//! does not parse or allocate: after validation the bytes are reinterpreted as
//! `&T::Archived`, directly from a `Vec`, a memory-mapped file, or any other byte
//! slice.
//!
//! ### Key Features
//!
//! *   **Relocatable:** every internal reference is a [`RelPtr`], a signed displacement
//!     from its own address, so an archive can be moved, mapped at any address, or sent
//!     over the wire unchanged.
//! *   **Object graphs, not trees:** shared (`Rc`/`Arc`) values are written once, and
//!     process-local [`Ptr`] edges (including cycles) are rewritten to point at the
//!     archived copy of their target.
//! *   **Safe loading of untrusted bytes:** [`deserialize`] checks every pointer,
//!     length, tag, `bool`, `char` and UTF-8 string against the buffer before handing
//!     out a view. Optional trailers add a type fingerprint, a schema version and an
//!     XxHash64 checksum.
//! *   **A container library with archived twins:** SSO strings in three widths, an
//!     open-addressing hash map and set, bitsets, row stores and a multimap, each with a
//!     fixed-layout archived form.
//! *   **Derives:** `#[derive(Archive)]` for structs and enums, `#[derive(Reflect)]`
//!     for field-level reflection.
//!
//! ## Architecture
//!
//! ### Owned and archived types
//!
//! Every archivable type implements [`Archive`], which names its archived view
//! (`T::Archived`, always `#[repr(C)]`) and knows how to write it. View types
//! implement [`Verify`], which knows how to check and byte-swap a view sitting in
//! untrusted memory.
//!
//! ### Buffer layout
//!
//! ```text
//! [ Root ] [ Overflow ... ] [ pad to 8 ] [ Version Trailer ]? [ Checksum ]?
//! ```
//!
//! The root sits at offset 0. Out-of-line data follows in first-write order. The
//! trailers are controlled by [`Mode`] flags, which must match between writing and
//! reading.
//!
//! ## Usage
//!
//! ```rust
//! use tessera::{deserialize, serialize, Archive, Mode};
//!
//! #[derive(Archive)]
//! struct Player {
//!     name: String,
//!     scores: Vec<u32>,
//!     guild: Option<Box<String>>,
//! }
//!
//! let player = Player {
//!     name: "ferris".into(),
//!     scores: vec![10, 20, 30],
//!     guild: None,
//! };
//!
//! let mode = Mode::WITH_VERSION | Mode::WITH_INTEGRITY;
//! let bytes = serialize(&player, mode)?;
//! let view = deserialize::<Player>(&bytes, mode)?;
//! assert_eq!(view.name, "ferris");
//! assert_eq!(view.scores, [10, 20, 30]);
//! assert!(view.guild.is_none());
//! # Ok::<(), tessera::TesseraError>(())
//! ```
//!
//! ## Custom archiving
//!
//! Implementing [`Archive`] (and [`Verify`] for a custom view) by hand replaces the
//! derived behavior entirely; the engine calls only the trait methods.

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate self as tessera;

// --- PUBLIC API MODULES ---
pub mod api;
pub mod archive;
pub mod atomic;
pub mod bits;
pub mod buf;
pub mod containers;
pub mod de;
pub mod error;
pub mod fingerprint;
pub mod format;
pub mod hashing;
pub mod inspector;
pub mod io;
pub mod mode;
pub mod ptr;
pub mod reader;
pub mod reflect;
pub mod ser;
pub mod strong;
pub mod variant;

// Private modules
mod impls;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
#[doc(hidden)]
pub mod rt;

// --- RE-EXPORTS ---

pub use api::{Tessera, TesseraBuilder};
pub use archive::{Archive, Verify};
pub use buf::ByteBuf;
pub use containers::{
    blocks_for, ArchivedBasicString, ArchivedBox, ArchivedHashMap, ArchivedHashSet,
    ArchivedOption, ArchivedPagedVecVec, ArchivedPtr, ArchivedRc, ArchivedString,
    ArchivedTuple1, ArchivedTuple2, ArchivedTuple3, ArchivedTuple4, ArchivedTuple5,
    ArchivedTuple6, ArchivedVec, ArchivedVecVec, BasicString, Bitset, Bucket, ByteString,
    HashMap, HashSet, MutableMultimap, PagedVecVec, U16String, U32String, VecVec,
};
pub use de::{deserialize, deserialize_mut, unchecked_deserialize};
pub use error::{Result, TesseraError};
pub use fingerprint::fingerprint;
pub use inspector::{ArchiveInspector, ArchiveReport};
pub use io::{FileTarget, MmapTarget, Target};
pub use mode::Mode;
pub use ptr::{Pointer, Ptr, RelPtr};
pub use reader::ArchiveReader;
pub use reflect::{FieldVisitor, FieldVisitorMut, Reflect};
pub use ser::{serialize, serialize_into, Written};
pub use strong::{RowKey, Strong};
pub use variant::Variant;

// Re-export the derive macros so they are accessible as `tessera::Archive` and
// `tessera::Reflect` next to the traits of the same name.
pub use tessera_derive::{Archive, Reflect};
