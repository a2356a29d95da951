//! The container library.
//!
//! Each owned container has a fixed-layout archived counterpart that is read in place
//! from archive bytes:
//!
//! | owned                      | archived                     |
//! |----------------------------|------------------------------|
//! | `Vec<T>`, `Box<[T]>`       | [`ArchivedVec`]              |
//! | `String`, [`BasicString`]  | [`ArchivedString`], [`ArchivedBasicString`] |
//! | [`HashMap`], [`HashSet`]   | [`ArchivedHashMap`], [`ArchivedHashSet`] |
//! | [`Bitset`], `[T; N]`       | itself, `[T::Archived; N]`   |
//! | tuples                     | [`ArchivedTuple1`] .. [`ArchivedTuple6`] |
//! | `Option<T>`                | [`ArchivedOption`]           |
//! | `Box<T>`, `Rc<T>`, `Arc<T>`| [`ArchivedBox`], [`ArchivedRc`] |
//! | [`crate::Ptr`]             | [`ArchivedPtr`]              |
//! | [`VecVec`], [`MutableMultimap`] | [`ArchivedVecVec`]      |
//! | [`PagedVecVec`]            | [`ArchivedPagedVecVec`]      |

pub mod bitset;
pub mod boxed;
pub mod hash_map;
pub mod multimap;
pub mod option;
pub mod string;
pub mod tuple;
pub mod vec;
pub mod vecvec;

pub use bitset::{blocks_for, Bitset};
pub use boxed::{ArchivedBox, ArchivedPtr, ArchivedRc};
pub use hash_map::{ArchivedHashMap, ArchivedHashSet, CursorMut, Entry, HashMap, HashSet};
pub use multimap::{Bucket, BucketMut, MutableMultimap};
pub use option::ArchivedOption;
pub use string::{
    ArchivedBasicString, ArchivedString, BasicString, ByteString, CharUnit, Needle, U16String,
    U32String,
};
pub use tuple::{
    ArchivedTuple1, ArchivedTuple2, ArchivedTuple3, ArchivedTuple4, ArchivedTuple5,
    ArchivedTuple6,
};
pub use vec::ArchivedVec;
pub use vecvec::{
    ArchivedPagedVecVec, ArchivedVecVec, Page, PagedRowMut, PagedVecVec, RowMut, VecVec,
};
