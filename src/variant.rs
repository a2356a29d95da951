//! Tagged unions.
//!
//! Rust enums are the variant type. `#[derive(Archive)]` on an enum produces a
//! `#[repr(u32)]` archived enum whose tag is the declaration index of the variant,
//! and implements [`Variant`] for both the owned and the archived enum.

use crate::containers::ArchivedOption;

/// A value that is one of a fixed number of alternatives.
pub trait Variant {
    /// Number of alternatives.
    const VARIANT_COUNT: u32;

    /// Declaration index of the alternative held.
    fn variant_index(&self) -> u32;
}

impl<T> Variant for Option<T> {
    const VARIANT_COUNT: u32 = 2;

    fn variant_index(&self) -> u32 {
        u32::from(self.is_some())
    }
}

impl<T> Variant for ArchivedOption<T> {
    const VARIANT_COUNT: u32 = 2;

    fn variant_index(&self) -> u32 {
        u32::from(self.is_some())
    }
}
