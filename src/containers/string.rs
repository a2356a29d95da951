//! Strings with small-string optimization, in 8, 16 and 32-bit code units.
//!
//! [`BasicString`] keeps up to 15 bytes of units inline (15 bytes, 7 UTF-16 units or
//! 3 code points) and spills longer contents to the heap. The archived form,
//! [`ArchivedBasicString`], mirrors this in a fixed 16-byte slot:
//!
//! ```text
//! short: [ units (len * width bytes) ........ | 0x80 | len ]   byte 15
//! long:  [ RelPtr (8) | len u32 (4) | pad (3) | 0x00       ]   byte 15
//! ```
//!
//! A freshly constructed (or cleared) string is *long* and empty: it owns no storage
//! and is not short. `std::string::String` archives to [`ArchivedString`], the same
//! layout for UTF-8 with a checked `as_str`.

use crate::archive::{Archive, Scalar, Verify};
use crate::de::{EndianFixup, Validator};
use crate::error::{Result, TesseraError};
use crate::fingerprint::TypeHasher;
use crate::impls::archived_len;
use crate::io::Target;
use crate::ptr::RelPtr;
use crate::ser::Serializer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Bytes available for inline units.
pub const INLINE_BYTES: usize = 15;

const SHORT_FLAG: u8 = 0x80;
const LEN_MASK: u8 = 0x7f;
const FLAG_BYTE: usize = 15;
const LONG_LEN_OFFSET: usize = 8;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// A code unit type: `u8` (UTF-8), `u16` (UTF-16) or `u32` (UTF-32).
pub trait CharUnit:
    sealed::Sealed
    + Scalar
    + Archive<Archived = Self>
    + Verify
    + Default
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + Serialize
    + DeserializeOwned
{
    /// Fixed-size inline storage.
    type Inline: AsRef<[Self]> + AsMut<[Self]> + Copy + Default;

    /// Number of units that fit inline.
    const INLINE: usize;

    /// Kind tag used in fingerprints.
    const TAG: &'static str;

    /// Encodes `s` in this unit width.
    fn encode(s: &str) -> Cow<'_, [Self]>;

    /// Decodes units, replacing invalid sequences with U+FFFD.
    fn decode_lossy(units: &[Self]) -> String;

    /// Feeds the raw little-endian bytes of `units` to `state`.
    fn hash_units<H: Hasher>(units: &[Self], state: &mut H);
}

impl CharUnit for u8 {
    type Inline = [u8; 15];
    const INLINE: usize = 15;
    const TAG: &'static str = "string8";

    fn encode(s: &str) -> Cow<'_, [u8]> {
        Cow::Borrowed(s.as_bytes())
    }

    fn decode_lossy(units: &[u8]) -> String {
        String::from_utf8_lossy(units).into_owned()
    }

    fn hash_units<H: Hasher>(units: &[u8], state: &mut H) {
        state.write(units);
    }
}

impl CharUnit for u16 {
    type Inline = [u16; 7];
    const INLINE: usize = 7;
    const TAG: &'static str = "string16";

    fn encode(s: &str) -> Cow<'_, [u16]> {
        Cow::Owned(s.encode_utf16().collect())
    }

    fn decode_lossy(units: &[u16]) -> String {
        String::from_utf16_lossy(units)
    }

    fn hash_units<H: Hasher>(units: &[u16], state: &mut H) {
        for u in units {
            state.write(&u.to_le_bytes());
        }
    }
}

impl CharUnit for u32 {
    type Inline = [u32; 3];
    const INLINE: usize = 3;
    const TAG: &'static str = "string32";

    fn encode(s: &str) -> Cow<'_, [u32]> {
        Cow::Owned(s.chars().map(u32::from).collect())
    }

    fn decode_lossy(units: &[u32]) -> String {
        units
            .iter()
            .map(|&u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    fn hash_units<H: Hasher>(units: &[u32], state: &mut H) {
        for u in units {
            state.write(&u.to_le_bytes());
        }
    }
}

/// Something a string can start or end with.
pub trait Needle<C: CharUnit> {
    /// The needle as units.
    fn units(&self) -> Cow<'_, [C]>;
}

impl<C: CharUnit> Needle<C> for str {
    fn units(&self) -> Cow<'_, [C]> {
        C::encode(self)
    }
}

impl<C: CharUnit> Needle<C> for String {
    fn units(&self) -> Cow<'_, [C]> {
        C::encode(self)
    }
}

/// A single character matches only a non-empty edge holding exactly that character,
/// so `'\0'` never matches an empty string.
impl<C: CharUnit> Needle<C> for char {
    fn units(&self) -> Cow<'_, [C]> {
        let mut buf = [0u8; 4];
        Cow::Owned(C::encode(self.encode_utf8(&mut buf)).into_owned())
    }
}

impl<C: CharUnit> Needle<C> for [C] {
    fn units(&self) -> Cow<'_, [C]> {
        Cow::Borrowed(self)
    }
}

impl<C: CharUnit, const N: usize> Needle<C> for [C; N] {
    fn units(&self) -> Cow<'_, [C]> {
        Cow::Borrowed(self)
    }
}

impl<C: CharUnit> Needle<C> for BasicString<C> {
    fn units(&self) -> Cow<'_, [C]> {
        Cow::Borrowed(self.as_units())
    }
}

impl<C: CharUnit> Needle<C> for ArchivedBasicString<C> {
    fn units(&self) -> Cow<'_, [C]> {
        Cow::Borrowed(self.as_units())
    }
}

impl<C: CharUnit, N: Needle<C> + ?Sized> Needle<C> for &N {
    fn units(&self) -> Cow<'_, [C]> {
        (**self).units()
    }
}

enum Repr<C: CharUnit> {
    Short { len: u8, units: C::Inline },
    Long(Vec<C>),
}

impl<C: CharUnit> Repr<C> {
    fn from_units(units: &[C]) -> Self {
        if units.len() <= C::INLINE {
            let mut inline = C::Inline::default();
            inline.as_mut()[..units.len()].copy_from_slice(units);
            Repr::Short {
                len: units.len() as u8,
                units: inline,
            }
        } else {
            Repr::Long(units.to_vec())
        }
    }

    fn from_vec(units: Vec<C>) -> Self {
        if units.len() <= C::INLINE {
            Self::from_units(&units)
        } else {
            Repr::Long(units)
        }
    }
}

/// An owned string of `C` units with small-string optimization.
pub struct BasicString<C: CharUnit> {
    repr: Repr<C>,
}

/// UTF-8 string.
pub type ByteString = BasicString<u8>;
/// UTF-16 string.
pub type U16String = BasicString<u16>;
/// UTF-32 string.
pub type U32String = BasicString<u32>;

impl<C: CharUnit> BasicString<C> {
    /// An empty string; it owns nothing and is not short.
    pub const fn new() -> Self {
        Self {
            repr: Repr::Long(Vec::new()),
        }
    }

    /// A string holding a copy of `units`.
    pub fn from_units(units: &[C]) -> Self {
        Self {
            repr: Repr::from_units(units),
        }
    }

    /// True if the contents are stored inline.
    pub fn is_short(&self) -> bool {
        matches!(self.repr, Repr::Short { .. })
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.as_units().len()
    }

    /// True if there are no units.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The units.
    pub fn as_units(&self) -> &[C] {
        match &self.repr {
            Repr::Short { len, units } => &units.as_ref()[..usize::from(*len)],
            Repr::Long(units) => units,
        }
    }

    /// Replaces the contents with `s`.
    pub fn set(&mut self, s: &str) {
        self.repr = Repr::from_units(&C::encode(s));
    }

    /// Replaces the contents with `units`.
    pub fn set_units(&mut self, units: &[C]) {
        self.repr = Repr::from_units(units);
    }

    /// Appends a character.
    pub fn push(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.push_str(c.encode_utf8(&mut buf));
    }

    /// Appends `s`.
    pub fn push_str(&mut self, s: &str) {
        self.push_units(&C::encode(s));
    }

    /// Appends `units`.
    pub fn push_units(&mut self, units: &[C]) {
        if let Repr::Long(v) = &mut self.repr {
            if v.len() + units.len() > C::INLINE {
                v.extend_from_slice(units);
                return;
            }
        }
        let mut v = Vec::with_capacity(self.len() + units.len());
        v.extend_from_slice(self.as_units());
        v.extend_from_slice(units);
        self.repr = Repr::from_vec(v);
    }

    /// Removes up to `n` units starting at `pos`. Out-of-range parts are ignored.
    pub fn erase(&mut self, pos: usize, n: usize) {
        let len = self.len();
        if pos >= len || n == 0 {
            return;
        }
        let end = pos.saturating_add(n).min(len);
        let mut v = self.as_units().to_vec();
        v.drain(pos..end);
        self.repr = Repr::from_vec(v);
    }

    /// Resets to the empty, non-short state.
    pub fn clear(&mut self) {
        self.repr = Repr::Long(Vec::new());
    }

    /// True if the string begins with `needle`.
    pub fn starts_with<N: Needle<C> + ?Sized>(&self, needle: &N) -> bool {
        self.as_units().starts_with(&needle.units())
    }

    /// True if the string ends with `needle`.
    pub fn ends_with<N: Needle<C> + ?Sized>(&self, needle: &N) -> bool {
        self.as_units().ends_with(&needle.units())
    }

    /// Decodes the units, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        C::decode_lossy(self.as_units())
    }
}

impl<C: CharUnit> Default for BasicString<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CharUnit> Clone for BasicString<C> {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Short { len, units } => Repr::Short {
                len: *len,
                units: *units,
            },
            Repr::Long(units) => Repr::Long(units.clone()),
        };
        Self { repr }
    }
}

impl<C: CharUnit> From<&str> for BasicString<C> {
    fn from(s: &str) -> Self {
        let mut out = Self::new();
        if !s.is_empty() {
            out.set(s);
        }
        out
    }
}

impl<C: CharUnit> From<String> for BasicString<C> {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl<C: CharUnit> From<&[C]> for BasicString<C> {
    fn from(units: &[C]) -> Self {
        Self::from_units(units)
    }
}

impl<C: CharUnit> PartialEq for BasicString<C> {
    fn eq(&self, other: &Self) -> bool {
        self.as_units() == other.as_units()
    }
}

impl<C: CharUnit> Eq for BasicString<C> {}

impl<C: CharUnit> PartialEq<str> for BasicString<C> {
    fn eq(&self, other: &str) -> bool {
        self.as_units() == &*C::encode(other)
    }
}

impl<C: CharUnit> PartialEq<&str> for BasicString<C> {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl<C: CharUnit> PartialOrd for BasicString<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: CharUnit> Ord for BasicString<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_units().cmp(other.as_units())
    }
}

impl<C: CharUnit> Hash for BasicString<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        C::hash_units(self.as_units(), state);
    }
}

impl<C: CharUnit> fmt::Debug for BasicString<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl<C: CharUnit> fmt::Display for BasicString<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl<C: CharUnit> Serialize for BasicString<C> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.as_units())
    }
}

impl<'de, C: CharUnit> Deserialize<'de> for BasicString<C> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let units = Vec::<C>::deserialize(deserializer)?;
        Ok(Self {
            repr: Repr::from_vec(units),
        })
    }
}

/// Archived form of [`BasicString`]: a 16-byte slot, see the module docs.
#[repr(C, align(8))]
pub struct ArchivedBasicString<C> {
    raw: [u8; 16],
    _unit: PhantomData<fn() -> C>,
}

impl<C: CharUnit> ArchivedBasicString<C> {
    fn flag(&self) -> u8 {
        self.raw[FLAG_BYTE]
    }

    /// True if the units are stored inline.
    pub fn is_short(&self) -> bool {
        self.flag() & SHORT_FLAG != 0
    }

    fn long_ptr(&self) -> &RelPtr<C> {
        // SAFETY: bytes 0..8 of an 8-aligned slot; every bit pattern is a valid i64.
        unsafe { &*(self as *const Self).cast::<RelPtr<C>>() }
    }

    fn long_len(&self) -> u32 {
        // SAFETY: bytes 8..12 of an 8-aligned slot.
        unsafe {
            (self as *const Self)
                .cast::<u8>()
                .add(LONG_LEN_OFFSET)
                .cast::<u32>()
                .read()
        }
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        if self.is_short() {
            usize::from(self.flag() & LEN_MASK)
        } else {
            self.long_len() as usize
        }
    }

    /// True if there are no units.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The units.
    pub fn as_units(&self) -> &[C] {
        let len = self.len();
        if len == 0 {
            return &[];
        }
        let ptr = if self.is_short() {
            self.raw.as_ptr().cast::<C>()
        } else {
            self.long_ptr().as_ptr()
        };
        // SAFETY: validation checked the inline length or the out-of-line range.
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }

    /// True if the string begins with `needle`.
    pub fn starts_with<N: Needle<C> + ?Sized>(&self, needle: &N) -> bool {
        self.as_units().starts_with(&needle.units())
    }

    /// True if the string ends with `needle`.
    pub fn ends_with<N: Needle<C> + ?Sized>(&self, needle: &N) -> bool {
        self.as_units().ends_with(&needle.units())
    }

    /// Copies into an owned string.
    pub fn to_owned_string(&self) -> BasicString<C> {
        BasicString::from_units(self.as_units())
    }

    /// Decodes the units, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        C::decode_lossy(self.as_units())
    }

    /// Writes the archived form of `units` at `pos`, inline if `short`.
    pub(crate) fn serialize_units<W: Target + ?Sized>(
        units: &[C],
        short: bool,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        if short {
            serializer.write_scalars(pos, units)?;
            let flag = SHORT_FLAG | units.len() as u8;
            return serializer.write_bytes(pos + FLAG_BYTE as u64, &[flag]);
        }
        if units.is_empty() {
            return serializer.write_null(pos);
        }
        let len = archived_len::<u32>(units.len())?;
        let data = serializer.alloc::<C>(units.len())?;
        C::serialize_slice(units, serializer, data)?;
        serializer.write_rel(pos, data)?;
        serializer.write_scalar(pos + LONG_LEN_OFFSET as u64, len)
    }
}

impl<C: CharUnit> PartialEq for ArchivedBasicString<C> {
    fn eq(&self, other: &Self) -> bool {
        self.as_units() == other.as_units()
    }
}

impl<C: CharUnit> Eq for ArchivedBasicString<C> {}

impl<C: CharUnit> PartialEq<BasicString<C>> for ArchivedBasicString<C> {
    fn eq(&self, other: &BasicString<C>) -> bool {
        self.as_units() == other.as_units()
    }
}

impl<C: CharUnit> PartialEq<str> for ArchivedBasicString<C> {
    fn eq(&self, other: &str) -> bool {
        self.as_units() == &*C::encode(other)
    }
}

impl<C: CharUnit> PartialEq<&str> for ArchivedBasicString<C> {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl<C: CharUnit> PartialOrd for ArchivedBasicString<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: CharUnit> Ord for ArchivedBasicString<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_units().cmp(other.as_units())
    }
}

impl<C: CharUnit> Hash for ArchivedBasicString<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        C::hash_units(self.as_units(), state);
    }
}

impl<C: CharUnit> fmt::Debug for ArchivedBasicString<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl<C: CharUnit> fmt::Display for ArchivedBasicString<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl<C: CharUnit> Archive for BasicString<C> {
    type Archived = ArchivedBasicString<C>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        ArchivedBasicString::serialize_units(self.as_units(), self.is_short(), serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag(C::TAG);
        Ok(())
    }
}

// SAFETY: the inline length is bounded by the slot, and the out-of-line range is
// checked by the validator.
unsafe impl<C: CharUnit> Verify for ArchivedBasicString<C> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: in range per the caller; the slot only holds bytes.
        let this = unsafe { &*ptr };
        let flag = this.flag();
        if flag & SHORT_FLAG != 0 {
            let len = usize::from(flag & LEN_MASK);
            if len > C::INLINE {
                return Err(validator.invalid(format!(
                    "inline string length {len} exceeds {}",
                    C::INLINE
                )));
            }
            return Ok(());
        }
        if flag != 0 {
            return Err(validator.invalid(format!("string flag byte {flag:#04x}")));
        }
        validator.verify_rel_slice(this.long_ptr(), u64::from(this.long_len()))
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        let base = ptr.cast::<u8>();
        // SAFETY: byte 15 of an in-range slot.
        let flag = unsafe { base.add(FLAG_BYTE).read() };
        if flag & SHORT_FLAG != 0 {
            let len = usize::from(flag & LEN_MASK).min(C::INLINE);
            for i in 0..len {
                fixup.swap(base.cast::<C>().wrapping_add(i))?;
            }
            return Ok(());
        }
        let len = fixup.swap(base.wrapping_add(LONG_LEN_OFFSET).cast::<u32>())?;
        fixup.fix_slice(base.cast::<RelPtr<C>>(), u64::from(len))
    }
}

/// Archived form of `std::string::String`: an [`ArchivedBasicString<u8>`] holding
/// valid UTF-8.
#[repr(transparent)]
pub struct ArchivedString(ArchivedBasicString<u8>);

impl ArchivedString {
    /// The string slice.
    pub fn as_str(&self) -> &str {
        // SAFETY: validation checked the bytes are UTF-8.
        unsafe { std::str::from_utf8_unchecked(self.0.as_units()) }
    }

    /// The underlying unit view.
    pub fn as_basic(&self) -> &ArchivedBasicString<u8> {
        &self.0
    }

    /// True if the bytes are stored inline.
    pub fn is_short(&self) -> bool {
        self.0.is_short()
    }
}

impl std::ops::Deref for ArchivedString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for ArchivedString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for ArchivedString {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for ArchivedString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ArchivedString {}

impl PartialEq<str> for ArchivedString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ArchivedString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<String> for ArchivedString {
    fn eq(&self, other: &String) -> bool {
        self.as_str() == other
    }
}

impl PartialOrd for ArchivedString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArchivedString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Hash for ArchivedString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Debug for ArchivedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ArchivedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Archive for String {
    type Archived = ArchivedString;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        let bytes = self.as_bytes();
        ArchivedBasicString::<u8>::serialize_units(bytes, bytes.len() <= <u8 as CharUnit>::INLINE, serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("string");
        Ok(())
    }
}

// SAFETY: the unit checks plus UTF-8 validation.
unsafe impl Verify for ArchivedString {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        let inner = ptr.cast::<ArchivedBasicString<u8>>();
        // SAFETY: same layout, in range per the caller.
        unsafe { ArchivedBasicString::<u8>::verify(inner, validator)? };
        // SAFETY: checked just above.
        let units = unsafe { (*inner).as_units() };
        std::str::from_utf8(units)
            .map(|_| ())
            .map_err(|e| TesseraError::invalid(format!("string is not UTF-8: {e}")))
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: same layout.
        unsafe { ArchivedBasicString::<u8>::fix_endian(ptr.cast(), fixup) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_long_and_empty() {
        let s = ByteString::new();
        assert!(!s.is_short());
        assert!(s.is_empty());
    }

    #[test]
    fn inline_thresholds_per_width() {
        assert!(ByteString::from("a".repeat(15).as_str()).is_short());
        assert!(!ByteString::from("a".repeat(16).as_str()).is_short());
        assert!(U16String::from("abcdefg").is_short());
        assert!(!U16String::from("abcdefgh").is_short());
        assert!(U32String::from("abc").is_short());
        assert!(!U32String::from("abcd").is_short());
    }

    #[test]
    fn push_crosses_into_long_and_erase_back() {
        let mut s = ByteString::from("0123456789abcd");
        s.push('e');
        assert!(s.is_short());
        s.push('f');
        assert!(!s.is_short());
        assert_eq!(s, "0123456789abcdef");
        s.erase(2, 10);
        assert!(s.is_short());
        assert_eq!(s, "01cdef");
        s.erase(4, 100);
        assert_eq!(s, "01cd");
        s.erase(9, 1);
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn nul_char_never_matches_an_empty_edge() {
        let empty = ByteString::new();
        assert!(!empty.starts_with(&'\0'));
        assert!(!empty.ends_with(&'\0'));
        assert!(empty.starts_with(""));
        let text = U16String::from("hello");
        assert!(!text.ends_with(&'\0'));
        assert!(text.starts_with(&'h'));
        assert!(text.ends_with("llo"));
    }

    #[test]
    fn empty_hashes_to_base() {
        assert_eq!(crate::hashing::hash(&ByteString::new()), crate::hashing::BASE_HASH);
        assert_eq!(crate::hashing::hash(&U32String::new()), crate::hashing::BASE_HASH);
    }
}
