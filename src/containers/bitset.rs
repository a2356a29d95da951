//! Fixed-size bit sets.
//!
//! `Bitset<BITS, BLOCKS>` stores `BITS` bits in `BLOCKS` 64-bit words, bit 0 being the
//! lowest bit of the first word. `BLOCKS` must equal [`blocks_for`]`(BITS)`; a
//! mismatch fails to compile once the type is used. Bits past `BITS` in the last
//! word are always zero. The set archives as itself.

use crate::archive::{swap_in_place, Archive, Verify};
use crate::de::{EndianFixup, Validator};
use crate::error::{Result, TesseraError};
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ser::Serializer;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not, Shl, ShlAssign, Shr, ShrAssign};
use std::str::FromStr;

const WORD_BITS: usize = 64;

/// Number of 64-bit words needed for `bits` bits.
pub const fn blocks_for(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

/// A set of `BITS` bits.
///
/// Sets order as the unsigned integers they spell, highest word first.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bitset<const BITS: usize, const BLOCKS: usize> {
    blocks: [u64; BLOCKS],
}

impl<const BITS: usize, const BLOCKS: usize> Bitset<BITS, BLOCKS> {
    const LAYOUT_CHECK: () = assert!(
        BLOCKS == blocks_for(BITS),
        "Bitset BLOCKS must equal blocks_for(BITS)"
    );

    /// Mask of the valid bits in the last word.
    const LAST_MASK: u64 = if BITS % WORD_BITS == 0 {
        u64::MAX
    } else {
        (1u64 << (BITS % WORD_BITS)) - 1
    };

    /// All bits clear.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT_CHECK;
        Self {
            blocks: [0; BLOCKS],
        }
    }

    /// Builds a set from raw words; bits past `BITS` are cleared.
    pub fn from_blocks(blocks: [u64; BLOCKS]) -> Self {
        let mut set = Self::new();
        set.blocks = blocks;
        set.sanitize();
        set
    }

    /// The raw words.
    pub fn blocks(&self) -> &[u64; BLOCKS] {
        &self.blocks
    }

    /// Number of bits.
    pub const fn size(&self) -> usize {
        BITS
    }

    fn sanitize(&mut self) {
        if let Some(last) = self.blocks.last_mut() {
            *last &= Self::LAST_MASK;
        }
    }

    /// Sets bit `i` to `value`. Out-of-range indices are ignored.
    pub fn set_to(&mut self, i: usize, value: bool) {
        if i >= BITS {
            return;
        }
        let (word, bit) = (i / WORD_BITS, i % WORD_BITS);
        if value {
            self.blocks[word] |= 1 << bit;
        } else {
            self.blocks[word] &= !(1 << bit);
        }
    }

    /// Sets bit `i`.
    pub fn set(&mut self, i: usize) {
        self.set_to(i, true);
    }

    /// Clears bit `i`.
    pub fn reset(&mut self, i: usize) {
        self.set_to(i, false);
    }

    /// Clears every bit.
    pub fn reset_all(&mut self) {
        self.blocks = [0; BLOCKS];
    }

    /// Value of bit `i`; false when out of range.
    pub fn test(&self, i: usize) -> bool {
        i < BITS && self.blocks[i / WORD_BITS] & (1 << (i % WORD_BITS)) != 0
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// True if any bit is set.
    pub fn any(&self) -> bool {
        self.blocks.iter().any(|b| *b != 0)
    }

    /// True if no bit is set.
    pub fn none(&self) -> bool {
        !self.any()
    }

    /// True if every bit is set.
    pub fn all(&self) -> bool {
        self.count() == BITS
    }

    /// Inverts every bit.
    pub fn flip_all(&mut self) {
        for b in &mut self.blocks {
            *b = !*b;
        }
        self.sanitize();
    }

    /// Inverts bit `i`.
    pub fn flip(&mut self, i: usize) {
        let value = self.test(i);
        self.set_to(i, !value);
    }

    /// Iterates over the indices of set bits, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.iter().enumerate().flat_map(|(w, &block)| {
            let mut rest = block;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(w * WORD_BITS + bit)
            })
        })
    }

    fn shifted_left(&self, n: usize) -> Self {
        let mut out = Self::new();
        if n >= BITS {
            return out;
        }
        let (words, bits) = (n / WORD_BITS, n % WORD_BITS);
        for i in (words..BLOCKS).rev() {
            let mut value = self.blocks[i - words] << bits;
            if bits != 0 && i > words {
                value |= self.blocks[i - words - 1] >> (WORD_BITS - bits);
            }
            out.blocks[i] = value;
        }
        out.sanitize();
        out
    }

    fn shifted_right(&self, n: usize) -> Self {
        let mut out = Self::new();
        if n >= BITS {
            return out;
        }
        let (words, bits) = (n / WORD_BITS, n % WORD_BITS);
        for i in 0..BLOCKS - words {
            let mut value = self.blocks[i + words] >> bits;
            if bits != 0 && i + words + 1 < BLOCKS {
                value |= self.blocks[i + words + 1] << (WORD_BITS - bits);
            }
            out.blocks[i] = value;
        }
        out
    }
}

impl<const BITS: usize, const BLOCKS: usize> Default for Bitset<BITS, BLOCKS> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! impl_bit_op {
    ($op:ident, $method:ident, $assign:ident, $assign_method:ident, $tok:tt) => {
        impl<const BITS: usize, const BLOCKS: usize> $op for Bitset<BITS, BLOCKS> {
            type Output = Self;

            fn $method(mut self, rhs: Self) -> Self {
                self.$assign_method(rhs);
                self
            }
        }

        impl<const BITS: usize, const BLOCKS: usize> $assign for Bitset<BITS, BLOCKS> {
            fn $assign_method(&mut self, rhs: Self) {
                for (a, b) in self.blocks.iter_mut().zip(rhs.blocks) {
                    *a = *a $tok b;
                }
            }
        }
    };
}

impl_bit_op!(BitAnd, bitand, BitAndAssign, bitand_assign, &);
impl_bit_op!(BitOr, bitor, BitOrAssign, bitor_assign, |);
impl_bit_op!(BitXor, bitxor, BitXorAssign, bitxor_assign, ^);

impl<const BITS: usize, const BLOCKS: usize> Not for Bitset<BITS, BLOCKS> {
    type Output = Self;

    fn not(mut self) -> Self {
        self.flip_all();
        self
    }
}

impl<const BITS: usize, const BLOCKS: usize> Shl<usize> for Bitset<BITS, BLOCKS> {
    type Output = Self;

    fn shl(self, n: usize) -> Self {
        self.shifted_left(n)
    }
}

impl<const BITS: usize, const BLOCKS: usize> ShlAssign<usize> for Bitset<BITS, BLOCKS> {
    fn shl_assign(&mut self, n: usize) {
        *self = self.shifted_left(n);
    }
}

impl<const BITS: usize, const BLOCKS: usize> Shr<usize> for Bitset<BITS, BLOCKS> {
    type Output = Self;

    fn shr(self, n: usize) -> Self {
        self.shifted_right(n)
    }
}

impl<const BITS: usize, const BLOCKS: usize> ShrAssign<usize> for Bitset<BITS, BLOCKS> {
    fn shr_assign(&mut self, n: usize) {
        *self = self.shifted_right(n);
    }
}

/// Most significant bit first, `BITS` characters.
impl<const BITS: usize, const BLOCKS: usize> Ord for Bitset<BITS, BLOCKS> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.blocks.iter().rev().cmp(other.blocks.iter().rev())
    }
}

impl<const BITS: usize, const BLOCKS: usize> PartialOrd for Bitset<BITS, BLOCKS> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<const BITS: usize, const BLOCKS: usize> fmt::Display for Bitset<BITS, BLOCKS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: String = (0..BITS)
            .rev()
            .map(|i| if self.test(i) { '1' } else { '0' })
            .collect();
        f.write_str(&text)
    }
}

impl<const BITS: usize, const BLOCKS: usize> fmt::Debug for Bitset<BITS, BLOCKS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitset<{BITS}>({self})")
    }
}

/// Parses `0`/`1` characters, most significant first. Shorter strings fill the low
/// bits.
impl<const BITS: usize, const BLOCKS: usize> FromStr for Bitset<BITS, BLOCKS> {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() > BITS {
            return Err(TesseraError::invalid(format!(
                "{} characters for a {BITS}-bit set",
                s.len()
            )));
        }
        let mut set = Self::new();
        for (i, c) in s.bytes().rev().enumerate() {
            match c {
                b'0' => {}
                b'1' => set.set(i),
                other => {
                    return Err(TesseraError::invalid(format!(
                        "bit character {:?}",
                        other as char
                    )))
                }
            }
        }
        Ok(set)
    }
}

impl<const BITS: usize, const BLOCKS: usize> Serialize for Bitset<BITS, BLOCKS> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, const BITS: usize, const BLOCKS: usize> Deserialize<'de> for Bitset<BITS, BLOCKS> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl<const BITS: usize, const BLOCKS: usize> Archive for Bitset<BITS, BLOCKS> {
    type Archived = Self;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        serializer.write_scalars(pos, &self.blocks)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("bitset");
        hasher.write_u64(BITS as u64);
        Ok(())
    }
}

// SAFETY: plain words; padding bits are only checked, never relied upon.
unsafe impl<const BITS: usize, const BLOCKS: usize> Verify for Bitset<BITS, BLOCKS> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        if validator.deep_check() {
            // SAFETY: in range per the caller.
            let this = unsafe { &*ptr };
            if let Some(last) = this.blocks.last() {
                if last & !Self::LAST_MASK != 0 {
                    return Err(validator.invalid("bitset bits set past its size"));
                }
            }
        }
        Ok(())
    }

    unsafe fn fix_endian(ptr: *mut Self, _: &mut EndianFixup<'_>) -> Result<()> {
        let words = ptr.cast::<u64>();
        for i in 0..BLOCKS {
            // SAFETY: `BLOCKS` words of an in-range value.
            unsafe { swap_in_place(words.add(i)) };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Bits100 = Bitset<100, { blocks_for(100) }>;

    #[test]
    fn shifts_cross_word_boundaries() {
        let mut set = Bits100::new();
        set.set(63);
        let moved = set << 1;
        assert!(moved.test(64));
        assert!(!moved.test(63));
        assert_eq!((moved >> 1), set);
        assert!((set << 36).test(99));
        assert!((set << 100).none());
        assert!((set >> 64).none());
    }

    #[test]
    fn high_bits_stay_clear() {
        let mut set = Bits100::new();
        set.flip_all();
        assert_eq!(set.count(), 100);
        assert!(set.all());
        assert_eq!(set.blocks()[1] >> 36, 0);
        let shifted = set << 10;
        assert_eq!(shifted.count(), 90);
    }

    #[test]
    fn string_round_trip_is_msb_first() -> Result<()> {
        let set: Bitset<8, 1> = "10000001".parse()?;
        assert!(set.test(0) && set.test(7));
        assert_eq!(set.count(), 2);
        assert_eq!(set.to_string(), "10000001");
        let short: Bitset<8, 1> = "11".parse()?;
        assert_eq!(short.to_string(), "00000011");
        assert!("102".parse::<Bitset<8, 1>>().is_err());
        assert!("111111111".parse::<Bitset<8, 1>>().is_err());
        Ok(())
    }

    #[test]
    fn operators_combine_bitwise() {
        let a: Bitset<4, 1> = Bitset::from_blocks([0b1100]);
        let b: Bitset<4, 1> = Bitset::from_blocks([0b1010]);
        assert_eq!((a & b).blocks()[0], 0b1000);
        assert_eq!((a | b).blocks()[0], 0b1110);
        assert_eq!((a ^ b).blocks()[0], 0b0110);
        assert_eq!((!a).blocks()[0], 0b0011);
    }

    #[test]
    fn order_is_numeric_across_words() {
        let mut high = Bits100::new();
        high.set(64);
        let mut low = Bits100::new();
        low.set(0);
        low.set(63);
        assert!(high > low);
        assert_eq!(high.cmp(&high), std::cmp::Ordering::Equal);

        let mut sets = [high, low, Bits100::new()];
        sets.sort();
        assert_eq!(sets, [Bits100::new(), low, high]);
    }
}
