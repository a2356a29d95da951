//! Bit counting helpers.
//!
//! Thin wrappers over the integer intrinsics with one contract for every width: a
//! zero input yields the bit width for both counts.

/// An unsigned integer whose bits can be counted.
pub trait BitCount: Copy {
    /// Width in bits.
    const BITS: u32;

    /// Zero bits below the lowest set bit.
    fn trailing_zeros(self) -> u32;

    /// Zero bits above the highest set bit.
    fn leading_zeros(self) -> u32;
}

macro_rules! impl_bit_count {
    ($($ty:ty),*) => {
        $(
            impl BitCount for $ty {
                const BITS: u32 = <$ty>::BITS;

                #[inline]
                fn trailing_zeros(self) -> u32 {
                    <$ty>::trailing_zeros(self)
                }

                #[inline]
                fn leading_zeros(self) -> u32 {
                    <$ty>::leading_zeros(self)
                }
            }
        )*
    };
}

impl_bit_count!(u8, u16, u32, u64, u128, usize);

/// Zero bits below the lowest set bit of `value`; the bit width for zero.
#[inline]
pub fn trailing_zeros<T: BitCount>(value: T) -> u32 {
    value.trailing_zeros()
}

/// Zero bits above the highest set bit of `value`; the bit width for zero.
#[inline]
pub fn leading_zeros<T: BitCount>(value: T) -> u32 {
    value.leading_zeros()
}

/// Smallest `k` with `2^k >= size`, so the exponent of a power of two.
#[inline]
pub fn get_order(size: u64) -> u32 {
    match size {
        0 | 1 => 0,
        n => u64::BITS - (n - 1).leading_zeros(),
    }
}
