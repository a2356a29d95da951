//! `Archive` and `Verify` for primitives and fixed-size arrays.
//!
//! Numbers archive as themselves. `usize`/`isize` are widened to 64 bits so archives
//! do not depend on the host word size. `bool` and `char` archive as themselves too,
//! but their bit patterns are checked on load.

use crate::archive::{swap_in_place, Archive, Verify};
use crate::de::{EndianFixup, Validator};
use crate::error::{Result, TesseraError};
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ser::Serializer;

macro_rules! impl_scalar_archive {
    ($($t:ty => $tag:literal),* $(,)?) => {
        $(
            impl Archive for $t {
                type Archived = $t;
                const TRACK_ADDRESS: bool = false;

                #[inline]
                fn serialize_into<W: Target + ?Sized>(
                    &self,
                    serializer: &mut Serializer<'_, W>,
                    pos: u64,
                ) -> Result<()> {
                    serializer.write_scalar(pos, *self)
                }

                fn serialize_slice<W: Target + ?Sized>(
                    items: &[Self],
                    serializer: &mut Serializer<'_, W>,
                    pos: u64,
                ) -> Result<()> {
                    serializer.write_scalars(pos, items)
                }

                fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
                    hasher.write_tag($tag);
                    Ok(())
                }
            }

            // SAFETY: every bit pattern is a valid value.
            unsafe impl Verify for $t {
                #[inline]
                unsafe fn verify(_: *const Self, _: &mut Validator<'_>) -> Result<()> {
                    Ok(())
                }

                #[inline]
                unsafe fn verify_slice(_: *const Self, _: usize, _: &mut Validator<'_>) -> Result<()> {
                    Ok(())
                }

                #[inline]
                unsafe fn fix_endian(ptr: *mut Self, _: &mut EndianFixup<'_>) -> Result<()> {
                    // SAFETY: the caller guarantees `ptr` is in range.
                    unsafe { swap_in_place(ptr) };
                    Ok(())
                }

                unsafe fn fix_endian_slice(
                    ptr: *mut Self,
                    len: usize,
                    _: &mut EndianFixup<'_>,
                ) -> Result<()> {
                    for i in 0..len {
                        // SAFETY: the caller guarantees the array is in range.
                        unsafe { swap_in_place(ptr.add(i)) };
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_scalar_archive! {
    u8 => "u8", i8 => "i8",
    u16 => "u16", i16 => "i16",
    u32 => "u32", i32 => "i32",
    u64 => "u64", i64 => "i64",
    u128 => "u128", i128 => "i128",
    f32 => "f32", f64 => "f64",
}

macro_rules! impl_word_archive {
    ($($t:ty => $wide:ty),* $(,)?) => {
        $(
            impl Archive for $t {
                type Archived = $wide;
                const TRACK_ADDRESS: bool = false;

                fn serialize_into<W: Target + ?Sized>(
                    &self,
                    serializer: &mut Serializer<'_, W>,
                    pos: u64,
                ) -> Result<()> {
                    serializer.write_scalar(pos, *self as $wide)
                }

                fn serialize_slice<W: Target + ?Sized>(
                    items: &[Self],
                    serializer: &mut Serializer<'_, W>,
                    pos: u64,
                ) -> Result<()> {
                    let wide: Vec<$wide> = items.iter().map(|v| *v as $wide).collect();
                    serializer.write_scalars(pos, &wide)
                }

                fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
                    <$wide as Archive>::fingerprint(hasher)
                }
            }
        )*
    };
}

impl_word_archive!(usize => u64, isize => i64);

impl Archive for bool {
    type Archived = bool;
    const TRACK_ADDRESS: bool = false;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        serializer.write_scalar(pos, u8::from(*self))
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("bool");
        Ok(())
    }
}

// SAFETY: the byte is checked to be 0 or 1 before the value is used.
unsafe impl Verify for bool {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: in range per the caller; every byte is a valid u8.
        let byte = unsafe { ptr.cast::<u8>().read() };
        if byte > 1 {
            return Err(validator.invalid(format!("bool byte {byte:#04x}")));
        }
        Ok(())
    }

    unsafe fn fix_endian(_: *mut Self, _: &mut EndianFixup<'_>) -> Result<()> {
        Ok(())
    }
}

impl Archive for char {
    type Archived = char;
    const TRACK_ADDRESS: bool = false;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        serializer.write_scalar(pos, u32::from(*self))
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("char");
        Ok(())
    }
}

// SAFETY: the code point is checked before the value is used.
unsafe impl Verify for char {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: in range per the caller; every 4-byte pattern is a valid u32.
        let code = unsafe { ptr.cast::<u32>().read() };
        if char::from_u32(code).is_none() {
            return Err(validator.invalid(format!("char code point {code:#x}")));
        }
        Ok(())
    }

    unsafe fn fix_endian(ptr: *mut Self, _: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: swapped as a plain u32, never read as a char.
        unsafe { swap_in_place(ptr.cast::<u32>()) };
        Ok(())
    }
}

impl Archive for () {
    type Archived = ();
    const TRACK_ADDRESS: bool = false;

    fn serialize_into<W: Target + ?Sized>(&self, _: &mut Serializer<'_, W>, _: u64) -> Result<()> {
        Ok(())
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("unit");
        Ok(())
    }
}

// SAFETY: zero-sized.
unsafe impl Verify for () {
    unsafe fn verify(_: *const Self, _: &mut Validator<'_>) -> Result<()> {
        Ok(())
    }

    unsafe fn fix_endian(_: *mut Self, _: &mut EndianFixup<'_>) -> Result<()> {
        Ok(())
    }
}

impl<T: Archive, const N: usize> Archive for [T; N] {
    type Archived = [T::Archived; N];
    const TRACK_ADDRESS: bool = T::TRACK_ADDRESS;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        T::serialize_slice(self, serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("array");
        hasher.write_u64(N as u64);
        hasher.visit::<T>()
    }
}

// SAFETY: delegates to the element checks.
unsafe impl<T: Verify, const N: usize> Verify for [T; N] {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: an array of N elements is in range per the caller.
        unsafe { T::verify_slice(ptr.cast::<T>(), N, validator) }
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: as above.
        unsafe { T::fix_endian_slice(ptr.cast::<T>(), N, fixup) }
    }
}

/// Converts a host length to its archived width.
pub(crate) fn archived_len<L: TryFrom<usize>>(len: usize) -> Result<L> {
    L::try_from(len).map_err(|_| TesseraError::Overflow(format!("length {len}")))
}

#[cfg(test)]
mod tests {
    use crate::{deserialize, serialize, Mode, Result, TesseraError};

    #[test]
    fn words_are_widened() -> Result<()> {
        let bytes = serialize(&[1usize, 2, 3], Mode::NONE)?;
        let archived = deserialize::<[usize; 3]>(&bytes, Mode::NONE)?;
        assert_eq!(archived, &[1u64, 2, 3]);
        Ok(())
    }

    #[test]
    fn invalid_bool_is_rejected() -> Result<()> {
        let mut bytes = serialize(&true, Mode::NONE)?;
        bytes[0] = 2;
        assert!(matches!(
            deserialize::<bool>(&bytes, Mode::NONE),
            Err(TesseraError::InvalidData(_))
        ));
        Ok(())
    }

    #[test]
    fn surrogate_char_is_rejected() -> Result<()> {
        let mut bytes = serialize(&'x', Mode::NONE)?;
        bytes[..4].copy_from_slice(&0xD800u32.to_le_bytes());
        assert!(deserialize::<char>(&bytes, Mode::NONE).is_err());
        Ok(())
    }
}
