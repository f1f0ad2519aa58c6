use std::ops::RangeInclusive;

/// Bit helpers for the unsigned integer types used by the decoders.
///
/// Bit indexes go from lsb to msb (right to left), ranges are inclusive
/// like in the ARM reference manual (`27..=25` is written `25..=27`).
pub trait Bits: Copy {
    const WIDTH: u8;

    fn get_bit(self, bit_idx: u8) -> bool;

    fn set_bit(&mut self, bit_idx: u8, value: bool);

    /// Extracts the bits in `bits_range` and moves them to position 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    /// Treats the lowest `number_of_bits` bits as a two's complement value
    /// and sign-extends it to the full width.
    fn sign_extended(self, number_of_bits: u8) -> Self;
}

macro_rules! impl_bits {
    ($($t:ty => $signed:ty),*) => {
        $(
            impl Bits for $t {
                const WIDTH: u8 = <$t>::BITS as u8;

                fn get_bit(self, bit_idx: u8) -> bool {
                    debug_assert!(bit_idx < Self::WIDTH);
                    (self >> bit_idx) & 1 == 1
                }

                fn set_bit(&mut self, bit_idx: u8, value: bool) {
                    debug_assert!(bit_idx < Self::WIDTH);
                    let mask: $t = 1 << bit_idx;
                    if value {
                        *self |= mask;
                    } else {
                        *self &= !mask;
                    }
                }

                fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                    let start = *bits_range.start();
                    let end = *bits_range.end();
                    debug_assert!(start <= end && end < Self::WIDTH);

                    let length = u32::from(end - start + 1);
                    let mask = <$t>::MAX.checked_shr(<$t>::BITS - length).unwrap_or(0);
                    (self >> start) & mask
                }

                fn sign_extended(self, number_of_bits: u8) -> Self {
                    debug_assert!(number_of_bits > 0 && number_of_bits <= Self::WIDTH);
                    let unused = Self::WIDTH - number_of_bits;
                    // Move the sign bit to the top, then let the arithmetic shift fill.
                    (((self << unused) as $signed) >> unused) as $t
                }
            }
        )*
    };
}

impl_bits!(u8 => i8, u16 => i16, u32 => i32, u64 => i64);
