//! Pure bit arithmetic on a single cache word.
//!
//! The cache word is a `u32`. Fields of 1-32 bits are handled directly;
//! 33-64 bit fields are composed from two word operations by the stream,
//! low half first.
//!
//! # Bit Ordering
//!
//! Bits enter a word starting at the least significant bit. A full word is
//! emitted in little-endian byte order, so the resulting byte stream is the
//! same as if every bit had been written one at a time, LSB-first.

/// Number of bits in a cache word.
pub const WORD_BITS: u32 = u32::BITS;

/// Number of bytes in a cache word.
pub const WORD_BYTES: usize = (u32::BITS / 8) as usize;

/// Masks selecting the low `n` bits of a word, indexed by `n` (0-32).
pub const BIT_MASKS: [u32; 33] = build_masks();

const fn build_masks() -> [u32; 33] {
    let mut masks = [0u32; 33];
    let mut i = 1;
    while i < 32 {
        masks[i] = (1u32 << i) - 1;
        i += 1;
    }
    masks[32] = u32::MAX;
    masks
}

/// Mask for the low `bits` bits of a word (`bits` in 0-32).
#[inline(always)]
pub fn mask(bits: u32) -> u32 {
    BIT_MASKS[bits as usize]
}

/// Mask for the low `bits` bits of a 64-bit value (`bits` in 0-64).
#[inline]
pub fn mask64(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits).wrapping_sub(1)
    }
}

/// Extract `count` bits of `word` starting at bit `offset`.
#[inline]
pub fn extract(word: u32, offset: u32, count: u32) -> u32 {
    debug_assert!(offset < WORD_BITS);
    debug_assert!(offset + count <= WORD_BITS);
    (word >> offset) & mask(count)
}

/// Insert the low bits of `value` into `word` at bit `offset`.
///
/// Bits of `value` shifted past the top of the word are dropped; the caller
/// carries them into the next word.
#[inline]
pub fn insert(word: u32, value: u32, offset: u32) -> u32 {
    debug_assert!(offset < WORD_BITS);
    word | (value << offset)
}

/// Replicate bit `bits - 1` of `value` into all higher bits of the word.
#[inline]
pub fn sign_extend(value: u32, bits: u32) -> u32 {
    debug_assert!((1..=WORD_BITS).contains(&bits));
    if bits < WORD_BITS && (value >> (bits - 1)) & 1 != 0 {
        value | !mask(bits)
    } else {
        value
    }
}

/// Replicate bit `bits - 1` of `value` into all higher bits of a `u64`.
#[inline]
pub fn sign_extend64(value: u64, bits: u32) -> u64 {
    debug_assert!((1..=64).contains(&bits));
    if bits < 64 && (value >> (bits - 1)) & 1 != 0 {
        value | !mask64(bits)
    } else {
        value
    }
}

/// Check whether an unsigned value fits in `bits` bits.
#[inline]
pub fn fits_unsigned(value: u64, bits: u32) -> bool {
    bits >= 64 || value >> bits == 0
}

/// Check whether a signed value fits in a `bits`-bit two's complement field.
#[inline]
pub fn fits_signed(value: i64, bits: u32) -> bool {
    if bits >= 64 {
        return true;
    }
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&value)
}
