//! Typed value codecs.
//!
//! | Type | Encoding |
//! |------|----------|
//! | integers | low `bits` bits, two's complement for signed types |
//! | `bool` | one bit, 0 or 1 |
//! | `f32`/`f64` | IEEE-754 bit pattern as a 32/64-bit field |
//! | `SystemTime` | signed Unix-epoch seconds in a chosen width |
//! | bytes | 1-8 bits per element, bulk transfer when byte aligned |

use std::time::SystemTime;

use crate::base::BaseStream;
use crate::bitstream::BitStream;
use crate::config::StreamMode;
use crate::error::{OxiBitError, Result};
use crate::time::{from_unix_time, to_unix_time};
use crate::word;

/// A fixed-width integer that can be streamed at a chosen bit width.
pub trait BitValue: Copy {
    /// Width of the type in bits.
    const BITS: u32;

    /// The value as raw bits, sign-extended to 64 bits for signed types.
    fn to_raw(self) -> u64;

    /// Truncate raw bits to this type.
    fn from_raw(raw: u64) -> Self;

    /// Whether the value can be stored in `bits` bits without losing
    /// information.
    fn fits_in(self, bits: u32) -> bool;
}

/// A signed integer; read back with sign extension.
pub trait SignedBitValue: BitValue {}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl BitValue for $t {
            const BITS: u32 = <$t>::BITS;

            #[inline]
            fn to_raw(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_raw(raw: u64) -> Self {
                raw as $t
            }

            #[inline]
            fn fits_in(self, bits: u32) -> bool {
                word::fits_unsigned(self as u64, bits)
            }
        }
    )*};
}

// Non-negative signed values are also accepted when they fit the field as
// unsigned, so `write::<i32>(100, 7)` is not an overflow.
macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl BitValue for $t {
            const BITS: u32 = <$t>::BITS;

            #[inline]
            fn to_raw(self) -> u64 {
                self as i64 as u64
            }

            #[inline]
            fn from_raw(raw: u64) -> Self {
                raw as $t
            }

            #[inline]
            fn fits_in(self, bits: u32) -> bool {
                if self < 0 {
                    word::fits_signed(self as i64, bits)
                } else {
                    word::fits_unsigned(self as u64, bits)
                }
            }
        }

        impl SignedBitValue for $t {}
    )*};
}

impl_unsigned!(u8, u16, u32, u64);
impl_signed!(i8, i16, i32, i64);

fn check_width<T: BitValue>(bits: u32) -> Result<()> {
    if bits == 0 || bits > T::BITS {
        Err(OxiBitError::invalid_bit_count(bits, T::BITS))
    } else {
        Ok(())
    }
}

impl<S: BaseStream> BitStream<S> {
    /// Write `value` in `bits` bits (1 to the width of `T`).
    ///
    /// A value that needs more bits is truncated to its low `bits` bits, or
    /// rejected when the overflow policy covers writing.
    pub fn write<T: BitValue>(&mut self, value: T, bits: u32) -> Result<()> {
        check_width::<T>(bits)?;
        self.ensure_mode(StreamMode::Write)?;
        if !value.fits_in(bits) {
            self.overflow_policy(StreamMode::Write, || {
                OxiBitError::overflow(value.to_raw(), bits)
            })?;
        }
        self.put_bits(value.to_raw() & word::mask64(bits), bits)
    }

    /// Read a `bits`-bit field, zero-extended into `T`.
    pub fn read<T: BitValue>(&mut self, bits: u32) -> Result<T> {
        check_width::<T>(bits)?;
        self.ensure_mode(StreamMode::Read)?;
        Ok(T::from_raw(self.take_bits(bits, false)?))
    }

    /// Read a `bits`-bit two's complement field, sign-extended into `T`.
    pub fn read_signed<T: SignedBitValue>(&mut self, bits: u32) -> Result<T> {
        check_width::<T>(bits)?;
        self.ensure_mode(StreamMode::Read)?;
        Ok(T::from_raw(self.take_bits(bits, true)?))
    }

    /// Read into or write from `value`, depending on the mode.
    pub fn stream<T: BitValue>(&mut self, value: &mut T, bits: u32) -> Result<()> {
        if self.is_reading() {
            *value = self.read(bits)?;
            Ok(())
        } else {
            self.write(*value, bits)
        }
    }

    /// Like [`stream`](Self::stream), sign-extending on read.
    pub fn stream_signed<T: SignedBitValue>(&mut self, value: &mut T, bits: u32) -> Result<()> {
        if self.is_reading() {
            *value = self.read_signed(bits)?;
            Ok(())
        } else {
            self.write(*value, bits)
        }
    }

    /// Write a boolean as one bit.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write(u8::from(value), 1)
    }

    /// Read a one-bit boolean.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read::<u8>(1)? != 0)
    }

    /// Read or write a one-bit boolean.
    pub fn stream_bool(&mut self, value: &mut bool) -> Result<()> {
        if self.is_reading() {
            *value = self.read_bool()?;
            Ok(())
        } else {
            self.write_bool(*value)
        }
    }

    /// Write the IEEE-754 bit pattern of an `f32`.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write(value.to_bits(), 32)
    }

    /// Read an `f32` from its IEEE-754 bit pattern.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read(32)?))
    }

    /// Read or write an `f32`.
    pub fn stream_f32(&mut self, value: &mut f32) -> Result<()> {
        if self.is_reading() {
            *value = self.read_f32()?;
            Ok(())
        } else {
            self.write_f32(*value)
        }
    }

    /// Write the IEEE-754 bit pattern of an `f64`.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write(value.to_bits(), 64)
    }

    /// Read an `f64` from its IEEE-754 bit pattern.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read(64)?))
    }

    /// Read or write an `f64`.
    pub fn stream_f64(&mut self, value: &mut f64) -> Result<()> {
        if self.is_reading() {
            *value = self.read_f64()?;
            Ok(())
        } else {
            self.write_f64(*value)
        }
    }

    /// Write a time as signed Unix-epoch seconds in `bits` bits (1-64).
    pub fn write_unix_time(&mut self, time: SystemTime, bits: u32) -> Result<()> {
        self.write(to_unix_time(time), bits)
    }

    /// Read a time stored as signed Unix-epoch seconds in `bits` bits.
    pub fn read_unix_time(&mut self, bits: u32) -> Result<SystemTime> {
        let secs: i64 = self.read_signed(bits)?;
        from_unix_time(secs).ok_or_else(|| {
            OxiBitError::invalid_data(format!("timestamp {secs} is out of range"))
        })
    }

    /// Read or write a time as Unix-epoch seconds.
    pub fn stream_unix_time(&mut self, time: &mut SystemTime, bits: u32) -> Result<()> {
        if self.is_reading() {
            *time = self.read_unix_time(bits)?;
            Ok(())
        } else {
            self.write_unix_time(*time, bits)
        }
    }

    /// Write whole bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_bytes_packed(bytes, 8)
    }

    /// Fill `buf` with whole bytes.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_bytes_packed(buf, 8)
    }

    /// Write each byte in `bits` bits (1-8).
    ///
    /// Full bytes at a byte-aligned cursor take the bulk path; everything
    /// else goes element by element.
    pub fn write_bytes_packed(&mut self, bytes: &[u8], bits: u32) -> Result<()> {
        check_width::<u8>(bits)?;
        self.ensure_mode(StreamMode::Write)?;

        if bits == 8 && self.is_byte_aligned() {
            return self.put_aligned_bytes(bytes);
        }
        for &byte in bytes {
            if !word::fits_unsigned(u64::from(byte), bits) {
                self.overflow_policy(StreamMode::Write, || {
                    OxiBitError::overflow(u64::from(byte), bits)
                })?;
            }
            self.put_word(u32::from(byte), bits)?;
        }
        Ok(())
    }

    /// Fill `buf` with elements of `bits` bits (1-8) each.
    pub fn read_bytes_packed(&mut self, buf: &mut [u8], bits: u32) -> Result<()> {
        check_width::<u8>(bits)?;
        self.ensure_mode(StreamMode::Read)?;

        if bits == 8 && self.is_byte_aligned() {
            return self.take_aligned_bytes(buf);
        }
        for byte in buf.iter_mut() {
            *byte = self.take_word(bits, false)? as u8;
        }
        Ok(())
    }

    /// Read into or write from a byte buffer, depending on the mode.
    pub fn stream_bytes(&mut self, buf: &mut [u8], bits: u32) -> Result<()> {
        if self.is_reading() {
            self.read_bytes_packed(buf, bits)
        } else {
            self.write_bytes_packed(buf, bits)
        }
    }
}
