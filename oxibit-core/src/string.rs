//! String streaming with pluggable storage policies.
//!
//! A [`StringStorage`] pairs a [`TextEncoding`], which fixes the width of a
//! code unit, with a [`StringLayout`], which decides how the end of the
//! string is found again on read:
//!
//! - **Character array**: exactly `length` code units, zero padded. The
//!   length comes from the storage or from the call; without one the string
//!   could not be read back, so such a call is rejected.
//! - **Null terminated**: code units followed by a zero unit, optionally
//!   bounded by a maximum that includes the terminator.
//! - **Length prefixed**: a unit count in a field of `prefix_bits` bits,
//!   followed by the units.
//!
//! Storage and length are validated before any bit is streamed.

use encoding_rs::Encoding;

use crate::base::BaseStream;
use crate::bitstream::{BitStream, MAX_PREALLOCATION};
use crate::config::StreamMode;
use crate::error::{OxiBitError, Result};
use crate::word;

/// Character encoding of a streamed string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// 7-bit ASCII in 8-bit units.
    Ascii,
    /// UTF-8 in 8-bit units.
    Utf8,
    /// UTF-16 in 16-bit units.
    Utf16,
    /// A legacy byte-oriented encoding (Shift_JIS, windows-1252, ...) in
    /// 8-bit units. UTF-16 variants encode as UTF-8.
    Legacy(&'static Encoding),
}

impl TextEncoding {
    /// Width of one code unit in bits.
    pub fn unit_bits(&self) -> u32 {
        match self {
            Self::Utf16 => 16,
            Self::Ascii | Self::Utf8 | Self::Legacy(_) => 8,
        }
    }

    fn encode(&self, text: &str) -> Result<Vec<u16>> {
        match self {
            Self::Ascii => text
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u16)
                    } else {
                        Err(OxiBitError::encoding_error(format!(
                            "{c:?} is not an ASCII character"
                        )))
                    }
                })
                .collect(),
            Self::Utf8 => Ok(text.bytes().map(u16::from).collect()),
            Self::Utf16 => Ok(text.encode_utf16().collect()),
            Self::Legacy(encoding) => {
                let (bytes, used, had_errors) = encoding.encode(text);
                if had_errors {
                    return Err(OxiBitError::encoding_error(format!(
                        "text cannot be represented in {}",
                        used.name()
                    )));
                }
                Ok(bytes.iter().copied().map(u16::from).collect())
            }
        }
    }

    fn decode(&self, units: &[u16]) -> Result<String> {
        match self {
            Self::Utf16 => String::from_utf16(units)
                .map_err(|e| OxiBitError::encoding_error(format!("invalid UTF-16: {e}"))),
            Self::Ascii | Self::Utf8 | Self::Legacy(_) => {
                let bytes: Vec<u8> = units.iter().map(|&u| u as u8).collect();
                match self {
                    Self::Ascii if !bytes.is_ascii() => {
                        Err(OxiBitError::encoding_error("non-ASCII byte in ASCII string"))
                    }
                    Self::Legacy(encoding) => encoding
                        .decode_without_bom_handling_and_without_replacement(&bytes)
                        .map(|text| text.into_owned())
                        .ok_or_else(|| {
                            OxiBitError::encoding_error(format!("invalid {}", encoding.name()))
                        }),
                    _ => String::from_utf8(bytes)
                        .map_err(|e| OxiBitError::encoding_error(format!("invalid UTF-8: {e}"))),
                }
            }
        }
    }

    /// Cut the encoded `text` to at most `max` units without splitting a
    /// character.
    fn truncate(&self, text: &str, mut units: Vec<u16>, max: usize) -> Result<Vec<u16>> {
        let mut len = max.min(units.len());
        match self {
            Self::Ascii => {}
            Self::Utf8 => {
                while len > 0 && len < units.len() && units[len] & 0xC0 == 0x80 {
                    len -= 1;
                }
            }
            Self::Utf16 => {
                if len > 0 && (0xD800..0xDC00).contains(&units[len - 1]) {
                    len -= 1;
                }
            }
            Self::Legacy(_) => {
                // Multi-byte and stateful encodings: re-encode whole-character
                // prefixes, keeping the longest that fits
                let mut fitting = Vec::new();
                for (start, c) in text.char_indices() {
                    let prefix = self.encode(&text[..start + c.len_utf8()])?;
                    if prefix.len() > max {
                        break;
                    }
                    fitting = prefix;
                }
                return Ok(fitting);
            }
        }
        units.truncate(len);
        Ok(units)
    }
}

/// How a string's extent is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringLayout {
    /// A zero-padded array of code units; `None` requires a length per call.
    CharArray {
        /// Fixed number of code units.
        length: Option<usize>,
    },
    /// Code units followed by a zero unit.
    NullTerminated {
        /// Maximum code units including the terminator.
        max_length: Option<usize>,
    },
    /// A unit count followed by the code units.
    LengthPrefixed {
        /// Width of the count field (1-32).
        prefix_bits: u32,
    },
}

/// A storage policy for streaming strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringStorage {
    /// Character encoding.
    pub encoding: TextEncoding,
    /// Extent layout.
    pub layout: StringLayout,
}

impl StringStorage {
    /// Null-terminated UTF-8, the C string convention.
    pub const CSTRING: Self = Self::null_terminated(TextEncoding::Utf8);

    /// UTF-8 with a 16-bit unit count.
    pub const PASCAL_UTF8: Self = Self::length_prefixed(TextEncoding::Utf8, 16);

    /// Null-terminated UTF-16.
    pub const WIDE_CSTRING: Self = Self::null_terminated(TextEncoding::Utf16);

    /// Create a storage policy.
    pub const fn new(encoding: TextEncoding, layout: StringLayout) -> Self {
        Self { encoding, layout }
    }

    /// Character array of `length` units; `None` defers the length to
    /// each call.
    pub const fn char_array(encoding: TextEncoding, length: Option<usize>) -> Self {
        Self::new(encoding, StringLayout::CharArray { length })
    }

    /// Null-terminated string without a maximum length.
    pub const fn null_terminated(encoding: TextEncoding) -> Self {
        Self::new(encoding, StringLayout::NullTerminated { max_length: None })
    }

    /// Length-prefixed string with a `prefix_bits`-bit unit count.
    pub const fn length_prefixed(encoding: TextEncoding, prefix_bits: u32) -> Self {
        Self::new(encoding, StringLayout::LengthPrefixed { prefix_bits })
    }

    /// Bound a null-terminated string to `max_length` units including the
    /// terminator. Other layouts are returned unchanged.
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        if let StringLayout::NullTerminated { .. } = self.layout {
            self.layout = StringLayout::NullTerminated {
                max_length: Some(max_length),
            };
        }
        self
    }

    /// Resolve the layout against a per-call length and check that the
    /// string could be read back.
    fn resolve(&self, length: Option<usize>) -> Result<StringLayout> {
        match self.layout {
            StringLayout::CharArray { length: fixed } => match length.or(fixed) {
                Some(length) => Ok(StringLayout::CharArray {
                    length: Some(length),
                }),
                None => Err(OxiBitError::invalid_argument(
                    "character array storage without a fixed length needs an explicit length",
                )),
            },
            StringLayout::NullTerminated { max_length } => match length.or(max_length) {
                Some(0) => Err(OxiBitError::invalid_argument(
                    "null-terminated storage needs room for the terminator",
                )),
                max_length => Ok(StringLayout::NullTerminated { max_length }),
            },
            StringLayout::LengthPrefixed { prefix_bits } => {
                if prefix_bits == 0 || prefix_bits > 32 {
                    Err(OxiBitError::invalid_bit_count(prefix_bits, 32))
                } else {
                    Ok(self.layout)
                }
            }
        }
    }
}

impl Default for StringStorage {
    fn default() -> Self {
        Self::CSTRING
    }
}

impl<S: BaseStream> BitStream<S> {
    /// Write a string with the given storage policy.
    ///
    /// `length` is the character-array length, or the maximum length of a
    /// null-terminated string, overriding the storage's own. A string that
    /// does not fit is truncated at a character boundary, or rejected when
    /// the overflow policy covers writing.
    pub fn write_string(
        &mut self,
        value: &str,
        storage: &StringStorage,
        length: Option<usize>,
    ) -> Result<()> {
        let layout = storage.resolve(length)?;
        self.ensure_mode(StreamMode::Write)?;

        let encoding = storage.encoding;
        let unit_bits = encoding.unit_bits();
        let mut units = encoding.encode(value)?;
        if matches!(layout, StringLayout::NullTerminated { .. }) && units.contains(&0) {
            return Err(OxiBitError::invalid_argument(
                "null-terminated string contains a NUL character",
            ));
        }

        let capacity = match layout {
            StringLayout::CharArray { length } => length,
            StringLayout::NullTerminated { max_length } => max_length.map(|max| max - 1),
            StringLayout::LengthPrefixed { prefix_bits } => {
                Some(usize::try_from(word::mask(prefix_bits)).unwrap_or(usize::MAX))
            }
        };
        if let Some(capacity) = capacity.filter(|&capacity| units.len() > capacity) {
            let len = units.len();
            self.overflow_policy(StreamMode::Write, || OxiBitError::StringTooLong {
                units: len,
                capacity,
            })?;
            units = encoding.truncate(value, units, capacity)?;
        }
        let count = units.len();

        if let StringLayout::LengthPrefixed { prefix_bits } = layout {
            self.put_word(count as u32, prefix_bits)?;
        }
        for &unit in &units {
            self.put_word(u32::from(unit), unit_bits)?;
        }
        match layout {
            StringLayout::CharArray {
                length: Some(length),
            } => {
                for _ in count..length {
                    self.put_word(0, unit_bits)?;
                }
            }
            StringLayout::NullTerminated { .. } => self.put_word(0, unit_bits)?,
            _ => {}
        }
        Ok(())
    }

    /// Read a string with the given storage policy.
    pub fn read_string(&mut self, storage: &StringStorage, length: Option<usize>) -> Result<String> {
        let layout = storage.resolve(length)?;
        self.ensure_mode(StreamMode::Read)?;

        let encoding = storage.encoding;
        let unit_bits = encoding.unit_bits();
        let mut units = Vec::new();

        match layout {
            StringLayout::CharArray { length } => {
                let length = length.unwrap_or(0);
                units.reserve(length.min(MAX_PREALLOCATION));
                for _ in 0..length {
                    units.push(self.take_word(unit_bits, false)? as u16);
                }
                if let Some(end) = units.iter().position(|&u| u == 0) {
                    units.truncate(end);
                }
            }
            StringLayout::NullTerminated { max_length } => loop {
                if max_length.is_some_and(|max| units.len() >= max) {
                    break;
                }
                let unit = self.take_word(unit_bits, false)? as u16;
                if unit == 0 {
                    break;
                }
                units.push(unit);
            },
            StringLayout::LengthPrefixed { prefix_bits } => {
                let count = self.take_word(prefix_bits, false)? as usize;
                units.reserve(count.min(MAX_PREALLOCATION));
                for _ in 0..count {
                    if self.source_exhausted()? {
                        self.overflow_policy(StreamMode::Read, || {
                            OxiBitError::end_of_stream(unit_bits, 0)
                        })?;
                        break;
                    }
                    units.push(self.take_word(unit_bits, false)? as u16);
                }
            }
        }

        encoding.decode(&units)
    }

    /// Read into or write from `value`, depending on the mode.
    pub fn stream_string(
        &mut self,
        value: &mut String,
        storage: &StringStorage,
        length: Option<usize>,
    ) -> Result<()> {
        if self.is_reading() {
            *value = self.read_string(storage, length)?;
            Ok(())
        } else {
            self.write_string(value, storage, length)
        }
    }
}
