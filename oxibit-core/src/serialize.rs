//! Symmetric serialization of user types.
//!
//! A type describes its layout once, in [`BitSerializable::serialize`], by
//! calling the `stream_*` helpers on each field in order. The same method
//! then reads or writes depending on the stream's mode:
//!
//! ```
//! use oxibit_core::{BaseStream, BitSerializable, BitStream, Result};
//! use std::io::Cursor;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Header {
//!     version: u8,
//!     flags: u16,
//!     compressed: bool,
//! }
//!
//! impl BitSerializable for Header {
//!     fn serialize<S: BaseStream>(&mut self, stream: &mut BitStream<S>) -> Result<()> {
//!         stream.stream(&mut self.version, 4)?;
//!         stream.stream(&mut self.flags, 11)?;
//!         stream.stream_bool(&mut self.compressed)
//!     }
//! }
//!
//! let mut header = Header { version: 3, flags: 0x2A5, compressed: true };
//! let mut writer = BitStream::writer(Cursor::new(Vec::new()))?;
//! writer.stream_value(&mut header)?;
//! let bytes = writer.into_inner()?.into_inner();
//! assert_eq!(bytes.len(), 2);
//!
//! let mut reader = BitStream::reader(Cursor::new(bytes))?;
//! let mut decoded = Header::default();
//! reader.stream_value(&mut decoded)?;
//! assert_eq!(decoded, header);
//! # Ok::<(), oxibit_core::OxiBitError>(())
//! ```

use log::trace;

use crate::base::BaseStream;
use crate::bitstream::{BitStream, MAX_PREALLOCATION};
use crate::config::StreamMode;
use crate::error::{OxiBitError, Result};
use crate::word;

/// A type that streams its own fields through a [`BitStream`].
pub trait BitSerializable {
    /// Read or write every field, in a fixed order.
    ///
    /// When the stream is reading, fields are overwritten with the decoded
    /// values; when writing, they are left unchanged.
    fn serialize<S: BaseStream>(&mut self, stream: &mut BitStream<S>) -> Result<()>;
}

impl<S: BaseStream> BitStream<S> {
    /// Stream a nested value.
    ///
    /// On read the value is reset to its default before decoding, so fields
    /// the layout skips do not keep stale contents.
    pub fn stream_value<T: BitSerializable + Default>(&mut self, value: &mut T) -> Result<()> {
        self.stream_object(value, T::default)
    }

    /// Stream a nested value, building the read target with `factory`.
    ///
    /// Useful for types without a `Default`, or whose fresh instances need
    /// context. The factory is only called when reading.
    pub fn stream_object<T: BitSerializable>(
        &mut self,
        value: &mut T,
        factory: impl FnOnce() -> T,
    ) -> Result<()> {
        let mode = self.current_mode()?;
        if mode == StreamMode::Read {
            *value = factory();
        }
        value.serialize(self)
    }

    /// Dispatch to `read` or `write` by mode.
    ///
    /// For layouts that are not symmetric, such as a field derived from
    /// others on write but stored on read.
    pub fn stream_methods<T>(
        &mut self,
        target: &mut T,
        read: impl FnOnce(&mut Self, &mut T) -> Result<()>,
        write: impl FnOnce(&mut Self, &mut T) -> Result<()>,
    ) -> Result<()> {
        match self.current_mode()? {
            StreamMode::Read => read(self, target),
            StreamMode::Write => write(self, target),
        }
    }

    /// Stream a counted sequence: a `count_bits`-bit element count, then
    /// each element.
    ///
    /// On read, decoded elements are appended to `elements`, each created by
    /// `factory`. Reading stops when the source runs out, or fails when the
    /// overflow policy covers reading. On write, a count that does not fit in `count_bits` is an
    /// overflow; when tolerated, only as many elements as the field can
    /// count are written.
    pub fn stream_elements<T: BitSerializable>(
        &mut self,
        elements: &mut Vec<T>,
        count_bits: u32,
        mut factory: impl FnMut() -> T,
    ) -> Result<()> {
        if count_bits == 0 || count_bits > word::WORD_BITS {
            return Err(OxiBitError::invalid_bit_count(count_bits, word::WORD_BITS));
        }

        match self.current_mode()? {
            StreamMode::Read => {
                let count = self.take_word(count_bits, false)? as usize;
                trace!("reading {count} elements");
                elements.reserve(count.min(MAX_PREALLOCATION));
                for read in 0..count {
                    if self.source_exhausted()? {
                        self.overflow_policy(StreamMode::Read, || {
                            OxiBitError::end_of_stream(count_bits, 0)
                        })?;
                        trace!("end of stream after {read} of {count} elements");
                        break;
                    }
                    let mut element = factory();
                    element.serialize(self)?;
                    elements.push(element);
                }
            }
            StreamMode::Write => {
                let max = word::mask(count_bits) as usize;
                let mut count = elements.len();
                if count > max {
                    self.overflow_policy(StreamMode::Write, || {
                        OxiBitError::overflow(count as u64, count_bits)
                    })?;
                    count = max;
                }
                trace!("writing {count} elements");
                self.put_word(count as u32, count_bits)?;
                for element in &mut elements[..count] {
                    element.serialize(self)?;
                }
            }
        }
        Ok(())
    }

    fn current_mode(&self) -> Result<StreamMode> {
        if self.is_closed() {
            return Err(OxiBitError::Closed);
        }
        self.mode()
            .ok_or_else(|| OxiBitError::invalid_argument("stream has no mode set"))
    }
}
