//! # OxiBit Core
//!
//! Bit-granular stream I/O: pack and unpack values at arbitrary bit widths
//! into and out of an ordinary byte stream.
//!
//! - [`bitstream`]: The [`BitStream`] engine: word cache, modes, positions
//! - [`value`]: Typed codecs for integers, floats, booleans, times and bytes
//! - [`string`]: String storage policies
//! - [`serialize`]: The [`BitSerializable`] contract and its dispatcher
//! - [`base`]: The [`BaseStream`] abstraction over byte streams
//! - [`config`]: Permissions, modes and construction options
//! - [`word`]: Bit masks and word-level helpers
//! - [`time`]: Unix-epoch conversions
//! - [`error`]: Error types
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Dispatcher                                              │
//! │     BitSerializable, stream_value, stream_elements      │
//! ├─────────────────────────────────────────────────────────┤
//! │ Value codecs                                            │
//! │     integers, bool, f32/f64, SystemTime, bytes, strings │
//! ├─────────────────────────────────────────────────────────┤
//! │ BitStream                                               │
//! │     32-bit word cache, read/write modes, bit positions  │
//! ├─────────────────────────────────────────────────────────┤
//! │ BaseStream                                              │
//! │     any Read/Write/Seek, or a read/write-only adapter   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Bits fill each cache word from the least significant end and words reach
//! the base stream in little-endian byte order. The engine adds no framing
//! of its own: the layout is exactly the sequence of calls made.
//!
//! ## Example
//!
//! ```rust
//! use oxibit_core::BitStream;
//! use std::io::Cursor;
//!
//! let mut writer = BitStream::writer(Cursor::new(Vec::new()))?;
//! writer.write(5u8, 3)?;
//! writer.write(-2i16, 10)?;
//! writer.write_bool(true)?;
//! let bytes = writer.into_inner()?.into_inner();
//! assert_eq!(bytes.len(), 2);
//!
//! let mut reader = BitStream::reader(Cursor::new(bytes))?;
//! assert_eq!(reader.read::<u8>(3)?, 5);
//! assert_eq!(reader.read_signed::<i16>(10)?, -2);
//! assert!(reader.read_bool()?);
//! # Ok::<(), oxibit_core::OxiBitError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod base;
pub mod bitstream;
pub mod config;
pub mod error;
pub mod serialize;
pub mod string;
pub mod time;
pub mod value;
pub mod word;

// Re-exports for convenience
pub use base::{BaseStream, ForwardReader, ForwardWriter, ReadOnly, WriteOnly};
pub use bitstream::BitStream;
pub use config::{BitStreamOptions, StreamAccess, StreamMode};
pub use error::{OxiBitError, Result};
pub use serialize::BitSerializable;
pub use string::{StringLayout, StringStorage, TextEncoding};
pub use time::{from_unix_time, to_unix_time};
pub use value::{BitValue, SignedBitValue};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::base::BaseStream;
    pub use crate::bitstream::BitStream;
    pub use crate::config::{BitStreamOptions, StreamAccess, StreamMode};
    pub use crate::error::{OxiBitError, Result};
    pub use crate::serialize::BitSerializable;
    pub use crate::string::{StringStorage, TextEncoding};
}
