//! Error types for OxiBit operations.
//!
//! Data conditions (a value wider than its declared field, a read running off
//! the end of the window) only surface as errors when the stream's
//! `throw_on_overflow` policy covers the active direction. Contract violations
//! on construction and invalid arguments always fail.

use std::io;
use thiserror::Error;

use crate::config::StreamMode;

/// The main error type for OxiBit operations.
#[derive(Debug, Error)]
pub enum OxiBitError {
    /// I/O error from the base stream, including `Unsupported` for
    /// seeking or length queries on streams that cannot do them.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value does not fit in its declared bit width.
    #[error("Overflow: value {value:#x} does not fit in {bits} bits")]
    Overflow {
        /// The value as written (two's complement for signed values).
        value: u64,
        /// Declared field width.
        bits: u32,
    },

    /// A string has more code units than its storage can hold.
    #[error("String too long: {units} code units, storage holds {capacity}")]
    StringTooLong {
        /// Code units in the encoded string.
        units: usize,
        /// Code units the storage can hold.
        capacity: usize,
    },

    /// A write would run past the end of the stream's window.
    #[error("Write past the window end at byte {end}")]
    WindowExceeded {
        /// End offset of the window.
        end: u64,
    },

    /// The base stream ran out before a read completed.
    #[error("Unexpected end of stream: requested {requested} bits, {available} available")]
    EndOfStream {
        /// Bits requested by the read.
        requested: u32,
        /// Bits that could actually be supplied.
        available: u32,
    },

    /// Invalid stream configuration at construction time.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A bit width outside the range an operation accepts.
    #[error("Invalid bit count: {bits} (must be 1-{max})")]
    InvalidBitCount {
        /// The requested width.
        bits: u32,
        /// The largest width accepted.
        max: u32,
    },

    /// Invalid argument to a public operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument error.
        message: String,
    },

    /// The stream was not opened with permission for this direction.
    #[error("Stream does not permit {mode:?} access")]
    PermissionDenied {
        /// The direction that was refused.
        mode: StreamMode,
    },

    /// Operation issued in the wrong stream mode.
    #[error("Wrong stream mode: expected {expected:?}, stream is {actual:?}")]
    WrongMode {
        /// Mode the operation requires.
        expected: StreamMode,
        /// Current mode (`None` when closed).
        actual: Option<StreamMode>,
    },

    /// The stream has been closed.
    #[error("Stream is closed")]
    Closed,

    /// Text could not be encoded or decoded.
    #[error("Encoding error: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// Decoded data is not a valid value of the requested type.
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Description of the data error.
        message: String,
    },
}

/// Result type alias for OxiBit operations.
pub type Result<T> = std::result::Result<T, OxiBitError>;

impl OxiBitError {
    /// Create an overflow error.
    pub fn overflow(value: u64, bits: u32) -> Self {
        Self::Overflow { value, bits }
    }

    /// Create an end-of-stream error.
    pub fn end_of_stream(requested: u32, available: u32) -> Self {
        Self::EndOfStream {
            requested,
            available,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid bit count error.
    pub fn invalid_bit_count(bits: u32, max: u32) -> Self {
        Self::InvalidBitCount { bits, max }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a wrong mode error.
    pub fn wrong_mode(expected: StreamMode, actual: Option<StreamMode>) -> Self {
        Self::WrongMode { expected, actual }
    }

    /// Create an encoding error.
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Check whether this error came from a base stream operation it
    /// does not support.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::Unsupported)
    }
}
