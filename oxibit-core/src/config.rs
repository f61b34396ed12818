//! Stream configuration: access directions, modes and construction options.

use bitflags::bitflags;

bitflags! {
    /// A set of stream directions.
    ///
    /// Used both for the directions a stream permits and for the directions
    /// in which overflow raises an error instead of truncating.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StreamAccess: u8 {
        /// Reading.
        const READ = 1 << 0;
        /// Writing.
        const WRITE = 1 << 1;
        /// Reading and writing.
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// The direction a stream is currently operating in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamMode {
    /// Bits are consumed from the base stream.
    Read,
    /// Bits are accumulated and emitted to the base stream.
    Write,
}

impl StreamMode {
    /// The access flag corresponding to this mode.
    pub fn access(self) -> StreamAccess {
        match self {
            Self::Read => StreamAccess::READ,
            Self::Write => StreamAccess::WRITE,
        }
    }
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Options for constructing a [`BitStream`](crate::BitStream).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitStreamOptions {
    /// Diagnostic name, included in log records.
    pub name: Option<String>,
    /// Directions the stream may operate in.
    pub permissions: StreamAccess,
    /// Directions in which overflow and end-of-stream raise errors.
    /// Elsewhere values are silently truncated or zero padded.
    pub throw_on_overflow: StreamAccess,
    /// Whether closing the bit stream also disposes of the base stream.
    pub owns_base: bool,
    /// First byte of the window.
    pub start_offset: u64,
    /// End of the window in bytes; 0 tracks the base stream length.
    pub end_offset: u64,
    /// Mode to enter on construction.
    pub mode: Option<StreamMode>,
}

impl BitStreamOptions {
    /// Read-only stream, entered in read mode.
    pub const READ_ONLY: Self = Self::new(StreamAccess::READ);

    /// Write-only stream, entered in write mode.
    pub const WRITE_ONLY: Self = Self::new(StreamAccess::WRITE);

    /// Read/write stream. No mode is entered until one is set.
    pub const READ_WRITE: Self = Self::new(StreamAccess::READ_WRITE);

    /// Create options with the given permissions and defaults elsewhere.
    pub const fn new(permissions: StreamAccess) -> Self {
        Self {
            name: None,
            permissions,
            throw_on_overflow: StreamAccess::empty(),
            owns_base: false,
            start_offset: 0,
            end_offset: 0,
            mode: None,
        }
    }

    /// Set the diagnostic name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the directions in which overflow raises errors.
    pub fn with_throw_on_overflow(mut self, directions: StreamAccess) -> Self {
        self.throw_on_overflow = directions;
        self
    }

    /// Scope the stream to the byte range `[start, end)` of the base stream.
    /// An `end` of 0 tracks the base stream length.
    ///
    /// Reads stop at `end`. Writes past it follow the write overflow policy:
    /// the excess bytes are dropped, or the write fails with
    /// [`WindowExceeded`](crate::OxiBitError::WindowExceeded).
    pub fn with_window(mut self, start: u64, end: u64) -> Self {
        self.start_offset = start;
        self.end_offset = end;
        self
    }

    /// Make the bit stream responsible for disposing of the base stream.
    pub fn owning(mut self) -> Self {
        self.owns_base = true;
        self
    }

    /// Set the mode entered on construction.
    pub fn with_mode(mut self, mode: StreamMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// The mode a new stream starts in: the explicit mode, or the only
    /// permitted direction.
    pub fn initial_mode(&self) -> Option<StreamMode> {
        if self.mode.is_some() {
            return self.mode;
        }
        if self.permissions == StreamAccess::READ {
            Some(StreamMode::Read)
        } else if self.permissions == StreamAccess::WRITE {
            Some(StreamMode::Write)
        } else {
            None
        }
    }
}

impl Default for BitStreamOptions {
    fn default() -> Self {
        Self::READ_WRITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(BitStreamOptions::READ_ONLY.initial_mode(), Some(StreamMode::Read));
        assert_eq!(BitStreamOptions::WRITE_ONLY.initial_mode(), Some(StreamMode::Write));
        assert_eq!(BitStreamOptions::READ_WRITE.initial_mode(), None);
        assert!(BitStreamOptions::default().throw_on_overflow.is_empty());
    }

    #[test]
    fn test_builder() {
        let options = BitStreamOptions::READ_WRITE
            .with_name("header")
            .with_window(4, 16)
            .with_throw_on_overflow(StreamAccess::WRITE)
            .with_mode(StreamMode::Write)
            .owning();

        assert_eq!(options.name.as_deref(), Some("header"));
        assert_eq!((options.start_offset, options.end_offset), (4, 16));
        assert!(options.throw_on_overflow.contains(StreamAccess::WRITE));
        assert!(!options.throw_on_overflow.contains(StreamAccess::READ));
        assert_eq!(options.initial_mode(), Some(StreamMode::Write));
        assert!(options.owns_base);
    }

    #[test]
    fn test_mode_access() {
        assert_eq!(StreamMode::Read.access(), StreamAccess::READ);
        assert_eq!(StreamMode::Write.access(), StreamAccess::WRITE);
        assert_eq!(StreamMode::Write.to_string(), "write");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_serde() {
        let options = BitStreamOptions::READ_ONLY.with_name("blob");
        let json = serde_json::to_string(&options).unwrap();
        let back: BitStreamOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
