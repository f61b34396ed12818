//! The bit-granular stream engine.
//!
//! [`BitStream`] packs and unpacks fields of 1-64 bits into and out of a
//! byte-oriented [`BaseStream`]. It buffers one 32-bit cache word between the
//! caller and the base stream and runs in exactly one of two modes:
//!
//! - **Write**: bits accumulate in the cache; every full word is emitted to
//!   the base stream, and a partial word is zero padded to whole bytes when
//!   the cache is flushed.
//! - **Read**: the cache is filled one word (or less, at the end of the
//!   window) at a time and bits are consumed from it.
//!
//! The bit position is never counted separately. It is always derived from
//! the base stream position and the cache state, so the two cannot drift.
//!
//! # Example
//!
//! ```
//! use oxibit_core::{BitStream, StreamMode};
//! use std::io::Cursor;
//!
//! let mut stream = BitStream::writer(Cursor::new(Vec::new())).unwrap();
//! stream.write_bits(0b101, 3).unwrap();
//! stream.write_bits(0x1234_5678_9A, 40).unwrap();
//!
//! stream.seek_to_start().unwrap();
//! let mut stream = BitStream::reader(stream.into_inner().unwrap()).unwrap();
//! assert_eq!(stream.read_bits(3, false).unwrap(), 0b101);
//! assert_eq!(stream.read_bits(40, false).unwrap(), 0x1234_5678_9A);
//! assert_eq!(stream.mode(), Some(StreamMode::Read));
//! ```

use std::any::Any;
use std::fmt;

use log::{debug, trace, warn};

use crate::base::{self, BaseStream};
use crate::config::{BitStreamOptions, StreamAccess, StreamMode};
use crate::error::{OxiBitError, Result};
use crate::word::{self, WORD_BITS, WORD_BYTES};

/// Upper bound on elements reserved up front for a count read from the
/// stream. Larger collections grow as elements actually decode.
pub(crate) const MAX_PREALLOCATION: usize = 4096;

/// A bit-level stream over a [`BaseStream`].
///
/// A `BitStream` is not thread-safe; every operation mutates the cache in
/// place.
pub struct BitStream<S: BaseStream> {
    /// Base stream; `None` once closed.
    base: Option<S>,
    name: Option<String>,
    owner: Option<Box<dyn Any + Send>>,
    user_data: Option<Box<dyn Any + Send>>,
    permissions: StreamAccess,
    throw_on_overflow: StreamAccess,
    owns_base: bool,
    start_offset: u64,
    /// 0 tracks the live base stream length.
    end_offset: u64,
    mode: Option<StreamMode>,
    /// Buffered bits, LSB-first.
    cache: u32,
    /// Next bit to write or read, always below `WORD_BITS`.
    cache_bit_index: u32,
    /// Valid bits fetched into the cache while reading; 0 while writing.
    cache_bits_streamed: u32,
}

impl<S: BaseStream> BitStream<S> {
    /// Create a stream with the given permissions and default options.
    pub fn new(base: S, permissions: StreamAccess) -> Result<Self> {
        Self::with_options(base, BitStreamOptions::new(permissions))
    }

    /// Create a read-only stream in read mode.
    pub fn reader(base: S) -> Result<Self> {
        Self::with_options(base, BitStreamOptions::READ_ONLY)
    }

    /// Create a write-only stream in write mode.
    pub fn writer(base: S) -> Result<Self> {
        Self::with_options(base, BitStreamOptions::WRITE_ONLY)
    }

    /// Create a stream from explicit options.
    ///
    /// Fails on an empty permission set, a permission the base stream cannot
    /// honor, or a window that is inverted, exceeds the base stream length,
    /// or is placed on a stream that cannot seek.
    pub fn with_options(mut base: S, options: BitStreamOptions) -> Result<Self> {
        let BitStreamOptions {
            name,
            permissions,
            throw_on_overflow,
            owns_base,
            start_offset,
            end_offset,
            mode: _,
        } = options.clone();

        if permissions.is_empty() {
            return Err(OxiBitError::invalid_config("no stream permissions given"));
        }
        if permissions.contains(StreamAccess::READ) && !base.can_read() {
            return Err(OxiBitError::invalid_config(
                "read permission on a base stream that cannot read",
            ));
        }
        if permissions.contains(StreamAccess::WRITE) && !base.can_write() {
            return Err(OxiBitError::invalid_config(
                "write permission on a base stream that cannot write",
            ));
        }

        if start_offset != 0 || end_offset != 0 {
            if !base.can_seek() {
                return Err(OxiBitError::invalid_config(
                    "a window requires a seekable base stream",
                ));
            }
            let len = base.byte_len()?;
            if end_offset != 0 && end_offset < start_offset {
                return Err(OxiBitError::invalid_config(format!(
                    "window end {end_offset} precedes start {start_offset}"
                )));
            }
            if end_offset > len || start_offset > len {
                return Err(OxiBitError::invalid_config(format!(
                    "window [{start_offset}, {end_offset}) exceeds base stream length {len}"
                )));
            }
            if start_offset != 0 {
                base.seek_to(start_offset)?;
            }
        }

        let mut stream = Self {
            base: Some(base),
            name,
            owner: None,
            user_data: None,
            permissions,
            throw_on_overflow,
            owns_base,
            start_offset,
            end_offset,
            mode: None,
            cache: 0,
            cache_bit_index: 0,
            cache_bits_streamed: 0,
        };
        debug!(
            "{}: opened with {:?}, window [{}, {})",
            stream.label(),
            permissions,
            start_offset,
            end_offset
        );

        if let Some(mode) = options.initial_mode() {
            stream.set_mode(mode)?;
        }
        Ok(stream)
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("bitstream")
    }

    /// Diagnostic name of the stream.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the diagnostic name of the stream.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Opaque owner object.
    pub fn owner<T: Any>(&self) -> Option<&T> {
        self.owner.as_ref()?.downcast_ref()
    }

    /// Attach an opaque owner object.
    pub fn set_owner<T: Any + Send>(&mut self, owner: T) {
        self.owner = Some(Box::new(owner));
    }

    /// Opaque user data.
    pub fn user_data<T: Any>(&self) -> Option<&T> {
        self.user_data.as_ref()?.downcast_ref()
    }

    /// Attach opaque user data.
    pub fn set_user_data<T: Any + Send>(&mut self, data: T) {
        self.user_data = Some(Box::new(data));
    }

    /// Directions this stream may operate in. Empty once closed.
    pub fn permissions(&self) -> StreamAccess {
        self.permissions
    }

    /// Directions in which overflow and end-of-stream raise errors.
    pub fn throw_on_overflow(&self) -> StreamAccess {
        self.throw_on_overflow
    }

    /// Change the overflow policy.
    pub fn set_throw_on_overflow(&mut self, directions: StreamAccess) {
        self.throw_on_overflow = directions;
    }

    /// Whether closing this stream disposes of the base stream.
    pub fn owns_base(&self) -> bool {
        self.owns_base
    }

    /// First byte of the window.
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// End of the window; 0 when tracking the base stream length.
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// Get a reference to the base stream.
    pub fn get_ref(&self) -> Result<&S> {
        self.base.as_ref().ok_or(OxiBitError::Closed)
    }

    /// Get a mutable reference to the base stream.
    ///
    /// Moving the base stream behind the bit stream's back desynchronizes
    /// the cache; call [`flush`](Self::flush) first and
    /// [`seek_to_start`](Self::seek_to_start) afterwards.
    pub fn get_mut(&mut self) -> Result<&mut S> {
        self.base.as_mut().ok_or(OxiBitError::Closed)
    }

    /// Whether the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.base.is_none()
    }

    // ------------------------------------------------------------------
    // Mode controller
    // ------------------------------------------------------------------

    /// Current mode; `None` when closed or not yet opened in a direction.
    pub fn mode(&self) -> Option<StreamMode> {
        self.mode
    }

    /// Whether the stream is in read mode.
    pub fn is_reading(&self) -> bool {
        self.mode == Some(StreamMode::Read)
    }

    /// Whether the stream is in write mode.
    pub fn is_writing(&self) -> bool {
        self.mode == Some(StreamMode::Write)
    }

    /// Switch the stream's mode.
    ///
    /// Entering read mode flushes any pending write bits and pre-fills the
    /// cache. Entering write mode from read mode discards the read-ahead
    /// cache; on a seekable stream the base stream is moved back over the
    /// bytes that were fetched but not consumed.
    pub fn set_mode(&mut self, mode: StreamMode) -> Result<()> {
        if self.base.is_none() {
            return Err(OxiBitError::Closed);
        }
        if !self.permissions.contains(mode.access()) {
            return Err(OxiBitError::PermissionDenied { mode });
        }
        if self.mode == Some(mode) {
            return Ok(());
        }

        match mode {
            StreamMode::Read => {
                if self.is_writing() {
                    self.flush_cache()?;
                }
                self.mode = Some(StreamMode::Read);
                self.fill_cache()?;
            }
            StreamMode::Write => {
                if self.is_reading() {
                    self.discard_read_ahead()?;
                }
                self.reset_cache();
                self.mode = Some(StreamMode::Write);
            }
        }
        debug!("{}: entered {} mode", self.label(), mode);
        Ok(())
    }

    fn discard_read_ahead(&mut self) -> Result<()> {
        let unread_bytes = u64::from((self.cache_bits_streamed - self.cache_bit_index) / 8);
        self.reset_cache();
        let base = self.base_mut()?;
        if unread_bytes > 0 && base.can_seek() {
            let position = base.tell()?;
            base.seek_to(position - unread_bytes)?;
        }
        Ok(())
    }

    pub(crate) fn ensure_mode(&self, expected: StreamMode) -> Result<()> {
        if self.mode == Some(expected) {
            Ok(())
        } else if self.base.is_none() {
            Err(OxiBitError::Closed)
        } else {
            Err(OxiBitError::wrong_mode(expected, self.mode))
        }
    }

    fn base_mut(&mut self) -> Result<&mut S> {
        self.base.as_mut().ok_or(OxiBitError::Closed)
    }

    /// Apply the overflow policy for `mode`: an error when the policy covers
    /// that direction, otherwise `Ok` and the caller truncates or pads.
    pub(crate) fn overflow_policy(
        &self,
        mode: StreamMode,
        error: impl FnOnce() -> OxiBitError,
    ) -> Result<()> {
        if self.throw_on_overflow.contains(mode.access()) {
            Err(error())
        } else {
            trace!("{}: {} overflow tolerated", self.label(), mode);
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Bit cache
    // ------------------------------------------------------------------

    fn reset_cache(&mut self) {
        self.cache = 0;
        self.cache_bit_index = 0;
        self.cache_bits_streamed = 0;
    }

    /// Bytes left in the window from the current base position, or `None`
    /// when the window tracks the base stream length.
    fn window_remaining(&mut self) -> Result<Option<u64>> {
        if self.end_offset == 0 {
            return Ok(None);
        }
        let end = self.end_offset;
        let position = self.base_mut()?.tell()?;
        Ok(Some(end.saturating_sub(position)))
    }

    /// Load the next word (or the tail of the window) into the cache.
    /// Returns `false` when no bytes remain.
    fn fill_cache(&mut self) -> Result<bool> {
        debug_assert!(self.is_reading());

        let mut want = WORD_BYTES;
        if let Some(remaining) = self.window_remaining()? {
            want = want.min(remaining as usize);
        }

        let mut buf = [0u8; WORD_BYTES];
        let got = base::read_full(self.base_mut()?, &mut buf[..want])?;

        self.cache = u32::from_le_bytes(buf);
        self.cache_bit_index = 0;
        self.cache_bits_streamed = got as u32 * 8;
        trace!("{}: cache filled with {} bytes", self.label(), got);
        Ok(got > 0)
    }

    /// Emit pending write bits as whole bytes, zero padding the last one.
    fn flush_cache(&mut self) -> Result<()> {
        if !self.is_writing() || self.cache_bit_index == 0 {
            return Ok(());
        }

        let bytes = self.cache_bit_index.div_ceil(8) as usize;
        let word = self.cache.to_le_bytes();
        self.write_base(&word[..bytes])?;
        trace!(
            "{}: flushed {} bits as {} bytes",
            self.label(),
            self.cache_bit_index,
            bytes
        );
        self.reset_cache();
        Ok(())
    }

    fn emit_word(&mut self) -> Result<()> {
        let word = self.cache.to_le_bytes();
        self.write_base(&word)?;
        self.cache = 0;
        self.cache_bit_index = 0;
        Ok(())
    }

    /// Send bytes to the base stream, clipped at the window end. Bytes past
    /// the end are dropped, or rejected when the overflow policy covers
    /// writing.
    fn write_base(&mut self, bytes: &[u8]) -> Result<()> {
        let mut len = bytes.len();
        let room = self
            .window_remaining()?
            .map(|remaining| usize::try_from(remaining).unwrap_or(usize::MAX))
            .filter(|&room| room < len);
        if let Some(room) = room {
            let end = self.end_offset;
            self.overflow_policy(StreamMode::Write, || OxiBitError::WindowExceeded { end })?;
            trace!(
                "{}: dropping {} bytes past the window end",
                self.label(),
                len - room
            );
            len = room;
        }
        if len > 0 {
            self.base_mut()?.write_chunk(&bytes[..len])?;
        }
        Ok(())
    }

    /// Whether the read source is used up: the cache is empty and no more
    /// bytes can be fetched from the window.
    pub(crate) fn source_exhausted(&mut self) -> Result<bool> {
        debug_assert!(self.is_reading());
        if self.cache_bit_index < self.cache_bits_streamed {
            return Ok(false);
        }
        Ok(!self.fill_cache()?)
    }

    /// Pack the low `bits` bits of `value` (1-32) into the cache.
    pub(crate) fn put_word(&mut self, value: u32, bits: u32) -> Result<()> {
        debug_assert!((1..=WORD_BITS).contains(&bits));
        debug_assert!(self.cache_bit_index < WORD_BITS);

        let value = value & word::mask(bits);
        let free = WORD_BITS - self.cache_bit_index;
        self.cache = word::insert(self.cache, value, self.cache_bit_index);

        if bits < free {
            self.cache_bit_index += bits;
            return Ok(());
        }

        self.emit_word()?;
        let spill = bits - free;
        if spill > 0 {
            // free < WORD_BITS here, since a spill needs a partly used word
            self.cache = value >> free;
            self.cache_bit_index = spill;
        }
        Ok(())
    }

    /// Unpack `bits` bits (1-32) from the cache, refilling it as needed.
    pub(crate) fn take_word(&mut self, bits: u32, sign_extend: bool) -> Result<u32> {
        debug_assert!((1..=WORD_BITS).contains(&bits));

        let mut value = 0u32;
        let mut filled = 0u32;
        while filled < bits {
            if self.cache_bit_index == self.cache_bits_streamed && !self.fill_cache()? {
                self.overflow_policy(StreamMode::Read, || {
                    OxiBitError::end_of_stream(bits, filled)
                })?;
                trace!(
                    "{}: end of stream, padding {} bits",
                    self.label(),
                    bits - filled
                );
                break;
            }

            let available = self.cache_bits_streamed - self.cache_bit_index;
            let take = (bits - filled).min(available);
            let chunk = word::extract(self.cache, self.cache_bit_index, take);
            value |= chunk << filled;
            filled += take;
            self.cache_bit_index += take;

            if self.cache_bit_index == self.cache_bits_streamed {
                self.reset_cache();
            }
        }

        Ok(if sign_extend {
            word::sign_extend(value, bits)
        } else {
            value
        })
    }

    /// Write the low `bits` bits (1-32) of `value`.
    ///
    /// A value needing more than `bits` bits is truncated, or rejected when
    /// the overflow policy covers writing.
    pub fn write_word(&mut self, value: u32, bits: u32) -> Result<()> {
        check_bits(bits, WORD_BITS)?;
        self.ensure_mode(StreamMode::Write)?;
        if !word::fits_unsigned(u64::from(value), bits) {
            self.overflow_policy(StreamMode::Write, || {
                OxiBitError::overflow(u64::from(value), bits)
            })?;
        }
        self.put_word(value, bits)
    }

    /// Read `bits` bits (1-32), zero- or sign-extended to a word.
    ///
    /// At the end of the stream the missing bits read as zero, or an error is
    /// returned when the overflow policy covers reading.
    pub fn read_word(&mut self, bits: u32, sign_extend: bool) -> Result<u32> {
        check_bits(bits, WORD_BITS)?;
        self.ensure_mode(StreamMode::Read)?;
        self.take_word(bits, sign_extend)
    }

    /// Pack up to 64 bits; wide values go low half first.
    pub(crate) fn put_bits(&mut self, value: u64, bits: u32) -> Result<()> {
        if bits <= WORD_BITS {
            self.put_word(value as u32, bits)
        } else {
            self.put_word(value as u32, WORD_BITS)?;
            self.put_word((value >> WORD_BITS) as u32, bits - WORD_BITS)
        }
    }

    /// Unpack up to 64 bits; wide values come low half first.
    pub(crate) fn take_bits(&mut self, bits: u32, sign_extend: bool) -> Result<u64> {
        let raw = if bits <= WORD_BITS {
            u64::from(self.take_word(bits, false)?)
        } else {
            let low = self.take_word(WORD_BITS, false)?;
            let high = self.take_word(bits - WORD_BITS, false)?;
            (u64::from(high) << WORD_BITS) | u64::from(low)
        };
        Ok(if sign_extend {
            word::sign_extend64(raw, bits)
        } else {
            raw
        })
    }

    /// Write the low `bits` bits (1-64) of `value`.
    pub fn write_bits(&mut self, value: u64, bits: u32) -> Result<()> {
        check_bits(bits, u64::BITS)?;
        self.ensure_mode(StreamMode::Write)?;
        if !word::fits_unsigned(value, bits) {
            self.overflow_policy(StreamMode::Write, || OxiBitError::overflow(value, bits))?;
        }
        self.put_bits(value, bits)
    }

    /// Read `bits` bits (1-64), zero- or sign-extended to 64 bits.
    pub fn read_bits(&mut self, bits: u32, sign_extend: bool) -> Result<u64> {
        check_bits(bits, u64::BITS)?;
        self.ensure_mode(StreamMode::Read)?;
        self.take_bits(bits, sign_extend)
    }

    /// Whether the cursor sits on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.cache_bit_index % 8 == 0
    }

    /// Move to the next byte boundary: zero padding when writing, skipping
    /// the rest of the byte when reading.
    pub fn align_to_byte(&mut self) -> Result<()> {
        let remainder = self.cache_bit_index % 8;
        if remainder == 0 {
            return Ok(());
        }
        match self.mode {
            Some(StreamMode::Write) => self.put_word(0, 8 - remainder),
            Some(StreamMode::Read) => self.take_word(8 - remainder, false).map(|_| ()),
            None => self.ensure_mode(StreamMode::Write),
        }
    }

    /// Write whole bytes. The cursor must be byte aligned; an empty cache
    /// sends the bytes straight to the base stream.
    pub(crate) fn put_aligned_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        debug_assert!(self.is_byte_aligned());
        if self.cache_bit_index == 0 {
            self.write_base(bytes)?;
        } else {
            for &byte in bytes {
                self.put_word(u32::from(byte), 8)?;
            }
        }
        Ok(())
    }

    /// Read whole bytes at a byte-aligned cursor: drain the cache, then read
    /// the rest straight from the base stream.
    pub(crate) fn take_aligned_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert!(self.is_byte_aligned());

        let mut offset = 0;
        while offset < buf.len() && self.cache_bit_index < self.cache_bits_streamed {
            buf[offset] = self.take_word(8, false)? as u8;
            offset += 1;
        }
        if offset == buf.len() {
            return Ok(());
        }

        let mut want = buf.len() - offset;
        if let Some(remaining) = self.window_remaining()? {
            want = want.min(remaining.try_into().unwrap_or(usize::MAX));
        }
        let got = base::read_full(self.base_mut()?, &mut buf[offset..offset + want])?;
        offset += got;

        if offset < buf.len() {
            let missing = (buf.len() - offset) as u64 * 8;
            self.overflow_policy(StreamMode::Read, || {
                OxiBitError::end_of_stream(
                    u32::try_from(buf.len() as u64 * 8).unwrap_or(u32::MAX),
                    u32::try_from(offset as u64 * 8).unwrap_or(u32::MAX),
                )
            })?;
            trace!("{}: end of stream, padding {} bits", self.label(), missing);
            buf[offset..].fill(0);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Position tracking
    // ------------------------------------------------------------------

    /// Bit offset of the cursor from the start of the window.
    pub fn bit_position(&mut self) -> Result<u64> {
        let start = self.start_offset;
        let index = u64::from(self.cache_bit_index);
        let streamed = u64::from(self.cache_bits_streamed);
        let position = self.base_mut()?.tell()?;
        Ok((position.saturating_sub(start) * 8 + index).saturating_sub(streamed))
    }

    /// End of the window in bytes: the end offset, or the live base stream
    /// length.
    pub fn length(&mut self) -> Result<u64> {
        if self.end_offset != 0 {
            return Ok(self.end_offset);
        }
        Ok(self.base_mut()?.byte_len()?)
    }

    /// Size of the window in bits.
    pub fn bit_length(&mut self) -> Result<u64> {
        let start = self.start_offset;
        Ok(self.length()?.saturating_sub(start) * 8)
    }

    /// Return to the start of the window, flushing pending write bits.
    pub fn seek_to_start(&mut self) -> Result<()> {
        if !self.base_mut()?.can_seek() {
            return Err(base::unsupported("seeking").into());
        }
        self.flush_cache()?;
        self.reset_cache();
        let start = self.start_offset;
        self.base_mut()?.seek_to(start)?;
        debug!("{}: rewound to byte {}", self.label(), start);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Flush pending write bits and the base stream.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_cache()?;
        self.base_mut()?.sync()?;
        Ok(())
    }

    /// Close the stream.
    ///
    /// Pending write bits are flushed first; a flush failure is returned but
    /// the stream is closed regardless. An owned base stream is flushed and
    /// dropped and `None` is returned; otherwise the base stream is handed
    /// back. Closing again is a no-op returning `Ok(None)`.
    pub fn close(&mut self) -> Result<Option<S>> {
        if self.base.is_none() {
            return Ok(None);
        }

        let flushed = self.flush_cache();
        let base = self.base.take();
        self.permissions = StreamAccess::empty();
        self.mode = None;
        self.reset_cache();
        debug!("{}: closed", self.label());
        flushed?;

        match base {
            Some(mut base) if self.owns_base => {
                base.sync()?;
                Ok(None)
            }
            base => Ok(base),
        }
    }

    /// Flush and return the base stream.
    pub fn into_inner(mut self) -> Result<S> {
        self.flush_cache()?;
        self.permissions = StreamAccess::empty();
        self.mode = None;
        self.base.take().ok_or(OxiBitError::Closed)
    }
}

fn check_bits(bits: u32, max: u32) -> Result<()> {
    if bits == 0 || bits > max {
        Err(OxiBitError::invalid_bit_count(bits, max))
    } else {
        Ok(())
    }
}

impl<S: BaseStream> Drop for BitStream<S> {
    fn drop(&mut self) {
        if self.base.is_none() {
            return;
        }
        if let Err(e) = self.flush_cache() {
            warn!("{}: failed to flush on drop: {}", self.label(), e);
        }
    }
}

impl<S: BaseStream> fmt::Debug for BitStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitStream")
            .field("name", &self.name)
            .field("permissions", &self.permissions)
            .field("mode", &self.mode)
            .field("window", &(self.start_offset, self.end_offset))
            .field("cache_bit_index", &self.cache_bit_index)
            .field("cache_bits_streamed", &self.cache_bits_streamed)
            .field("closed", &self.base.is_none())
            .finish()
    }
}
