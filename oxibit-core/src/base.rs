//! The byte stream underneath a [`BitStream`](crate::BitStream).
//!
//! [`BaseStream`] is the only I/O boundary of the engine. Anything that is
//! `Read + Write + Seek` already qualifies; the adapters in this module cover
//! streams that can only go one way or cannot seek.
//!
//! Primitive operations a stream does not support fail with
//! [`io::ErrorKind::Unsupported`], and the engine hands that error back to the
//! caller unchanged.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Build the error returned for an operation a stream cannot perform.
pub(crate) fn unsupported(operation: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("base stream does not support {operation}"),
    )
}

/// A byte-oriented stream a [`BitStream`](crate::BitStream) can wrap.
pub trait BaseStream {
    /// Whether `read_chunk` is available.
    fn can_read(&self) -> bool {
        false
    }

    /// Whether `write_chunk` is available.
    fn can_write(&self) -> bool {
        false
    }

    /// Whether `tell`, `seek_to` and `byte_len` are available.
    fn can_seek(&self) -> bool {
        false
    }

    /// Read up to `buf.len()` bytes, returning how many were read.
    /// `Ok(0)` means the end of the stream.
    fn read_chunk(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("reading"))
    }

    /// Write the whole buffer.
    fn write_chunk(&mut self, _buf: &[u8]) -> io::Result<()> {
        Err(unsupported("writing"))
    }

    /// Flush buffered bytes to the final destination.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Current byte position.
    fn tell(&mut self) -> io::Result<u64> {
        Err(unsupported("position queries"))
    }

    /// Move to an absolute byte position.
    fn seek_to(&mut self, _position: u64) -> io::Result<()> {
        Err(unsupported("seeking"))
    }

    /// Total length in bytes.
    fn byte_len(&mut self) -> io::Result<u64> {
        Err(unsupported("length queries"))
    }
}

/// Read until `buf` is full or the stream ends, returning the bytes read.
pub(crate) fn read_full<S: BaseStream + ?Sized>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read_chunk(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn seekable_len<T: Seek + ?Sized>(stream: &mut T) -> io::Result<u64> {
    let current = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    if current != end {
        stream.seek(SeekFrom::Start(current))?;
    }
    Ok(end)
}

impl<T: Read + Write + Seek> BaseStream for T {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        Write::flush(self)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Seek::stream_position(self)
    }

    fn seek_to(&mut self, position: u64) -> io::Result<()> {
        Seek::seek(self, SeekFrom::Start(position)).map(|_| ())
    }

    fn byte_len(&mut self) -> io::Result<u64> {
        seekable_len(self)
    }
}

macro_rules! adapter {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<T>(T);

        impl<T> $name<T> {
            /// Wrap a stream.
            pub fn new(inner: T) -> Self {
                Self(inner)
            }

            /// Get a reference to the wrapped stream.
            pub fn get_ref(&self) -> &T {
                &self.0
            }

            /// Get a mutable reference to the wrapped stream.
            pub fn get_mut(&mut self) -> &mut T {
                &mut self.0
            }

            /// Unwrap the stream.
            pub fn into_inner(self) -> T {
                self.0
            }
        }
    };
}

adapter!(
    /// A seekable stream that may only be read.
    ReadOnly
);

adapter!(
    /// A seekable stream that may only be written.
    WriteOnly
);

adapter!(
    /// A non-seekable stream that may only be read (pipes, sockets).
    ForwardReader
);

adapter!(
    /// A non-seekable stream that may only be written (pipes, sockets).
    ForwardWriter
);

impl<R: Read + Seek> BaseStream for ReadOnly<R> {
    fn can_read(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.0.stream_position()
    }

    fn seek_to(&mut self, position: u64) -> io::Result<()> {
        self.0.seek(SeekFrom::Start(position)).map(|_| ())
    }

    fn byte_len(&mut self) -> io::Result<u64> {
        seekable_len(&mut self.0)
    }
}

impl<W: Write + Seek> BaseStream for WriteOnly<W> {
    fn can_write(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write_all(buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.0.flush()
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.0.stream_position()
    }

    fn seek_to(&mut self, position: u64) -> io::Result<()> {
        self.0.seek(SeekFrom::Start(position)).map(|_| ())
    }

    fn byte_len(&mut self) -> io::Result<u64> {
        seekable_len(&mut self.0)
    }
}

impl<R: Read> BaseStream for ForwardReader<R> {
    fn can_read(&self) -> bool {
        true
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<W: Write> BaseStream for ForwardWriter<W> {
    fn can_write(&self) -> bool {
        true
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write_all(buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
