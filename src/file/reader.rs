//! Seekable little-endian reader.
//!
//! [`BinaryReader`] wraps any `Read + Seek` source and provides bounds-checked reads of
//! the primitive types, raw byte blocks and strings that SLB tables are made of. Running
//! out of data is always fatal and reported as [`crate::Error::OutOfBounds`].

use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

use crate::{
    file::{
        io::{read_le, Primitive},
        Positioned,
    },
    Error, Result,
};

/// A seekable little-endian reader over an arbitrary byte source.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use sagekit::file::{BinaryReader, Positioned};
///
/// let mut reader = BinaryReader::new(Cursor::new(vec![0x2A, 0x00, 0x00, 0x00, 0xFF]));
/// assert_eq!(reader.read_le::<u32>()?, 42);
/// assert_eq!(reader.read_le::<i8>()?, -1);
/// assert_eq!(reader.position()?, 5);
/// # Ok::<(), sagekit::Error>(())
/// ```
pub struct BinaryReader<R> {
    inner: R,
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Wraps `inner`. Reading starts at its current position.
    pub fn new(inner: R) -> Self {
        BinaryReader { inner }
    }

    /// Returns the wrapped source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads one little-endian value.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a short read.
    pub fn read_le<T: Primitive>(&mut self) -> Result<T> {
        let mut buffer = [0u8; 8];
        let size = std::mem::size_of::<T>();
        self.read_exact(&mut buffer[..size])?;
        read_le(&buffer[..size])
    }

    /// Fills `buffer` completely.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the source ends first.
    pub fn read_exact(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buffer).map_err(|error| {
            if error.kind() == ErrorKind::UnexpectedEof {
                out_of_bounds_error!()
            } else {
                Error::FileError(error)
            }
        })
    }

    /// Reads a block of `len` raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Skips `count` bytes, which must all be present.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `count` bytes remain.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        let skipped = io::copy(&mut self.inner.by_ref().take(count), &mut io::sink())?;
        if skipped < count {
            return Err(out_of_bounds_error!());
        }
        Ok(())
    }

    /// Reads a string stored inline in a field of exactly `len` bytes.
    ///
    /// The field is zero padded; everything from the first NUL on is dropped.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a short read and
    /// [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let mut bytes = self.read_bytes(len)?;
        if let Some(end) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(end);
        }

        String::from_utf8(bytes).map_err(|error| malformed_error!("Invalid string - {}", error))
    }

    /// Reads a NUL terminated string, consuming the terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no terminator is found before the end of
    /// data and [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_cstring(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_le::<u8>()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }

        String::from_utf8(bytes).map_err(|error| malformed_error!("Invalid string - {}", error))
    }
}

impl<R: Read + Seek> Positioned for BinaryReader<R> {
    fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn reader(data: &[u8]) -> BinaryReader<Cursor<Vec<u8>>> {
        BinaryReader::new(Cursor::new(data.to_vec()))
    }

    #[test]
    fn read_mixed_widths() {
        let mut r = reader(&[
            0x01, // u8
            0x02, 0x01, // u16
            0xFF, 0xFF, 0xFF, 0xFF, // i32
            0x00, 0x00, 0x80, 0x3F, // f32
        ]);
        assert_eq!(r.read_le::<u8>().unwrap(), 1);
        assert_eq!(r.read_le::<u16>().unwrap(), 0x0102);
        assert_eq!(r.read_le::<i32>().unwrap(), -1);
        assert_eq!(r.read_le::<f32>().unwrap(), 1.0);
        assert_eq!(r.position().unwrap(), 11);
    }

    #[test]
    fn short_read_is_out_of_bounds() {
        let mut r = reader(&[0x01, 0x02]);
        assert!(matches!(r.read_le::<u32>(), Err(Error::OutOfBounds)));
    }

    #[test]
    fn fixed_string_stops_at_nul() {
        let mut r = reader(b"abc\0\0\0\0\0tail");
        assert_eq!(r.read_fixed_string(8).unwrap(), "abc");
        assert_eq!(r.position().unwrap(), 8);
    }

    #[test]
    fn fixed_string_full_width() {
        let mut r = reader(b"abcd");
        assert_eq!(r.read_fixed_string(4).unwrap(), "abcd");
    }

    #[test]
    fn cstring_consumes_terminator() {
        let mut r = reader(b"idle\0run\0");
        assert_eq!(r.read_cstring().unwrap(), "idle");
        assert_eq!(r.read_cstring().unwrap(), "run");
        assert!(r.read_cstring().is_err());
    }

    #[test]
    fn invalid_utf8() {
        let mut r = reader(&[0xFF, 0xFE, 0x00]);
        assert!(matches!(r.read_cstring(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn skip_and_seek() {
        let mut r = reader(&[0, 1, 2, 3, 4, 5]);
        r.skip(2).unwrap();
        assert_eq!(r.read_le::<u8>().unwrap(), 2);
        r.seek_to(5).unwrap();
        assert_eq!(r.read_le::<u8>().unwrap(), 5);
    }

    #[test]
    fn skip_past_end_is_out_of_bounds() {
        let mut r = reader(&[0x34, 0x12]);
        assert_eq!(r.read_le::<u16>().unwrap(), 0x1234);
        assert!(matches!(r.skip(2), Err(Error::OutOfBounds)));

        let mut r = reader(&[0, 1, 2]);
        r.skip(3).unwrap();
        assert!(matches!(r.skip(1), Err(Error::OutOfBounds)));
    }
}
