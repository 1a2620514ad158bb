//! Seekable little-endian writer.
//!
//! [`BinaryWriter`] is the write-side mirror of [`crate::file::BinaryReader`]: primitive
//! values, byte blocks, zero padding and alignment over any `Write + Seek` sink. Seeking
//! back to patch previously written placeholders goes through
//! [`crate::file::Positioned::at_position`].

use std::io::{Seek, SeekFrom, Write};

use crate::{
    file::{io::Primitive, Positioned},
    Result,
};

/// A seekable little-endian writer over an arbitrary byte sink.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use sagekit::file::{BinaryWriter, Positioned};
///
/// let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
/// writer.write_le(7u16)?;
/// writer.align(4)?;
/// assert_eq!(writer.position()?, 4);
/// assert_eq!(writer.into_inner().into_inner(), vec![7, 0, 0, 0]);
/// # Ok::<(), sagekit::Error>(())
/// ```
pub struct BinaryWriter<W> {
    inner: W,
}

impl<W: Write + Seek> BinaryWriter<W> {
    /// Wraps `inner`. Writing starts at its current position.
    pub fn new(inner: W) -> Self {
        BinaryWriter { inner }
    }

    /// Returns the wrapped sink.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Writes one little-endian value.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the sink fails.
    pub fn write_le<T: Primitive>(&mut self, value: T) -> Result<()> {
        self.inner.write_all(value.to_le_bytes().as_ref())?;
        Ok(())
    }

    /// Writes a raw block of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the sink fails.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Writes `count` zero bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the sink fails.
    pub fn write_zeros(&mut self, count: usize) -> Result<()> {
        const ZEROS: [u8; 64] = [0; 64];

        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(ZEROS.len());
            self.inner.write_all(&ZEROS[..chunk])?;
            remaining -= chunk;
        }
        Ok(())
    }

    /// Writes `value` into a field of exactly `len` bytes, zero padded.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the string does not fit or contains a NUL byte.
    pub fn write_fixed_string(&mut self, value: &str, len: usize) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > len {
            return Err(malformed_error!(
                "String '{}' does not fit into {} bytes",
                value,
                len
            ));
        }
        if bytes.contains(&0) {
            return Err(malformed_error!("String '{}' contains a NUL byte", value.escape_debug()));
        }

        self.write_bytes(bytes)?;
        self.write_zeros(len - bytes.len())
    }

    /// Writes `value` followed by a NUL terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `value` contains a NUL byte.
    pub fn write_cstring(&mut self, value: &str) -> Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(malformed_error!("String '{}' contains a NUL byte", value.escape_debug()));
        }

        self.write_bytes(value.as_bytes())?;
        self.write_le(0u8)
    }

    /// Pads with zero bytes until the position is a multiple of `alignment`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the sink fails.
    pub fn align(&mut self, alignment: u64) -> Result<()> {
        if alignment <= 1 {
            return Ok(());
        }

        let position = self.position()?;
        let remainder = position % alignment;
        if remainder != 0 {
            let padding = usize::try_from(alignment - remainder)
                .map_err(|_| malformed_error!("Alignment {} too large", alignment))?;
            self.write_zeros(padding)?;
        }
        Ok(())
    }

    /// Flushes the wrapped sink.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the sink fails.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> Positioned for BinaryWriter<W> {
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

    fn writer() -> BinaryWriter<Cursor<Vec<u8>>> {
        BinaryWriter::new(Cursor::new(Vec::new()))
    }

    #[test]
    fn write_mixed_widths() {
        let mut w = writer();
        w.write_le(1u8).unwrap();
        w.write_le(-2i16).unwrap();
        w.write_le(1.0f32).unwrap();
        assert_eq!(
            w.into_inner().into_inner(),
            vec![0x01, 0xFE, 0xFF, 0x00, 0x00, 0x80, 0x3F]
        );
    }

    #[test]
    fn fixed_string_padding() {
        let mut w = writer();
        w.write_fixed_string("ab", 5).unwrap();
        assert_eq!(w.into_inner().into_inner(), b"ab\0\0\0".to_vec());
    }

    #[test]
    fn fixed_string_too_long() {
        let mut w = writer();
        assert!(w.write_fixed_string("abcdef", 4).is_err());
        assert_eq!(w.position().unwrap(), 0);
    }

    #[test]
    fn fixed_string_with_nul() {
        let mut w = writer();
        assert!(matches!(
            w.write_fixed_string("a\0b", 4),
            Err(crate::Error::Malformed { .. })
        ));
        assert_eq!(w.position().unwrap(), 0);
    }

    #[test]
    fn cstring_terminated() {
        let mut w = writer();
        w.write_cstring("run").unwrap();
        assert_eq!(w.into_inner().into_inner(), b"run\0".to_vec());
    }

    #[test]
    fn align_pads_with_zeros() {
        let mut w = writer();
        w.write_le(0xAAu8).unwrap();
        w.align(4).unwrap();
        w.align(4).unwrap();
        assert_eq!(w.into_inner().into_inner(), vec![0xAA, 0, 0, 0]);
    }

    #[test]
    fn large_zero_run() {
        let mut w = writer();
        w.write_zeros(130).unwrap();
        assert_eq!(w.position().unwrap(), 130);
    }
}
