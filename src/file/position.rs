//! Scoped save/seek/restore of a stream position.
//!
//! Offset-indirected data is always read and written "somewhere else, then come back".
//! [`PositionGuard`] captures the current position when created and seeks back to it when
//! dropped, so the original position is restored on every exit path, including `?` returns
//! out of a failing callback. [`Positioned::at_position`] wraps the common case.
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use sagekit::file::{BinaryReader, Positioned};
//!
//! let mut reader = BinaryReader::new(Cursor::new(vec![0x01, 0x00, 0x2A, 0x00]));
//! let value: u16 = reader.at_position(2, |r| r.read_le())?;
//! assert_eq!(value, 42);
//! assert_eq!(reader.position()?, 0);
//! # Ok::<(), sagekit::Error>(())
//! ```

use std::ops::{Deref, DerefMut};

use crate::Result;

/// A stream with an absolute, settable position.
pub trait Positioned {
    /// Returns the current absolute position.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the backing stream cannot report its position.
    fn position(&mut self) -> Result<u64>;

    /// Moves to the absolute position `pos`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the backing stream rejects the seek.
    fn seek_to(&mut self, pos: u64) -> Result<()>;

    /// Runs `f` with the stream moved to `pos`, then restores the previous position.
    ///
    /// The position is restored whether `f` succeeds or fails. If `f` fails its error is
    /// returned; otherwise a failed restore is reported.
    ///
    /// # Errors
    /// Returns the error of `f`, or of the seek to `pos` or back.
    fn at_position<T, F>(&mut self, pos: u64, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let mut guard = PositionGuard::new(self)?;
        guard.seek_to(pos)?;
        let result = f(&mut *guard);
        let restored = guard.restore();

        let value = result?;
        restored?;
        Ok(value)
    }
}

/// Restores a saved stream position when dropped.
///
/// Dereferences to the wrapped stream, so reads and writes go through the guard while it
/// is alive. Use [`PositionGuard::restore`] to observe a failing restore; a restore from
/// `Drop` can only log it.
pub struct PositionGuard<'a, S: Positioned> {
    stream: &'a mut S,
    saved: u64,
    restored: bool,
}

impl<'a, S: Positioned> PositionGuard<'a, S> {
    /// Captures the current position of `stream`.
    ///
    /// # Errors
    /// Returns an error if the current position cannot be queried.
    pub fn new(stream: &'a mut S) -> Result<Self> {
        let saved = stream.position()?;
        Ok(PositionGuard {
            stream,
            saved,
            restored: false,
        })
    }

    /// The position that will be restored.
    #[must_use]
    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Seeks back to the saved position now and disarms the guard.
    ///
    /// # Errors
    /// Returns an error if the seek fails.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.stream.seek_to(self.saved)
    }
}

impl<S: Positioned> Deref for PositionGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stream
    }
}

impl<S: Positioned> DerefMut for PositionGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stream
    }
}

impl<S: Positioned> Drop for PositionGuard<'_, S> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }

        if let Err(error) = self.stream.seek_to(self.saved) {
            log::warn!("failed to restore stream position 0x{:X}: {}", self.saved, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::file::{BinaryReader, BinaryWriter};

    #[test]
    fn guard_restores_on_drop() {
        let mut reader = BinaryReader::new(Cursor::new(vec![0u8; 16]));
        reader.seek_to(3).unwrap();
        {
            let mut guard = PositionGuard::new(&mut reader).unwrap();
            guard.seek_to(12).unwrap();
            let _: u16 = guard.read_le().unwrap();
            assert_eq!(guard.saved(), 3);
        }
        assert_eq!(reader.position().unwrap(), 3);
    }

    #[test]
    fn at_position_restores_on_error() {
        let mut reader = BinaryReader::new(Cursor::new(vec![0u8; 4]));
        reader.seek_to(1).unwrap();

        let result: Result<u64> = reader.at_position(2, |r| r.read_le::<u64>());
        assert!(matches!(result, Err(crate::Error::OutOfBounds)));
        assert_eq!(reader.position().unwrap(), 1);
    }

    #[test]
    fn at_position_patches_writer() {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        writer.write_le(0u32).unwrap();
        writer.write_le(0xFFu8).unwrap();
        writer
            .at_position(0, |w| w.write_le(0xDEADBEEFu32))
            .unwrap();
        assert_eq!(writer.position().unwrap(), 5);
        assert_eq!(
            writer.into_inner().into_inner(),
            vec![0xEF, 0xBE, 0xAD, 0xDE, 0xFF]
        );
    }
}
