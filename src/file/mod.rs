//! Asset file access and stream I/O.
//!
//! This module abstracts over where asset bytes come from and how they are read and written:
//!
//! - [`crate::file::File`] - A loaded asset file, backed by a memory map or an owned buffer
//! - [`crate::file::Backend`] - Trait for the different data sources
//! - [`crate::file::BinaryReader`] / [`crate::file::BinaryWriter`] - Seekable little-endian
//!   streams used by the SLB codec
//! - [`crate::file::Positioned`] / [`crate::file::PositionGuard`] - Scoped seek and restore
//! - [`crate::file::io`] - Slice level helpers used by the bytecode decoder
//!
//! # Examples
//!
//! ```rust
//! use sagekit::file::{File, Positioned};
//!
//! let file = File::from_mem(vec![0x10, 0x00, 0x00, 0x00])?;
//! let mut reader = file.reader();
//! assert_eq!(reader.read_le::<u32>()?, 16);
//! assert_eq!(reader.position()?, 4);
//! # Ok::<(), sagekit::Error>(())
//! ```

pub mod io;
mod memory;
mod physical;
mod position;
mod reader;
mod writer;

pub use memory::Memory;
pub use physical::Physical;
pub use position::{PositionGuard, Positioned};
pub use reader::BinaryReader;
pub use writer::BinaryWriter;

use std::{io::Cursor, path::Path};

use crate::{Error::Empty, Result};

/// Source of raw file bytes.
///
/// Implementations must be thread-safe so a loaded [`File`] can be shared between the
/// workers of [`crate::osi::Decompiler::decompile_all`].
pub trait Backend: Send + Sync {
    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// A loaded asset file.
///
/// # Examples
///
/// ```rust,no_run
/// use sagekit::file::File;
/// use std::path::Path;
///
/// let file = File::from_file(Path::new("data/units.slb"))?;
/// println!("{} bytes", file.len());
/// # Ok::<(), sagekit::Error>(())
/// ```
pub struct File {
    data: Box<dyn Backend>,
}

impl File {
    /// Memory-maps the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened and
    /// [`crate::Error::Empty`] if it has no content.
    pub fn from_file(path: &Path) -> Result<File> {
        Self::load(Physical::new(path)?)
    }

    /// Wraps an owned buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::load(Memory::new(data))
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(File {
            data: Box::new(data),
        })
    }

    /// Returns the size of the file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`, empty files are rejected on load.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the complete file contents.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the file.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Returns a seekable reader over the file contents, positioned at 0.
    #[must_use]
    pub fn reader(&self) -> BinaryReader<Cursor<&[u8]>> {
        BinaryReader::new(Cursor::new(self.data.data()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_buffer() {
        let file = File::from_mem(vec![0x53, 0x4C, 0x42, 0x00, 0x01]).unwrap();
        assert_eq!(file.len(), 5);
        assert!(!file.is_empty());
        assert_eq!(file.data_slice(0, 4).unwrap(), b"SLB\0");
        assert!(file.data_slice(4, 2).is_err());

        let mut reader = file.reader();
        reader.seek_to(4).unwrap();
        assert_eq!(reader.read_le::<u8>().unwrap(), 1);
    }

    #[test]
    fn load_empty() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Empty)));
    }
}
