//! Physical file backend for memory-mapped I/O.
//!
//! [`Physical`] maps an SLB or OSI file into the address space so that large archives can be
//! walked with random access without reading them into memory upfront.

use super::Backend;
use crate::Result;

use memmap2::Mmap;
use std::{fs, path::Path};

/// A memory-mapped file on disk.
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Opens and maps the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped,
    /// and [`crate::Error::Empty`] for zero-length files (which cannot be mapped).
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(crate::Error::Empty);
        }

        // SAFETY: read-only mapping, the file must not be truncated while mapped.
        let mmap = unsafe { Mmap::map(&file) }?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if offset_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn physical() {
        let path = std::env::temp_dir().join(format!("sagekit-physical-{}.bin", std::process::id()));
        {
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(&[0x53, 0x4C, 0x42, 0x00, 0xAA, 0xBB]).unwrap();
        }

        let physical = Physical::new(&path).unwrap();
        assert_eq!(physical.len(), 6);
        assert_eq!(physical.data()[0], 0x53);
        assert_eq!(physical.data_slice(4, 2).unwrap(), &[0xAA, 0xBB]);
        assert!(physical.data_slice(5, 2).is_err());
        assert!(physical.data_slice(usize::MAX, 2).is_err());

        drop(physical);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            Physical::new("/definitely/not/here.slb"),
            Err(crate::Error::FileError(_))
        ));
    }
}
