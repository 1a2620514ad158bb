//! SLB container framing.
//!
//! ```text
//! 0x00  [u8; 4]  magic, chosen per table kind
//! 0x04  record   inline part of the root record
//! ....           out-of-line data, offsets are absolute
//! ....           zero padding up to the footer alignment
//! ```

use std::io::{Cursor, Read, Seek, Write};

use crate::{
    config::CodecConfig,
    file::{BinaryReader, BinaryWriter, File},
    slb::{builder::SlbRecord, reader::TreeReader, writer::TreeWriter},
    Error, Result,
};

/// Reads and writes one kind of SLB table.
///
/// # Examples
///
/// ```rust
/// use sagekit::slb::{FieldAttrs, RecordBuilder, SlbContainer, SlbRecord};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Trigger {
///     frame: u32,
///     event: String,
/// }
///
/// impl SlbRecord for Trigger {
///     const TYPE_NAME: &'static str = "Trigger";
///
///     fn describe(fields: &mut RecordBuilder<Self>) {
///         fields
///             .field("frame", FieldAttrs::new(), |t| &t.frame, |t, v| t.frame = v)
///             .field("event", FieldAttrs::new().offset(), |t| &t.event, |t, v| t.event = v);
///     }
/// }
///
/// let container = SlbContainer::new(*b"TRG\0");
/// let trigger = Trigger { frame: 12, event: "hit".into() };
///
/// let bytes = container.to_bytes(&trigger)?;
/// assert_eq!(bytes.len(), 16);
/// assert_eq!(container.from_bytes::<Trigger>(&bytes)?, trigger);
/// # Ok::<(), sagekit::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SlbContainer {
    magic: [u8; 4],
    config: CodecConfig,
}

impl SlbContainer {
    /// Creates a container with `magic` and the default configuration.
    #[must_use]
    pub fn new(magic: [u8; 4]) -> Self {
        Self::with_config(magic, CodecConfig::default())
    }

    /// Creates a container with `magic` and `config`.
    #[must_use]
    pub fn with_config(magic: [u8; 4], config: CodecConfig) -> Self {
        SlbContainer { magic, config }
    }

    /// The magic this container reads and writes.
    #[must_use]
    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    /// Writes magic, `value` and the footer padding.
    ///
    /// # Errors
    /// See [`TreeWriter::write`].
    pub fn write<T: SlbRecord, W: Write + Seek>(
        &self,
        writer: &mut BinaryWriter<W>,
        value: &T,
    ) -> Result<()> {
        writer.write_bytes(&self.magic)?;
        TreeWriter::new(writer, self.config).write(value)?;
        writer.align(self.config.footer_alignment)?;
        writer.flush()
    }

    /// Serializes `value` into a new buffer.
    ///
    /// # Errors
    /// See [`SlbContainer::write`].
    pub fn to_bytes<T: SlbRecord>(&self, value: &T) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()));
        self.write(&mut writer, value)?;
        Ok(writer.into_inner().into_inner())
    }

    /// Checks the magic and reads a `T`.
    ///
    /// # Errors
    /// Returns [`Error::BadMagic`] if the magic differs, otherwise see
    /// [`TreeReader::read`].
    pub fn read<T: SlbRecord, R: Read + Seek>(&self, reader: &mut BinaryReader<R>) -> Result<T> {
        let mut found = [0u8; 4];
        reader.read_exact(&mut found)?;
        if found != self.magic {
            return Err(Error::BadMagic {
                expected: self.magic,
                found,
            });
        }

        TreeReader::new(reader, self.config).read()
    }

    /// Reads a `T` from an in-memory buffer.
    ///
    /// # Errors
    /// Returns [`Error::Empty`] for an empty buffer, otherwise see [`SlbContainer::read`].
    pub fn from_bytes<T: SlbRecord>(&self, data: &[u8]) -> Result<T> {
        if data.is_empty() {
            return Err(Error::Empty);
        }
        self.read(&mut BinaryReader::new(Cursor::new(data)))
    }

    /// Reads a `T` from a loaded file.
    ///
    /// # Errors
    /// See [`SlbContainer::read`].
    pub fn load<T: SlbRecord>(&self, file: &File) -> Result<T> {
        self.read(&mut file.reader())
    }
}
