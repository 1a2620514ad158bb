//! Tree reader.
//!
//! Mirrors [`crate::slb::TreeWriter`]: fields are read in declaration order, offset-indirected
//! values are read at their offset and the position is restored afterwards, so a read
//! ends right behind the inline part of the record.

use std::{
    any::Any,
    io::{Read, Seek},
};

use crate::{
    config::CodecConfig,
    file::{BinaryReader, Positioned},
    slb::{
        builder::{schema_of, SlbRecord},
        schema::{CountWidth, DataNode, ListNode, ScalarKind, SchemaNode, SlbValue},
    },
    Error, Result,
};

/// Reads records according to their schema tree.
pub struct TreeReader<'r, R> {
    reader: &'r mut BinaryReader<R>,
    config: CodecConfig,
}

impl<'r, R: Read + Seek> TreeReader<'r, R> {
    /// Creates a tree reader on top of `reader`.
    pub fn new(reader: &'r mut BinaryReader<R>, config: CodecConfig) -> Self {
        TreeReader { reader, config }
    }

    /// Reads a `T` at the current position.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] for truncated data, [`Error::Malformed`] for invalid
    /// strings and schema errors from [`schema_of`].
    pub fn read<T: SlbRecord>(&mut self) -> Result<T> {
        let schema = schema_of::<T>()?;
        let record = self.read_record(&schema)?;
        record
            .downcast::<T>()
            .map(|record| *record)
            .map_err(|_| Error::NotImplemented(T::TYPE_NAME))
    }

    /// Reads a record described by `root` at the current position.
    ///
    /// # Errors
    /// See [`TreeReader::read`].
    pub fn read_record(&mut self, root: &DataNode) -> Result<Box<dyn Any + Send>> {
        let mut record = root.construct();
        for edge in root.edges() {
            log::trace!(
                "{}::{} at 0x{:X}",
                root.type_name(),
                edge.name(),
                self.reader.position()?
            );
            let value = self.read_node(edge.node())?;
            edge.set(record.as_mut(), value)?;
            self.reader.skip(edge.padding() as u64)?;
        }
        Ok(record)
    }

    /// Reads one value described by `node` at the current position.
    ///
    /// # Errors
    /// Returns [`Error::NotImplemented`] for a list node that is not behind an offset.
    pub fn read_node(&mut self, node: &SchemaNode) -> Result<SlbValue> {
        match node {
            SchemaNode::Scalar(kind) => self.read_scalar(*kind),
            SchemaNode::FixedString(len) => Ok(SlbValue::Str(self.reader.read_fixed_string(*len)?)),
            SchemaNode::CString => Ok(SlbValue::Str(self.reader.read_cstring()?)),
            SchemaNode::Data(data) => Ok(SlbValue::Record(self.read_record(data)?)),
            SchemaNode::Offset(offset) => match &offset.child {
                SchemaNode::List(list) => self.read_list(list),
                child => {
                    let position = self.reader.read_le::<u32>()?;
                    if position == 0 {
                        return Ok(default_value(child));
                    }
                    self.at_position(u64::from(position), |tree| tree.read_node(child))
                }
            },
            SchemaNode::List(_) => Err(Error::NotImplemented("list without offset")),
        }
    }

    fn read_scalar(&mut self, kind: ScalarKind) -> Result<SlbValue> {
        let reader = &mut *self.reader;
        Ok(match kind {
            ScalarKind::U8 => SlbValue::U8(reader.read_le()?),
            ScalarKind::I8 => SlbValue::I8(reader.read_le()?),
            ScalarKind::U16 => SlbValue::U16(reader.read_le()?),
            ScalarKind::I16 => SlbValue::I16(reader.read_le()?),
            ScalarKind::U32 => SlbValue::U32(reader.read_le()?),
            ScalarKind::I32 => SlbValue::I32(reader.read_le()?),
            ScalarKind::U64 => SlbValue::U64(reader.read_le()?),
            ScalarKind::I64 => SlbValue::I64(reader.read_le()?),
            ScalarKind::F32 => SlbValue::F32(reader.read_le()?),
            ScalarKind::F64 => SlbValue::F64(reader.read_le()?),
        })
    }

    fn read_count(&mut self, width: CountWidth) -> Result<u32> {
        Ok(match width {
            CountWidth::U16 => u32::from(self.reader.read_le::<u16>()?),
            CountWidth::U32 => self.reader.read_le::<u32>()?,
        })
    }

    fn read_list(&mut self, list: &ListNode) -> Result<SlbValue> {
        let count = self.read_count(list.count)?;
        if list.duplicate_count {
            let copy = self.read_count(list.count)?;
            if copy != count {
                if self.config.strict_duplicate_counts {
                    return Err(malformed_error!(
                        "Duplicated list count {} does not match {}",
                        copy,
                        count
                    ));
                }
                log::warn!("duplicated list count {} does not match {}, using the first", copy, count);
            }
        }

        let position = self.reader.read_le::<u32>()?;
        if count == 0 {
            return Ok(SlbValue::List(Vec::new()));
        }

        self.at_position(u64::from(position), |tree| {
            let mut items = Vec::with_capacity(count.min(0x1000) as usize);
            for _ in 0..count {
                items.push(tree.read_node(&list.element)?);
            }
            Ok(SlbValue::List(items))
        })
    }
}

impl<R: Read + Seek> Positioned for TreeReader<'_, R> {
    fn position(&mut self) -> Result<u64> {
        self.reader.position()
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.reader.seek_to(pos)
    }
}

/// Value of an offset-indirected field whose offset is 0.
fn default_value(node: &SchemaNode) -> SlbValue {
    match node {
        SchemaNode::Scalar(kind) => SlbValue::zero(*kind),
        SchemaNode::Data(data) => SlbValue::Record(data.construct()),
        SchemaNode::List(_) => SlbValue::List(Vec::new()),
        SchemaNode::FixedString(_) | SchemaNode::CString => SlbValue::Str(String::new()),
        SchemaNode::Offset(offset) => default_value(&offset.child),
    }
}
