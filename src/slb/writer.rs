//! Tree writer with deferred back-patching.
//!
//! [`TreeWriter::write_record`] writes the inline part of a record and returns one
//! [`PendingOffset`] per offset placeholder it left behind. [`TreeWriter::resolve`] drains
//! such a queue: for each entry it takes the current position as the payload position,
//! patches it into the placeholder, writes the payload inline and resolves the entries
//! that payload produced before moving on to the next one.
//!
//! The resulting order is breadth-first within a level and depth-first across levels:
//! all fields of a record (or all entries of a list) are written before any of their
//! out-of-line data, in declaration order.
//!
//! ```text
//! record    | a: u32 | b: offset -> B | c: count, offset -> C |
//! B         | inline part of B |
//! B's data  | everything B's fields point to |
//! C         | entry 0 | entry 1 | ...
//! C's data  | out-of-line data of entry 0, entry 1, ... |
//! ```

use std::{
    any::Any,
    io::{Seek, Write},
};

use crate::{
    config::CodecConfig,
    file::{BinaryWriter, Positioned},
    slb::{
        builder::{schema_of, SlbRecord},
        schema::{CountWidth, DataNode, ListNode, SchemaNode, SlbRef},
    },
    Error, Result,
};

/// An offset placeholder waiting for its payload.
#[derive(Debug)]
pub struct PendingOffset<'a> {
    /// Stream position of the 4 byte placeholder
    pub position: u64,
    /// Layout of the payload
    pub node: &'a SchemaNode,
    /// The payload
    pub value: SlbRef<'a>,
}

/// Writes records according to their schema tree.
pub struct TreeWriter<'w, W> {
    writer: &'w mut BinaryWriter<W>,
    config: CodecConfig,
}

impl<'w, W: Write + Seek> TreeWriter<'w, W> {
    /// Creates a tree writer on top of `writer`.
    pub fn new(writer: &'w mut BinaryWriter<W>, config: CodecConfig) -> Self {
        TreeWriter { writer, config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Writes `value` with all its out-of-line data.
    ///
    /// # Errors
    /// Returns [`Error::OffsetTooLarge`] if data has to be placed beyond 4 GiB, schema
    /// errors from [`schema_of`] and I/O errors from the sink.
    pub fn write<T: SlbRecord>(&mut self, value: &T) -> Result<()> {
        let schema = schema_of::<T>()?;
        let pending = self.write_record(value, &schema)?;
        self.resolve(pending)
    }

    /// Writes the inline part of `value` and returns the placeholders to patch.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] before writing anything if `value` is not of the
    /// type `root` describes, and [`Error::NotImplemented`] for values that do not fit
    /// their schema node.
    pub fn write_record<'a>(
        &mut self,
        value: &'a dyn Any,
        root: &'a DataNode,
    ) -> Result<Vec<PendingOffset<'a>>> {
        if value.type_id() != root.type_id() {
            return Err(Error::InvalidArgument(format!(
                "value is not a {}",
                root.type_name()
            )));
        }

        let mut pending = Vec::new();
        for edge in root.edges() {
            log::trace!(
                "{}::{} at 0x{:X}",
                root.type_name(),
                edge.name(),
                self.writer.position()?
            );
            let field = edge.get(value)?;
            pending.extend(self.write_node(edge.node(), field)?);
            self.writer.write_zeros(edge.padding())?;
        }
        Ok(pending)
    }

    /// Writes the inline form of `value` as described by `node`.
    ///
    /// # Errors
    /// Returns [`Error::NotImplemented`] naming the value kind if it does not match
    /// `node`, or the node kind if it has no inline form.
    pub fn write_node<'a>(
        &mut self,
        node: &'a SchemaNode,
        value: SlbRef<'a>,
    ) -> Result<Vec<PendingOffset<'a>>> {
        match (node, value) {
            (SchemaNode::Scalar(_), value) => {
                self.write_scalar(node, &value)?;
                Ok(Vec::new())
            }
            (SchemaNode::FixedString(len), SlbRef::Str(value)) => {
                self.writer.write_fixed_string(value, *len)?;
                Ok(Vec::new())
            }
            (SchemaNode::CString, SlbRef::Str(value)) => {
                self.writer.write_cstring(value)?;
                Ok(Vec::new())
            }
            (SchemaNode::Data(data), SlbRef::Record(record)) => self.write_record(record, data),
            (SchemaNode::Offset(offset), value) => {
                if let (SchemaNode::List(list), SlbRef::List(items)) = (&offset.child, &value) {
                    self.write_count(list, items.len())?;
                }
                let position = self.writer.position()?;
                self.writer.write_le(0u32)?;
                Ok(vec![PendingOffset {
                    position,
                    node: &offset.child,
                    value,
                }])
            }
            (SchemaNode::List(_), _) => Err(Error::NotImplemented("list without offset")),
            (_, value) => Err(Error::NotImplemented(value.kind_name())),
        }
    }

    fn write_scalar(&mut self, node: &SchemaNode, value: &SlbRef<'_>) -> Result<()> {
        use crate::slb::schema::ScalarKind as K;

        let SchemaNode::Scalar(kind) = node else {
            return Err(Error::NotImplemented(node.kind_name()));
        };
        match (kind, value) {
            (K::U8, SlbRef::U8(v)) => self.writer.write_le(*v),
            (K::I8, SlbRef::I8(v)) => self.writer.write_le(*v),
            (K::U16, SlbRef::U16(v)) => self.writer.write_le(*v),
            (K::I16, SlbRef::I16(v)) => self.writer.write_le(*v),
            (K::U32, SlbRef::U32(v)) => self.writer.write_le(*v),
            (K::I32, SlbRef::I32(v)) => self.writer.write_le(*v),
            (K::U64, SlbRef::U64(v)) => self.writer.write_le(*v),
            (K::I64, SlbRef::I64(v)) => self.writer.write_le(*v),
            (K::F32, SlbRef::F32(v)) => self.writer.write_le(*v),
            (K::F64, SlbRef::F64(v)) => self.writer.write_le(*v),
            _ => Err(Error::NotImplemented(value.kind_name())),
        }
    }

    fn write_count(&mut self, list: &ListNode, len: usize) -> Result<()> {
        let copies = if list.duplicate_count { 2 } else { 1 };
        match list.count {
            CountWidth::U16 => {
                let count = u16::try_from(len).map_err(|_| {
                    Error::InvalidArgument(format!("{len} list entries do not fit a u16 count"))
                })?;
                for _ in 0..copies {
                    self.writer.write_le(count)?;
                }
            }
            CountWidth::U32 => {
                let count = u32::try_from(len).map_err(|_| {
                    Error::InvalidArgument(format!("{len} list entries do not fit a u32 count"))
                })?;
                for _ in 0..copies {
                    self.writer.write_le(count)?;
                }
            }
        }
        Ok(())
    }

    /// Places every pending payload at the end of the stream and patches its offset.
    ///
    /// # Errors
    /// Returns [`Error::OffsetTooLarge`] if a payload would start beyond `0xFFFFFFFF`;
    /// neither the offset nor the payload is written in that case.
    pub fn resolve(&mut self, pending: Vec<PendingOffset<'_>>) -> Result<()> {
        for entry in pending {
            let target = self.writer.position()?;
            let offset = u32::try_from(target).map_err(|_| Error::OffsetTooLarge(target))?;
            self.writer
                .at_position(entry.position, |writer| writer.write_le(offset))?;
            log::trace!(
                "patched 0x{:X} -> 0x{:X} ({})",
                entry.position,
                offset,
                entry.node.kind_name()
            );

            let nested = self.write_payload(entry.node, entry.value)?;
            self.resolve(nested)?;
        }
        Ok(())
    }

    fn write_payload<'a>(
        &mut self,
        node: &'a SchemaNode,
        value: SlbRef<'a>,
    ) -> Result<Vec<PendingOffset<'a>>> {
        match (node, value) {
            (SchemaNode::List(list), SlbRef::List(items)) => {
                let mut pending = Vec::new();
                for item in items {
                    pending.extend(self.write_node(&list.element, item)?);
                }
                Ok(pending)
            }
            (SchemaNode::List(_), value) => Err(Error::NotImplemented(value.kind_name())),
            (node, value) => self.write_node(node, value),
        }
    }
}
