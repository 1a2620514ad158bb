//! Schema tree of the SLB tree codec.
//!
//! A record type is described once by a [`DataNode`]: an ordered list of [`Edge`]s, one
//! per serialized field. Each edge knows how to extract the field value from a record
//! and how to inject a decoded value back, and points to the [`SchemaNode`] that decides
//! the on-disk layout of that value:
//!
//! | Node                         | Inline bytes                         | Out-of-line data           |
//! |------------------------------|--------------------------------------|----------------------------|
//! | [`SchemaNode::Scalar`]       | the value                            |                            |
//! | [`SchemaNode::FixedString`]  | the string, zero padded              |                            |
//! | [`SchemaNode::Data`]         | the fields of the nested record      |                            |
//! | [`SchemaNode::Offset`]       | `u32` absolute offset                | the child value            |
//! | `Offset` over a [`ListNode`] | count, optional duplicate, `u32` offset | the entries, back to back |
//!
//! [`SchemaNode::CString`] and [`SchemaNode::List`] only ever appear as the child of an
//! [`OffsetNode`]. Schema trees are immutable once built and shared through `Arc`; all
//! state of a read or write pass lives in [`crate::slb::TreeReader`] and
//! [`crate::slb::TreeWriter`].

use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

use strum::{AsRefStr, Display, EnumIter};

use crate::Result;

/// Fixed-width numeric field types.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ScalarKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ScalarKind {
    /// Encoded size in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            ScalarKind::U8 | ScalarKind::I8 => 1,
            ScalarKind::U16 | ScalarKind::I16 => 2,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::F32 => 4,
            ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => 8,
        }
    }
}

/// Width of the element count stored in front of a list offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountWidth {
    /// 2 byte count
    U16,
    /// 4 byte count
    U32,
}

/// A borrowed field value on its way to the writer.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub enum SlbRef<'a> {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(&'a str),
    Record(&'a dyn Any),
    List(Vec<SlbRef<'a>>),
}

/// An owned field value produced by the reader.
#[allow(missing_docs)]
#[derive(Debug)]
pub enum SlbValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Record(Box<dyn Any + Send>),
    List(Vec<SlbValue>),
}

impl SlbRef<'_> {
    /// Short name of the value kind, used in errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SlbRef::U8(_) => "u8",
            SlbRef::I8(_) => "i8",
            SlbRef::U16(_) => "u16",
            SlbRef::I16(_) => "i16",
            SlbRef::U32(_) => "u32",
            SlbRef::I32(_) => "i32",
            SlbRef::U64(_) => "u64",
            SlbRef::I64(_) => "i64",
            SlbRef::F32(_) => "f32",
            SlbRef::F64(_) => "f64",
            SlbRef::Str(_) => "string",
            SlbRef::Record(_) => "record",
            SlbRef::List(_) => "list",
        }
    }
}

impl SlbValue {
    /// Short name of the value kind, used in errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SlbValue::U8(_) => "u8",
            SlbValue::I8(_) => "i8",
            SlbValue::U16(_) => "u16",
            SlbValue::I16(_) => "i16",
            SlbValue::U32(_) => "u32",
            SlbValue::I32(_) => "i32",
            SlbValue::U64(_) => "u64",
            SlbValue::I64(_) => "i64",
            SlbValue::F32(_) => "f32",
            SlbValue::F64(_) => "f64",
            SlbValue::Str(_) => "string",
            SlbValue::Record(_) => "record",
            SlbValue::List(_) => "list",
        }
    }

    /// Zero value of `kind`.
    #[must_use]
    pub fn zero(kind: ScalarKind) -> SlbValue {
        match kind {
            ScalarKind::U8 => SlbValue::U8(0),
            ScalarKind::I8 => SlbValue::I8(0),
            ScalarKind::U16 => SlbValue::U16(0),
            ScalarKind::I16 => SlbValue::I16(0),
            ScalarKind::U32 => SlbValue::U32(0),
            ScalarKind::I32 => SlbValue::I32(0),
            ScalarKind::U64 => SlbValue::U64(0),
            ScalarKind::I64 => SlbValue::I64(0),
            ScalarKind::F32 => SlbValue::F32(0.0),
            ScalarKind::F64 => SlbValue::F64(0.0),
        }
    }
}

/// Extracts a field value from a record and injects a decoded value into it.
///
/// Implemented by the typed accessors [`crate::slb::RecordBuilder`] creates; the record
/// is passed type erased because one schema tree serves every record type.
pub trait Accessor: Send + Sync {
    /// Borrows the field out of `record`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotImplemented`] if `record` is not of the declaring type.
    fn get<'a>(&self, record: &'a dyn Any) -> Result<SlbRef<'a>>;

    /// Stores `value` into the field of `record`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotImplemented`] if `record` or `value` has the wrong type.
    fn set(&self, record: &mut dyn Any, value: SlbValue) -> Result<()>;
}

/// One serialized field of a record.
pub struct Edge {
    name: &'static str,
    node: SchemaNode,
    padding: usize,
    accessor: Box<dyn Accessor>,
}

impl Edge {
    pub(crate) fn new(
        name: &'static str,
        node: SchemaNode,
        padding: usize,
        accessor: Box<dyn Accessor>,
    ) -> Self {
        Edge {
            name,
            node,
            padding,
            accessor,
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Layout of the field value.
    #[must_use]
    pub fn node(&self) -> &SchemaNode {
        &self.node
    }

    /// Zero bytes following the field.
    #[must_use]
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Extracts the field value from `record`.
    ///
    /// # Errors
    /// See [`Accessor::get`].
    pub fn get<'a>(&self, record: &'a dyn Any) -> Result<SlbRef<'a>> {
        self.accessor.get(record)
    }

    /// Injects `value` into `record`.
    ///
    /// # Errors
    /// See [`Accessor::set`].
    pub fn set(&self, record: &mut dyn Any, value: SlbValue) -> Result<()> {
        self.accessor.set(record, value)
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("name", &self.name)
            .field("node", &self.node)
            .field("padding", &self.padding)
            .finish_non_exhaustive()
    }
}

/// The schema of one record type.
pub struct DataNode {
    type_name: &'static str,
    type_id: TypeId,
    construct: fn() -> Box<dyn Any + Send>,
    edges: Vec<Edge>,
}

impl DataNode {
    pub(crate) fn new(
        type_name: &'static str,
        type_id: TypeId,
        construct: fn() -> Box<dyn Any + Send>,
        edges: Vec<Edge>,
    ) -> Self {
        DataNode {
            type_name,
            type_id,
            construct,
            edges,
        }
    }

    /// Name of the record type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `TypeId` of the record type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Serialized fields in declaration order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Creates a default record to read fields into.
    #[must_use]
    pub fn construct(&self) -> Box<dyn Any + Send> {
        (self.construct)()
    }

    /// Number of inline bytes of one record, out-of-line data excluded.
    #[must_use]
    pub fn inline_size(&self) -> usize {
        self.edges
            .iter()
            .map(|edge| edge.node.inline_size() + edge.padding)
            .sum()
    }
}

impl fmt::Debug for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataNode")
            .field("type_name", &self.type_name)
            .field("edges", &self.edges)
            .finish_non_exhaustive()
    }
}

/// A value stored elsewhere, referenced by a 4 byte absolute offset.
#[derive(Debug)]
pub struct OffsetNode {
    /// Layout of the referenced value
    pub child: SchemaNode,
}

/// A counted sequence of entries.
#[derive(Debug)]
pub struct ListNode {
    /// Width of the count
    pub count: CountWidth,
    /// The count is stored twice in a row
    pub duplicate_count: bool,
    /// Layout of each entry
    pub element: SchemaNode,
}

impl ListNode {
    /// Inline size of the count header, duplicate included.
    #[must_use]
    pub fn header_size(&self) -> usize {
        let width = match self.count {
            CountWidth::U16 => 2,
            CountWidth::U32 => 4,
        };
        if self.duplicate_count {
            width * 2
        } else {
            width
        }
    }
}

/// On-disk layout of a value.
#[derive(Debug)]
pub enum SchemaNode {
    /// Little-endian number
    Scalar(ScalarKind),
    /// String in a zero padded field of fixed length
    FixedString(usize),
    /// NUL terminated string
    CString,
    /// Nested record stored inline
    Data(Arc<DataNode>),
    /// Offset-indirected value
    Offset(Box<OffsetNode>),
    /// Counted list
    List(Box<ListNode>),
}

impl SchemaNode {
    /// Wraps `child` in an [`OffsetNode`].
    #[must_use]
    pub fn offset(child: SchemaNode) -> SchemaNode {
        SchemaNode::Offset(Box::new(OffsetNode { child }))
    }

    /// A counted list, stored behind an offset.
    #[must_use]
    pub fn list(count: CountWidth, duplicate_count: bool, element: SchemaNode) -> SchemaNode {
        SchemaNode::offset(SchemaNode::List(Box::new(ListNode {
            count,
            duplicate_count,
            element,
        })))
    }

    /// Number of inline bytes the node occupies.
    ///
    /// `CString` and bare `List` nodes have no inline form and report 0.
    #[must_use]
    pub fn inline_size(&self) -> usize {
        match self {
            SchemaNode::Scalar(kind) => kind.size(),
            SchemaNode::FixedString(len) => *len,
            SchemaNode::CString | SchemaNode::List(_) => 0,
            SchemaNode::Data(data) => data.inline_size(),
            SchemaNode::Offset(offset) => match &offset.child {
                SchemaNode::List(list) => list.header_size() + 4,
                _ => 4,
            },
        }
    }

    /// Short name of the node kind, used in errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaNode::Scalar(_) => "scalar",
            SchemaNode::FixedString(_) => "fixed string",
            SchemaNode::CString => "cstring",
            SchemaNode::Data(_) => "record",
            SchemaNode::Offset(_) => "offset",
            SchemaNode::List(_) => "list",
        }
    }
}
