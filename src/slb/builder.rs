//! Declarative record schemas.
//!
//! A record type opts into the codec by implementing [`SlbRecord`] and listing its fields
//! in [`SlbRecord::describe`]. Each field names an accessor pair and a set of layout
//! markers ([`FieldAttrs`]); fields that are not listed are not serialized. The first
//! request for a type builds its [`DataNode`] and stores it in a process-wide cache, so
//! the description runs once per type.
//!
//! # Examples
//!
//! ```rust
//! use sagekit::slb::{schema_of, FieldAttrs, RecordBuilder, SlbRecord};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Frame {
//!     duration: u16,
//!     sprite: String,
//!     hitboxes: Vec<u32>,
//! }
//!
//! impl SlbRecord for Frame {
//!     const TYPE_NAME: &'static str = "Frame";
//!
//!     fn describe(fields: &mut RecordBuilder<Self>) {
//!         fields
//!             .field("duration", FieldAttrs::new().padding(2), |f| &f.duration, |f, v| f.duration = v)
//!             .field("sprite", FieldAttrs::new().inline(16), |f| &f.sprite, |f, v| f.sprite = v)
//!             .field("hitboxes", FieldAttrs::new(), |f| &f.hitboxes, |f, v| f.hitboxes = v);
//!     }
//! }
//!
//! let schema = schema_of::<Frame>()?;
//! assert_eq!(schema.edges().len(), 3);
//! // u16 + 2 padding, 16 byte string, u32 count + u32 offset
//! assert_eq!(schema.inline_size(), 4 + 16 + 8);
//! # Ok::<(), sagekit::Error>(())
//! ```

use std::{
    any::{type_name, Any, TypeId},
    cell::RefCell,
    marker::PhantomData,
    sync::{Arc, OnceLock},
};

use bitflags::bitflags;
use dashmap::DashMap;

use crate::{
    slb::schema::{Accessor, CountWidth, DataNode, Edge, ScalarKind, SchemaNode, SlbRef, SlbValue},
    Error, Result,
};

bitflags! {
    /// Layout markers of a field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldFlags: u8 {
        /// The value is stored out of line behind a 4 byte offset
        const OFFSET = 0x01;
        /// The list count is stored twice in a row
        const DUPLICATE_COUNT = 0x02;
        /// The list count is 2 bytes wide instead of 4
        const COUNT_U16 = 0x04;
    }
}

/// Layout markers of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldAttrs {
    /// Offset and count markers
    pub flags: FieldFlags,
    /// Length of an inline fixed-length string field
    pub inline_length: Option<usize>,
    /// Zero bytes written after the field and skipped when reading
    pub padding: usize,
}

impl FieldAttrs {
    /// No markers: inline value, 4 byte list counts, no padding.
    #[must_use]
    pub const fn new() -> Self {
        FieldAttrs {
            flags: FieldFlags::empty(),
            inline_length: None,
            padding: 0,
        }
    }

    /// Marks the value as offset-indirected.
    #[must_use]
    pub const fn offset(mut self) -> Self {
        self.flags = self.flags.union(FieldFlags::OFFSET);
        self
    }

    /// Stores strings inline in a zero padded field of `len` bytes.
    #[must_use]
    pub const fn inline(mut self, len: usize) -> Self {
        self.inline_length = Some(len);
        self
    }

    /// Stores the list count twice.
    #[must_use]
    pub const fn duplicate_count(mut self) -> Self {
        self.flags = self.flags.union(FieldFlags::DUPLICATE_COUNT);
        self
    }

    /// Stores the list count as `u16`.
    #[must_use]
    pub const fn count_u16(mut self) -> Self {
        self.flags = self.flags.union(FieldFlags::COUNT_U16);
        self
    }

    /// Appends `bytes` of zero padding after the field.
    #[must_use]
    pub const fn padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    fn is_offset(&self) -> bool {
        self.flags.contains(FieldFlags::OFFSET)
    }

    fn has_count_markers(&self) -> bool {
        self.flags
            .intersects(FieldFlags::DUPLICATE_COUNT | FieldFlags::COUNT_U16)
    }

    fn count_width(&self) -> CountWidth {
        if self.flags.contains(FieldFlags::COUNT_U16) {
            CountWidth::U16
        } else {
            CountWidth::U32
        }
    }

    fn list(&self, element: SchemaNode) -> SchemaNode {
        SchemaNode::list(
            self.count_width(),
            self.flags.contains(FieldFlags::DUPLICATE_COUNT),
            element,
        )
    }

    fn single(&self, node: SchemaNode) -> std::result::Result<SchemaNode, &'static str> {
        if self.has_count_markers() {
            return Err("count markers on a field that is not a list");
        }
        Ok(if self.is_offset() {
            SchemaNode::offset(node)
        } else {
            node
        })
    }
}

/// A record type the tree codec can read and write.
pub trait SlbRecord: Default + Send + Sync + 'static {
    /// Name used in schema errors and logs.
    const TYPE_NAME: &'static str;

    /// Declares the serialized fields in on-disk order.
    fn describe(fields: &mut RecordBuilder<Self>);
}

/// A field value type other than a nested record.
///
/// Implemented for the fixed-width numbers, `String`, and `Vec`s of those.
pub trait FieldType: Sized + Send + Sync + 'static {
    /// Layout of a field of this type.
    ///
    /// # Errors
    /// Returns a description of the conflict if `attrs` cannot be applied.
    fn field_node(attrs: &FieldAttrs) -> std::result::Result<SchemaNode, &'static str>;

    /// Layout of a list entry of this type.
    ///
    /// # Errors
    /// Returns a description of the conflict if `attrs` cannot be applied.
    fn element_node(attrs: &FieldAttrs) -> std::result::Result<SchemaNode, &'static str>;

    /// Borrows the value for writing.
    fn encode(&self) -> SlbRef<'_>;

    /// Converts a decoded value back.
    ///
    /// # Errors
    /// Returns [`Error::NotImplemented`] naming the value kind if it does not match.
    fn decode(value: SlbValue) -> Result<Self>;
}

macro_rules! impl_scalar_field {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn field_node(attrs: &FieldAttrs) -> std::result::Result<SchemaNode, &'static str> {
                    if attrs.inline_length.is_some() {
                        return Err("inline length on a numeric field");
                    }
                    attrs.single(SchemaNode::Scalar(ScalarKind::$variant))
                }

                fn element_node(attrs: &FieldAttrs) -> std::result::Result<SchemaNode, &'static str> {
                    if attrs.inline_length.is_some() {
                        return Err("inline length on a numeric field");
                    }
                    Ok(SchemaNode::Scalar(ScalarKind::$variant))
                }

                fn encode(&self) -> SlbRef<'_> {
                    SlbRef::$variant(*self)
                }

                fn decode(value: SlbValue) -> Result<Self> {
                    match value {
                        SlbValue::$variant(value) => Ok(value),
                        other => Err(Error::NotImplemented(other.kind_name())),
                    }
                }
            }
        )*
    };
}

impl_scalar_field!(
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

impl FieldType for String {
    fn field_node(attrs: &FieldAttrs) -> std::result::Result<SchemaNode, &'static str> {
        if attrs.has_count_markers() {
            return Err("count markers on a field that is not a list");
        }
        match (attrs.inline_length, attrs.is_offset()) {
            (Some(_), true) => Err("both inline and offset-indirected"),
            (Some(len), false) => Ok(SchemaNode::FixedString(len)),
            (None, true) => Ok(SchemaNode::offset(SchemaNode::CString)),
            (None, false) => Err("string needs an inline length or an offset"),
        }
    }

    fn element_node(attrs: &FieldAttrs) -> std::result::Result<SchemaNode, &'static str> {
        match (attrs.inline_length, attrs.is_offset()) {
            (Some(_), true) => Err("both inline and offset-indirected"),
            (Some(len), false) => Ok(SchemaNode::FixedString(len)),
            (None, _) => Ok(SchemaNode::offset(SchemaNode::CString)),
        }
    }

    fn encode(&self) -> SlbRef<'_> {
        SlbRef::Str(self)
    }

    fn decode(value: SlbValue) -> Result<Self> {
        match value {
            SlbValue::Str(value) => Ok(value),
            other => Err(Error::NotImplemented(other.kind_name())),
        }
    }
}

impl<V: FieldType> FieldType for Vec<V> {
    fn field_node(attrs: &FieldAttrs) -> std::result::Result<SchemaNode, &'static str> {
        Ok(attrs.list(V::element_node(attrs)?))
    }

    fn element_node(_attrs: &FieldAttrs) -> std::result::Result<SchemaNode, &'static str> {
        Err("lists of lists")
    }

    fn encode(&self) -> SlbRef<'_> {
        SlbRef::List(self.iter().map(V::encode).collect())
    }

    fn decode(value: SlbValue) -> Result<Self> {
        match value {
            SlbValue::List(items) => items.into_iter().map(V::decode).collect(),
            other => Err(Error::NotImplemented(other.kind_name())),
        }
    }
}

fn record_ref<C: SlbRecord>(value: &C) -> SlbRef<'_> {
    SlbRef::Record(value)
}

fn record_value<C: SlbRecord>(value: SlbValue) -> Result<C> {
    match value {
        SlbValue::Record(record) => record
            .downcast::<C>()
            .map(|record| *record)
            .map_err(|_| Error::NotImplemented(C::TYPE_NAME)),
        other => Err(Error::NotImplemented(other.kind_name())),
    }
}

#[allow(clippy::ptr_arg)]
fn records_ref<C: SlbRecord>(values: &Vec<C>) -> SlbRef<'_> {
    SlbRef::List(values.iter().map(|value| SlbRef::Record(value)).collect())
}

fn records_value<C: SlbRecord>(value: SlbValue) -> Result<Vec<C>> {
    match value {
        SlbValue::List(items) => items.into_iter().map(record_value::<C>).collect(),
        other => Err(Error::NotImplemented(other.kind_name())),
    }
}

fn construct<T: SlbRecord>() -> Box<dyn Any + Send> {
    Box::new(T::default())
}

/// Accessor over a field of type `V` in record type `T`.
struct TypedAccessor<T, V> {
    get: fn(&T) -> &V,
    set: fn(&mut T, V),
    encode: for<'a> fn(&'a V) -> SlbRef<'a>,
    decode: fn(SlbValue) -> Result<V>,
}

impl<T: SlbRecord, V: 'static> Accessor for TypedAccessor<T, V> {
    fn get<'a>(&self, record: &'a dyn Any) -> Result<SlbRef<'a>> {
        let record = record
            .downcast_ref::<T>()
            .ok_or(Error::NotImplemented(T::TYPE_NAME))?;
        Ok((self.encode)((self.get)(record)))
    }

    fn set(&self, record: &mut dyn Any, value: SlbValue) -> Result<()> {
        let record = record
            .downcast_mut::<T>()
            .ok_or(Error::NotImplemented(T::TYPE_NAME))?;
        (self.set)(record, (self.decode)(value)?);
        Ok(())
    }
}

/// Collects the field list of record type `T`.
///
/// Methods chain; the first invalid field is reported when the schema is built.
pub struct RecordBuilder<T> {
    edges: Vec<Edge>,
    error: Option<Error>,
    _record: PhantomData<fn() -> T>,
}

impl<T: SlbRecord> RecordBuilder<T> {
    fn new() -> Self {
        RecordBuilder {
            edges: Vec::new(),
            error: None,
            _record: PhantomData,
        }
    }

    fn push<V: 'static>(
        &mut self,
        name: &'static str,
        attrs: FieldAttrs,
        node: std::result::Result<SchemaNode, Error>,
        accessor: TypedAccessor<T, V>,
    ) -> &mut Self {
        if self.error.is_some() {
            return self;
        }

        match node {
            Ok(node) => {
                log::trace!("{}::{}: {}", T::TYPE_NAME, name, node.kind_name());
                self.edges
                    .push(Edge::new(name, node, attrs.padding, Box::new(accessor)));
            }
            Err(error) => self.error = Some(error),
        }
        self
    }

    fn conflict(name: &'static str, message: &str) -> Error {
        Error::SchemaConflict {
            type_name: T::TYPE_NAME,
            field: name,
            message: message.to_string(),
        }
    }

    /// Declares a numeric, string or list-of-those field.
    pub fn field<V: FieldType>(
        &mut self,
        name: &'static str,
        attrs: FieldAttrs,
        get: fn(&T) -> &V,
        set: fn(&mut T, V),
    ) -> &mut Self {
        let node = V::field_node(&attrs).map_err(|message| Self::conflict(name, message));
        self.push(
            name,
            attrs,
            node,
            TypedAccessor {
                get,
                set,
                encode: V::encode,
                decode: V::decode,
            },
        )
    }

    /// Declares a nested record field.
    pub fn record<C: SlbRecord>(
        &mut self,
        name: &'static str,
        attrs: FieldAttrs,
        get: fn(&T) -> &C,
        set: fn(&mut T, C),
    ) -> &mut Self {
        let node = Self::record_node::<C>(name, &attrs).and_then(|node| {
            attrs
                .single(node)
                .map_err(|message| Self::conflict(name, message))
        });
        self.push(
            name,
            attrs,
            node,
            TypedAccessor {
                get,
                set,
                encode: record_ref::<C>,
                decode: record_value::<C>,
            },
        )
    }

    /// Declares a list-of-records field.
    pub fn records<C: SlbRecord>(
        &mut self,
        name: &'static str,
        attrs: FieldAttrs,
        get: fn(&T) -> &Vec<C>,
        set: fn(&mut T, Vec<C>),
    ) -> &mut Self {
        let node = Self::record_node::<C>(name, &attrs).map(|node| attrs.list(node));
        self.push(
            name,
            attrs,
            node,
            TypedAccessor {
                get,
                set,
                encode: records_ref::<C>,
                decode: records_value::<C>,
            },
        )
    }

    fn record_node<C: SlbRecord>(name: &'static str, attrs: &FieldAttrs) -> Result<SchemaNode> {
        if attrs.inline_length.is_some() {
            return Err(Self::conflict(name, "inline length on a record field"));
        }
        if is_building(TypeId::of::<C>()) {
            return Err(Self::conflict(name, "record type contains itself"));
        }
        Ok(SchemaNode::Data(schema_of::<C>()?))
    }

    fn finish(self) -> Result<DataNode> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.edges.is_empty() {
            return Err(Error::EmptySchema(T::TYPE_NAME));
        }

        Ok(DataNode::new(
            T::TYPE_NAME,
            TypeId::of::<T>(),
            construct::<T>,
            self.edges,
        ))
    }
}

fn schemas() -> &'static DashMap<TypeId, Arc<DataNode>> {
    static SCHEMAS: OnceLock<DashMap<TypeId, Arc<DataNode>>> = OnceLock::new();
    SCHEMAS.get_or_init(DashMap::new)
}

thread_local! {
    static BUILDING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

fn is_building(id: TypeId) -> bool {
    BUILDING.with(|building| building.borrow().contains(&id))
}

/// Marks a type as under construction on this thread until dropped.
struct BuildGuard;

impl BuildGuard {
    fn enter(id: TypeId) -> Self {
        BUILDING.with(|building| building.borrow_mut().push(id));
        BuildGuard
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        BUILDING.with(|building| {
            building.borrow_mut().pop();
        });
    }
}

/// Builds the schema of `T` without consulting the cache.
///
/// # Errors
/// Returns [`Error::SchemaConflict`] for fields with conflicting markers and
/// [`Error::EmptySchema`] if `T` or a nested record declares no fields.
pub fn build_schema<T: SlbRecord>() -> Result<DataNode> {
    let _guard = BuildGuard::enter(TypeId::of::<T>());
    let mut builder = RecordBuilder::<T>::new();
    T::describe(&mut builder);
    builder.finish()
}

/// Returns the cached schema of `T`, building it on first use.
///
/// The lookup and the insertion are separate steps, so nested records can be resolved
/// while `T` is being built. Two threads racing on the same type both build it and the
/// first stored schema wins.
///
/// # Errors
/// See [`build_schema`].
pub fn schema_of<T: SlbRecord>() -> Result<Arc<DataNode>> {
    let id = TypeId::of::<T>();
    if let Some(schema) = schemas().get(&id) {
        return Ok(Arc::clone(schema.value()));
    }

    let schema = Arc::new(build_schema::<T>()?);
    log::debug!(
        "built schema for {} ({}): {} fields, {} inline bytes",
        T::TYPE_NAME,
        type_name::<T>(),
        schema.edges().len(),
        schema.inline_size()
    );
    Ok(Arc::clone(schemas().entry(id).or_insert(schema).value()))
}
