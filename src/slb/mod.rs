//! SLB binary tables.
//!
//! SLB tables are trees of records: inline fields, fixed-length strings, counted lists and
//! values stored elsewhere behind 4 byte absolute offsets. A record type describes its
//! fields once through [`SlbRecord`]; the resulting [`DataNode`] schema drives both the
//! [`TreeReader`] and the [`TreeWriter`], so one description yields a byte-exact codec in
//! both directions.
//!
//! # Key Components
//!
//! - [`schema`] - schema tree nodes and type-erased field values
//! - [`builder`] - field markers, [`RecordBuilder`] and the schema cache
//! - [`TreeReader`] / [`TreeWriter`] - walk a schema together with a value
//! - [`SlbContainer`] - magic, root record and footer alignment
//!
//! # Examples
//!
//! ```rust
//! use sagekit::slb::{FieldAttrs, RecordBuilder, SlbContainer, SlbRecord};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Line {
//!     speaker: String,
//!     text: String,
//! }
//!
//! impl SlbRecord for Line {
//!     const TYPE_NAME: &'static str = "Line";
//!
//!     fn describe(fields: &mut RecordBuilder<Self>) {
//!         fields
//!             .field("speaker", FieldAttrs::new().inline(8), |l| &l.speaker, |l, v| l.speaker = v)
//!             .field("text", FieldAttrs::new().offset(), |l| &l.text, |l, v| l.text = v);
//!     }
//! }
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Conversation {
//!     lines: Vec<Line>,
//! }
//!
//! impl SlbRecord for Conversation {
//!     const TYPE_NAME: &'static str = "Conversation";
//!
//!     fn describe(fields: &mut RecordBuilder<Self>) {
//!         fields.records("lines", FieldAttrs::new().duplicate_count(), |c| &c.lines, |c, v| c.lines = v);
//!     }
//! }
//!
//! let container = SlbContainer::new(*b"CNV\0");
//! let conversation = Conversation {
//!     lines: vec![Line { speaker: "ed".into(), text: "hello".into() }],
//! };
//! let bytes = container.to_bytes(&conversation)?;
//! assert_eq!(bytes.len() % 4, 0);
//! assert_eq!(container.from_bytes::<Conversation>(&bytes)?, conversation);
//! # Ok::<(), sagekit::Error>(())
//! ```

pub mod builder;
pub mod container;
pub mod reader;
pub mod schema;
pub mod writer;

pub use builder::{build_schema, schema_of, FieldAttrs, FieldFlags, FieldType, RecordBuilder, SlbRecord};
pub use container::SlbContainer;
pub use reader::TreeReader;
pub use schema::{
    Accessor, CountWidth, DataNode, Edge, ListNode, OffsetNode, ScalarKind, SchemaNode, SlbRef,
    SlbValue,
};
pub use writer::{PendingOffset, TreeWriter};
