//! # sqlsnap - Relational Result Snapshots
//!
//! sqlsnap captures the complete output of a database command (every result
//! set, its column metadata and every row) into a compact binary stream, and
//! replays that stream through a forward-only cursor that behaves like the
//! live data reader it was captured from.
//!
//! - **Streaming both ways**: rows are written as the source produces them and
//!   decoded one at a time on read
//! - **Fast skipping**: every row is length-prefixed, so moving to the next
//!   result set never decodes the rows left behind
//! - **Typed values**: 31 SQL value kinds with provider (`SqlValue`) and native
//!   (`Value`) representations
//!
//! ## Quick Start
//!
//! ```ignore
//! use sqlsnap::{ResultSetBuilder, Serializer, SnapshotReader, SqlValue, ValueKind};
//!
//! let mut source = ResultSetBuilder::new()
//!     .column("Id", ValueKind::Int, false)
//!     .column("Name", ValueKind::NVarChar, true)
//!     .row(vec![SqlValue::from(1), SqlValue::from("a")])
//!     .build()?;
//!
//! let mut bytes = Vec::new();
//! Serializer::new().serialize(&mut source, &mut bytes)?;
//!
//! let mut reader = SnapshotReader::new(bytes.as_slice())?;
//! while reader.read()? {
//!     println!("{} {}", reader.get_int32(0)?, reader.get_string(1)?);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Serializer (writer)  │ SnapshotReader   │
//! ├──────────────────────────────────────────┤
//! │  RowSource / AsyncRowSource │ DataCursor │
//! ├──────────────────────────────────────────┤
//! │  Protocol: Header, TableEntry, Row       │
//! ├──────────────────────────────────────────┤
//! │  Types: ValueKind, TypeDescriptor, codecs│
//! ├──────────────────────────────────────────┤
//! │  Encoding: varints, wire I/O (sync/async)│
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Stream Layout
//!
//! ```text
//! Stream     := Header TableBlock* EndOfStream
//! Header     := version:u8 records_affected:varint depth:varint
//! TableBlock := TableDescriptor Row* EndOfRows
//! ```
//!
//! See [`protocol`] for the record layouts and [`types::codec`] for value
//! payloads.
//!
//! ## Errors
//!
//! Every operation returns `eyre::Result`. Categorised failures carry a
//! [`SnapError`], recoverable with [`snap_error`] after any amount of added
//! context.

pub mod config;
pub mod encoding;
pub mod error;
pub mod protocol;
pub mod reader;
pub mod source;
pub mod types;
pub mod writer;

pub use error::{snap_error, SnapError};
pub use protocol::{ColumnDescriptor, Header, Row, RowState, TableDescriptor, TableEntry};
pub use reader::{CloseHandle, DataCursor, SnapshotReader};
pub use source::{AsyncRowSource, ColumnSchema, MemorySource, ResultSetBuilder, RowSource};
pub use types::{
    HierarchyId, NativeType, ProviderType, SqlDecimal, SqlString, SqlValue, TypeDescriptor,
    UdtValue, Value, ValueKind,
};
pub use writer::{SerializeStats, Serializer, SerializerOptions};
