//! # Snapshot Protocol
//!
//! Record-level codecs of the snapshot stream:
//!
//! ```text
//! Stream     := Header TableBlock* EndOfStream
//! TableBlock := TableDescriptor Row* EndOfRows
//! ```
//!
//! - `header`: protocol version, records affected, nesting depth
//! - `column`: one column of a table descriptor
//! - `table`: table descriptors and the end-of-stream entry
//! - `row`: null bitmap + values, and the end-of-rows marker
//!
//! Each record has a blocking (`std::io`) and an async (`tokio::io`) reader;
//! both consume exactly the same bytes.

mod column;
mod header;
mod row;
mod table;

pub use column::ColumnDescriptor;
pub use header::Header;
pub use row::{Row, RowState};
pub use table::{TableDescriptor, TableEntry};

pub(crate) use row::{encode_body, write_record};
