//! # Table Descriptor
//!
//! The column layout of one result set, plus whether it has rows.
//!
//! A descriptor is either built incrementally with [`TableDescriptor::add`]
//! while serializing a live source, or decoded in one piece from a stream.
//! The two lifecycles never mix: `add` on a decoded descriptor is an
//! invalid-state error.
//!
//! ## Wire Layout
//!
//! ```text
//! +-------------------------+---------------+--------------------+
//! | header: varint          | has_rows: u8  | column * count     |
//! +-------------------------+---------------+--------------------+
//!
//! header = 0             end of stream (nothing follows)
//! header = count + 1     a result set with `count` columns
//! ```
//!
//! ## Name Lookup
//!
//! Column names are matched case-insensitively and must be unique within a
//! table. Anonymous columns are reachable by ordinal only.

use std::io::{Read, Write};
use std::sync::Arc;

use eyre::{bail, ensure, Result, WrapErr};
use hashbrown::HashMap;
use smallvec::SmallVec;
use tokio::io::AsyncRead;

use super::column::ColumnDescriptor;
use crate::config::{END_OF_STREAM_MARKER, INLINE_NULLABLE_COLUMNS};
use crate::encoding::async_io;
use crate::encoding::io::checked_len;
use crate::encoding::{WireRead, WireWrite};
use crate::error::SnapError;
use crate::source::ColumnSchema;
use crate::types::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Building,
    Decoded,
}

#[derive(Debug, Clone)]
pub struct TableDescriptor {
    columns: Vec<ColumnDescriptor>,
    by_name: HashMap<String, usize>,
    nullable: SmallVec<[usize; INLINE_NULLABLE_COLUMNS]>,
    /// Position of each column in the null bitmap, `None` if not nullable.
    null_slots: Vec<Option<usize>>,
    has_rows: bool,
    origin: Origin,
}

impl TableDescriptor {
    pub fn new(has_rows: bool) -> Self {
        Self::with_origin(has_rows, Origin::Building)
    }

    fn with_origin(has_rows: bool, origin: Origin) -> Self {
        Self {
            columns: Vec::new(),
            by_name: HashMap::new(),
            nullable: SmallVec::new(),
            null_slots: Vec::new(),
            has_rows,
            origin,
        }
    }

    pub fn from_schema(schema: &[ColumnSchema], has_rows: bool) -> Result<Self> {
        let mut table = Self::new(has_rows);
        for column in schema {
            table.add(column.name.as_deref(), column.kind, column.allow_null)?;
        }
        Ok(table)
    }

    /// Appends a column and returns its ordinal.
    pub fn add(&mut self, name: Option<&str>, kind: ValueKind, allow_null: bool) -> Result<usize> {
        ensure!(
            self.origin == Origin::Building,
            SnapError::InvalidState("cannot add columns to a decoded table descriptor".into())
        );
        let ordinal = self.columns.len();
        self.push(ColumnDescriptor::new(
            ordinal,
            name.map(str::to_string),
            kind,
            allow_null,
        ))?;
        Ok(ordinal)
    }

    fn push(&mut self, column: ColumnDescriptor) -> Result<()> {
        if let Some(name) = column.name() {
            let key = name.to_lowercase();
            if self.by_name.contains_key(&key) {
                bail!(SnapError::DuplicateColumn(name.to_string()));
            }
            self.by_name.insert(key, column.ordinal());
        }
        if column.allow_null() {
            self.null_slots.push(Some(self.nullable.len()));
            self.nullable.push(column.ordinal());
        } else {
            self.null_slots.push(None);
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_rows(&self) -> bool {
        self.has_rows
    }

    pub fn is_decoded(&self) -> bool {
        self.origin == Origin::Decoded
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, ordinal: usize) -> Result<&ColumnDescriptor> {
        self.columns.get(ordinal).ok_or_else(|| {
            SnapError::ColumnOutOfRange {
                ordinal,
                field_count: self.columns.len(),
            }
            .into()
        })
    }

    pub fn ordinal_of(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| SnapError::UnknownColumn(name.to_string()).into())
    }

    pub fn column_by_name(&self, name: &str) -> Result<&ColumnDescriptor> {
        let ordinal = self.ordinal_of(name)?;
        self.column(ordinal)
    }

    /// Ordinals of the nullable columns, in ordinal order.
    pub fn nullable_ordinals(&self) -> &[usize] {
        &self.nullable
    }

    pub(crate) fn null_slot(&self, ordinal: usize) -> Option<usize> {
        self.null_slots.get(ordinal).copied().flatten()
    }

    pub fn null_bitmap_len(&self) -> usize {
        self.nullable.len().div_ceil(8)
    }

    pub fn schema(&self) -> Vec<ColumnSchema> {
        self.columns
            .iter()
            .map(|c| ColumnSchema {
                name: c.name().map(str::to_string),
                kind: c.kind(),
                allow_null: c.allow_null(),
            })
            .collect()
    }

    pub fn serialize<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_varint_u64(self.columns.len() as u64 + 1)?;
        out.write_byte(u8::from(self.has_rows))?;
        for column in &self.columns {
            column.serialize(out)?;
        }
        Ok(())
    }

    fn decoded(count: usize, has_rows: u8) -> Result<Self> {
        let has_rows = match has_rows {
            0 => false,
            1 => true,
            other => bail!(SnapError::Format(format!("invalid has-rows flag {}", other))),
        };
        let mut table = Self::with_origin(has_rows, Origin::Decoded);
        table.columns.reserve(count.min(1024));
        Ok(table)
    }

    fn push_decoded(&mut self, column: ColumnDescriptor) -> Result<()> {
        let expected = self.columns.len();
        ensure!(
            column.ordinal() == expected,
            SnapError::Format(format!(
                "column ordinal {} out of sequence (expected {})",
                column.ordinal(),
                expected
            ))
        );
        if let Some(name) = column.name() {
            ensure!(
                !self.by_name.contains_key(&name.to_lowercase()),
                SnapError::Format(format!("column {} repeats the name {:?}", expected, name))
            );
        }
        self.push(column)
            .wrap_err_with(|| format!("decoding column {}", expected))
    }
}

/// A table descriptor slot in the stream: a result set, or the end marker.
#[derive(Debug, Clone)]
pub enum TableEntry {
    Descriptor(Arc<TableDescriptor>),
    EndOfStream,
}

impl TableEntry {
    pub fn read<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let header = input.read_varint_u64()?;
        if header == END_OF_STREAM_MARKER {
            return Ok(TableEntry::EndOfStream);
        }
        let count = checked_len(header - 1)?;
        let has_rows = input.read_byte("has-rows flag")?;
        let mut table = TableDescriptor::decoded(count, has_rows)?;
        for _ in 0..count {
            table.push_decoded(ColumnDescriptor::read(input)?)?;
        }
        Ok(TableEntry::Descriptor(Arc::new(table)))
    }

    pub async fn read_async<R>(input: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let header = async_io::read_varint_u64(input).await?;
        if header == END_OF_STREAM_MARKER {
            return Ok(TableEntry::EndOfStream);
        }
        let count = checked_len(header - 1)?;
        let has_rows = async_io::read_byte(input, "has-rows flag").await?;
        let mut table = TableDescriptor::decoded(count, has_rows)?;
        for _ in 0..count {
            table.push_decoded(ColumnDescriptor::read_async(input).await?)?;
        }
        Ok(TableEntry::Descriptor(Arc::new(table)))
    }

    pub fn serialize<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        match self {
            TableEntry::Descriptor(table) => table.serialize(out),
            TableEntry::EndOfStream => Self::write_end(out),
        }
    }

    pub fn write_end<W: Write + ?Sized>(out: &mut W) -> Result<()> {
        out.write_varint_u64(END_OF_STREAM_MARKER)
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TableEntry::EndOfStream)
    }

    pub fn descriptor(&self) -> Result<&Arc<TableDescriptor>> {
        match self {
            TableEntry::Descriptor(table) => Ok(table),
            TableEntry::EndOfStream => bail!(SnapError::NoData),
        }
    }
}
