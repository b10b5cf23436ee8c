//! # Snapshot Reader
//!
//! Forward-only cursor over a snapshot stream.
//!
//! Construction reads the header and the first table descriptor, so a new
//! reader is already positioned on the first result set with no current row.
//!
//! ## Cursor States
//!
//! | Table entry | Row state | `read()` | Accessors |
//! |-------------|-----------|----------|-----------|
//! | Descriptor, has rows | NotRead | decodes next row | `NoData` |
//! | Descriptor, has rows | Data | decodes next row | current row |
//! | Descriptor, has rows | End | false | `NoData` |
//! | Descriptor, no rows | any | false | `NoData` |
//! | EndOfStream | any | false | `NoData` |
//!
//! `next_result()` skips whatever rows remain (by length prefix, without
//! decoding them), reads the next table entry and resets the row state.
//!
//! ## Lifecycle
//!
//! ```text
//! Open ──close()──> Closed ──dispose()──> Disposed
//!   └──────────────dispose() / drop──────────┘
//! ```
//!
//! Transitions are atomic and shared with every [`CloseHandle`], so a close
//! from another thread racing a dispose releases the stream exactly once.
//! Both are idempotent and never fail. Once closed, `read()` and
//! `next_result()` fail with `Closed` and every accessor fails with `NoData`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut reader = SnapshotReader::new(BufReader::new(File::open("result.snap")?))?;
//! loop {
//!     while reader.read()? {
//!         println!("{} {:?}", reader.get_int32(0)?, reader.value_by_name("Name")?);
//!     }
//!     if !reader.next_result()? {
//!         break;
//!     }
//! }
//! ```

use std::io::Read;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use eyre::{bail, Result};
use parking_lot::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::SnapError;
use crate::protocol::{Header, Row, RowState, TableDescriptor, TableEntry};
use crate::source::{ColumnSchema, RowSource};
use crate::types::codec::cast_error;
use crate::types::{NativeType, ProviderType, SqlDecimal, SqlValue, UdtValue, Value};

const OPEN: u8 = 0;
const CLOSED: u8 = 1;
const DISPOSED: u8 = 2;

struct Lifecycle<R> {
    state: AtomicU8,
    stream: Mutex<Option<R>>,
}

impl<R> Lifecycle<R> {
    fn new(stream: R) -> Self {
        Self {
            state: AtomicU8::new(OPEN),
            stream: Mutex::new(Some(stream)),
        }
    }

    fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }

    fn close(&self) {
        if self
            .state
            .compare_exchange(OPEN, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.release();
            debug!("snapshot reader closed");
        }
    }

    fn dispose(&self) {
        if self.state.swap(DISPOSED, Ordering::AcqRel) == OPEN {
            self.release();
            debug!("snapshot reader disposed");
        }
    }

    fn release(&self) {
        drop(self.stream.lock().take());
    }
}

/// Closes a [`SnapshotReader`] from elsewhere, typically another thread.
pub struct CloseHandle<R> {
    shared: Arc<Lifecycle<R>>,
}

impl<R> Clone for CloseHandle<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> CloseHandle<R> {
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.is_open()
    }
}

/// Operations of a forward-only result cursor.
pub trait DataCursor {
    fn read(&mut self) -> Result<bool>;

    fn next_result(&mut self) -> Result<bool>;

    fn field_count(&self) -> Result<usize>;

    fn ordinal(&self, name: &str) -> Result<usize>;

    fn value(&self, ordinal: usize) -> Result<&Value>;

    fn sql_value(&self, ordinal: usize) -> Result<&SqlValue>;

    fn is_db_null(&self, ordinal: usize) -> Result<bool>;

    fn is_closed(&self) -> bool;

    fn close(&mut self);

    fn value_by_name(&self, name: &str) -> Result<&Value> {
        self.value(self.ordinal(name)?)
    }
}

macro_rules! typed_getter {
    ($(#[$meta:meta])* $fn_name:ident, $variant:ident, $ty:ty, $requested:literal) => {
        $(#[$meta])*
        pub fn $fn_name(&self, ordinal: usize) -> Result<$ty> {
            match self.sql_value(ordinal)? {
                SqlValue::$variant(Some(value)) => Ok(value.clone()),
                other => Err(cast_error($requested, other)),
            }
        }
    };
}

pub struct SnapshotReader<R: Read> {
    shared: Arc<Lifecycle<R>>,
    header: Header,
    table: TableEntry,
    row: RowState,
}

impl<R: Read> SnapshotReader<R> {
    pub fn new(mut stream: R) -> Result<Self> {
        let header = Header::read(&mut stream)?;
        let table = TableEntry::read(&mut stream)?;
        debug!(
            records_affected = header.records_affected(),
            depth = header.depth(),
            end_of_stream = table.is_end_of_stream(),
            "opened snapshot reader"
        );
        Ok(Self {
            shared: Arc::new(Lifecycle::new(stream)),
            header,
            table,
            row: RowState::NotRead,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn close_handle(&self) -> CloseHandle<R> {
        CloseHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.shared.is_open() {
            bail!(SnapError::Closed);
        }
        Ok(())
    }

    fn with_stream<T>(&self, f: impl FnOnce(&mut R) -> Result<T>) -> Result<T> {
        let mut guard = self.shared.stream.lock();
        match guard.as_mut() {
            Some(stream) => f(stream),
            None => bail!(SnapError::Closed),
        }
    }

    fn current_table(&self) -> Result<&Arc<TableDescriptor>> {
        if !self.shared.is_open() {
            bail!(SnapError::NoData);
        }
        self.table.descriptor()
    }

    fn current_row(&self) -> Result<&Row> {
        if !self.shared.is_open() {
            bail!(SnapError::NoData);
        }
        self.row.row()
    }

    pub fn read(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let table = match &self.table {
            TableEntry::Descriptor(table) if table.has_rows() => Arc::clone(table),
            _ => return Ok(false),
        };
        if self.row.is_end() {
            return Ok(false);
        }
        let state = self.with_stream(|stream| Row::read(&table, stream))?;
        let more = state.is_data();
        if !more {
            trace!("reached end of rows");
        }
        self.row = state;
        Ok(more)
    }

    pub fn next_result(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.table.is_end_of_stream() {
            return Ok(false);
        }
        let skip_rows = !self.row.is_end();
        let entry = self.with_stream(|stream| {
            if skip_rows {
                let mut skipped = 0u64;
                while Row::skip(stream)? {
                    skipped += 1;
                }
                trace!(skipped, "skipped unread rows");
            }
            TableEntry::read(stream)
        })?;
        self.table = entry;
        self.row = RowState::NotRead;
        debug!(
            end_of_stream = self.table.is_end_of_stream(),
            "advanced to next result set"
        );
        Ok(!self.table.is_end_of_stream())
    }

    /// Closes the stream. Idempotent.
    pub fn close(&mut self) {
        self.shared.close();
        self.table = TableEntry::EndOfStream;
        self.row = RowState::End;
    }

    /// Releases the stream if still open and marks the reader disposed. Idempotent.
    pub fn dispose(&mut self) {
        self.shared.dispose();
        self.table = TableEntry::EndOfStream;
        self.row = RowState::End;
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.is_open()
    }

    pub fn depth(&self) -> i32 {
        self.header.depth()
    }

    pub fn records_affected(&self) -> i32 {
        self.header.records_affected()
    }

    pub fn field_count(&self) -> Result<usize> {
        Ok(self.current_table()?.field_count())
    }

    /// Same as [`field_count`](Self::field_count); snapshots carry no hidden columns.
    pub fn visible_field_count(&self) -> Result<usize> {
        self.field_count()
    }

    pub fn has_rows(&self) -> Result<bool> {
        Ok(self.current_table()?.has_rows())
    }

    /// Column name, or the empty string for an anonymous column.
    pub fn name(&self, ordinal: usize) -> Result<&str> {
        Ok(self.current_table()?.column(ordinal)?.name().unwrap_or(""))
    }

    pub fn ordinal(&self, name: &str) -> Result<usize> {
        self.current_table()?.ordinal_of(name)
    }

    pub fn data_type_name(&self, ordinal: usize) -> Result<&'static str> {
        Ok(self.current_table()?.column(ordinal)?.type_descriptor().name)
    }

    pub fn field_type(&self, ordinal: usize) -> Result<NativeType> {
        Ok(self.current_table()?.column(ordinal)?.type_descriptor().native)
    }

    pub fn provider_field_type(&self, ordinal: usize) -> Result<ProviderType> {
        Ok(self.current_table()?.column(ordinal)?.type_descriptor().provider)
    }

    pub fn column_schema(&self) -> Result<Vec<ColumnSchema>> {
        Ok(self.current_table()?.schema())
    }

    pub fn value(&self, ordinal: usize) -> Result<&Value> {
        self.current_row()?.value(ordinal)
    }

    pub fn sql_value(&self, ordinal: usize) -> Result<&SqlValue> {
        self.current_row()?.sql_value(ordinal)
    }

    pub fn values(&self) -> Result<&[Value]> {
        Ok(self.current_row()?.values())
    }

    pub fn sql_values(&self) -> Result<&[SqlValue]> {
        Ok(self.current_row()?.sql_values())
    }

    pub fn value_by_name(&self, name: &str) -> Result<&Value> {
        let ordinal = self.ordinal(name)?;
        self.value(ordinal)
    }

    pub fn is_db_null(&self, ordinal: usize) -> Result<bool> {
        self.current_row()?.is_null(ordinal)
    }

    typed_getter!(get_boolean, Boolean, bool, "bool");
    typed_getter!(get_byte, Byte, u8, "u8");
    typed_getter!(get_int16, Int16, i16, "i16");
    typed_getter!(get_int32, Int32, i32, "i32");
    typed_getter!(get_int64, Int64, i64, "i64");
    typed_getter!(get_float, Single, f32, "f32");
    typed_getter!(get_double, Double, f64, "f64");
    typed_getter!(get_guid, Guid, Uuid, "Uuid");
    typed_getter!(
        /// Value of a datetime, smalldatetime or datetime2 column.
        get_date_time, DateTime, NaiveDateTime, "NaiveDateTime"
    );
    typed_getter!(get_date, Date, NaiveDate, "NaiveDate");
    typed_getter!(get_time, Time, NaiveTime, "NaiveTime");
    typed_getter!(
        get_date_time_offset,
        DateTimeOffset,
        DateTime<FixedOffset>,
        "DateTime<FixedOffset>"
    );

    /// Value of a decimal, money or smallmoney column.
    pub fn get_decimal(&self, ordinal: usize) -> Result<SqlDecimal> {
        match self.sql_value(ordinal)? {
            SqlValue::Decimal(Some(value)) | SqlValue::Money(Some(value)) => Ok(*value),
            other => Err(cast_error("SqlDecimal", other)),
        }
    }

    /// Text of a character or xml column.
    pub fn get_string(&self, ordinal: usize) -> Result<String> {
        match self.sql_value(ordinal)? {
            SqlValue::String(Some(value)) => Ok(value.as_str().to_owned()),
            SqlValue::Xml(Some(value)) => Ok(value.clone()),
            other => Err(cast_error("String", other)),
        }
    }

    pub fn get_udt(&self, ordinal: usize) -> Result<&UdtValue> {
        match self.sql_value(ordinal)? {
            SqlValue::Udt(Some(value)) => Ok(value),
            other => Err(cast_error("UdtValue", other)),
        }
    }

    /// Copies bytes of a binary column starting at `data_offset` into `buf`
    /// and returns how many were copied. Without a buffer, returns the total
    /// length of the value.
    pub fn get_bytes(
        &self,
        ordinal: usize,
        data_offset: usize,
        buf: Option<&mut [u8]>,
    ) -> Result<usize> {
        let bytes = match self.sql_value(ordinal)? {
            SqlValue::Binary(Some(bytes)) => bytes,
            other => return Err(cast_error("Vec<u8>", other)),
        };
        let Some(buf) = buf else {
            return Ok(bytes.len());
        };
        if data_offset >= bytes.len() {
            return Ok(0);
        }
        let n = buf.len().min(bytes.len() - data_offset);
        buf[..n].copy_from_slice(&bytes[data_offset..data_offset + n]);
        Ok(n)
    }
}

impl<R: Read> Drop for SnapshotReader<R> {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl<R: Read> DataCursor for SnapshotReader<R> {
    fn read(&mut self) -> Result<bool> {
        SnapshotReader::read(self)
    }

    fn next_result(&mut self) -> Result<bool> {
        SnapshotReader::next_result(self)
    }

    fn field_count(&self) -> Result<usize> {
        SnapshotReader::field_count(self)
    }

    fn ordinal(&self, name: &str) -> Result<usize> {
        SnapshotReader::ordinal(self, name)
    }

    fn value(&self, ordinal: usize) -> Result<&Value> {
        SnapshotReader::value(self, ordinal)
    }

    fn sql_value(&self, ordinal: usize) -> Result<&SqlValue> {
        SnapshotReader::sql_value(self, ordinal)
    }

    fn is_db_null(&self, ordinal: usize) -> Result<bool> {
        SnapshotReader::is_db_null(self, ordinal)
    }

    fn is_closed(&self) -> bool {
        SnapshotReader::is_closed(self)
    }

    fn close(&mut self) {
        SnapshotReader::close(self)
    }
}

/// A reader can feed a serializer, which re-encodes the remaining snapshot.
impl<R: Read> RowSource for SnapshotReader<R> {
    fn read(&mut self) -> Result<bool> {
        SnapshotReader::read(self)
    }

    fn next_result(&mut self) -> Result<bool> {
        SnapshotReader::next_result(self)
    }

    fn records_affected(&self) -> i32 {
        SnapshotReader::records_affected(self)
    }

    fn depth(&self) -> i32 {
        SnapshotReader::depth(self)
    }

    fn has_rows(&self) -> Result<bool> {
        if self.table.is_end_of_stream() {
            return Ok(false);
        }
        SnapshotReader::has_rows(self)
    }

    fn schema(&self) -> Result<Vec<ColumnSchema>> {
        if self.table.is_end_of_stream() {
            return Ok(Vec::new());
        }
        self.column_schema()
    }

    fn value(&self, ordinal: usize) -> Result<SqlValue> {
        self.sql_value(ordinal).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::snap_error;
    use crate::source::ResultSetBuilder;
    use crate::types::{SqlString, ValueKind};
    use crate::writer::Serializer;
    use std::io::Cursor;

    fn snapshot(source: &mut crate::source::MemorySource) -> Vec<u8> {
        let mut out = Vec::new();
        Serializer::new().serialize(source, &mut out).unwrap();
        out
    }

    fn people() -> Vec<u8> {
        snapshot(
            &mut ResultSetBuilder::new()
                .column("Id", ValueKind::Int, false)
                .column("Name", ValueKind::NVarChar, true)
                .column("Photo", ValueKind::VarBinary, true)
                .row(vec![
                    SqlValue::from(1),
                    SqlValue::from("Ann"),
                    SqlValue::from(vec![1u8, 2, 3, 4, 5]),
                ])
                .row(vec![SqlValue::from(2), SqlValue::String(None), SqlValue::Binary(None)])
                .records_affected(7)
                .depth(1)
                .build()
                .unwrap(),
        )
    }

    fn assert_err(result: Result<impl std::fmt::Debug>, expected: SnapError) {
        let err = result.unwrap_err();
        assert_eq!(snap_error(&err), Some(&expected));
    }

    #[test]
    fn metadata_is_available_before_the_first_read() {
        let reader = SnapshotReader::new(Cursor::new(people())).unwrap();
        assert_eq!(reader.records_affected(), 7);
        assert_eq!(reader.depth(), 1);
        assert_eq!(reader.field_count().unwrap(), 3);
        assert_eq!(reader.visible_field_count().unwrap(), 3);
        assert!(reader.has_rows().unwrap());
        assert_eq!(reader.name(1).unwrap(), "Name");
        assert_eq!(reader.ordinal("photo").unwrap(), 2);
        assert_eq!(reader.data_type_name(0).unwrap(), "int");
        assert_eq!(reader.field_type(1).unwrap(), NativeType::String);
        assert_eq!(reader.provider_field_type(2).unwrap(), ProviderType::SqlBinary);
        assert_eq!(reader.column_schema().unwrap()[0].kind, ValueKind::Int);
        assert_err(reader.value(0), SnapError::NoData);
    }

    #[test]
    fn typed_getters() {
        let mut reader = SnapshotReader::new(Cursor::new(people())).unwrap();
        assert!(reader.read().unwrap());
        assert_eq!(reader.get_int32(0).unwrap(), 1);
        assert_eq!(reader.get_string(1).unwrap(), "Ann");
        assert_eq!(
            reader.sql_value(1).unwrap(),
            &SqlValue::String(Some(SqlString::new("Ann")))
        );
        assert_eq!(reader.value_by_name("ID").unwrap(), &Value::Int32(1));
        assert_eq!(reader.values().unwrap().len(), 3);
        assert_eq!(reader.sql_values().unwrap().len(), 3);

        assert_err(
            reader.get_int64(0),
            SnapError::InvalidCast {
                requested: "i64",
                actual: "SqlInt32",
            },
        );

        assert!(reader.read().unwrap());
        assert!(reader.is_db_null(1).unwrap());
        assert_err(reader.get_string(1), SnapError::NullValue);
        assert_eq!(reader.value(1).unwrap(), &Value::Null);
    }

    #[test]
    fn get_bytes_copies_windows() {
        let mut reader = SnapshotReader::new(Cursor::new(people())).unwrap();
        reader.read().unwrap();

        assert_eq!(reader.get_bytes(2, 0, None).unwrap(), 5);
        let mut buf = [0u8; 3];
        assert_eq!(reader.get_bytes(2, 1, Some(&mut buf)).unwrap(), 3);
        assert_eq!(buf, [2, 3, 4]);
        assert_eq!(reader.get_bytes(2, 4, Some(&mut buf)).unwrap(), 1);
        assert_eq!(buf[0], 5);
        assert_eq!(reader.get_bytes(2, 9, Some(&mut buf)).unwrap(), 0);
        assert!(reader.get_bytes(0, 0, None).is_err());
    }

    #[test]
    fn out_of_range_and_unknown_columns() {
        let mut reader = SnapshotReader::new(Cursor::new(people())).unwrap();
        reader.read().unwrap();
        assert_err(
            reader.value(3),
            SnapError::ColumnOutOfRange {
                ordinal: 3,
                field_count: 3,
            },
        );
        assert_err(reader.ordinal("Age"), SnapError::UnknownColumn("Age".into()));
    }

    #[test]
    fn exhausted_result_set_has_no_data() {
        let mut reader = SnapshotReader::new(Cursor::new(people())).unwrap();
        assert!(reader.read().unwrap());
        assert!(reader.read().unwrap());
        assert!(!reader.read().unwrap());
        assert!(!reader.read().unwrap());
        assert_err(reader.value(0), SnapError::NoData);

        assert!(!reader.next_result().unwrap());
        assert!(!reader.next_result().unwrap());
        assert_err(reader.field_count(), SnapError::NoData);
        assert!(!reader.read().unwrap());
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_use() {
        let mut reader = SnapshotReader::new(Cursor::new(people())).unwrap();
        reader.read().unwrap();
        reader.close();
        reader.close();
        reader.dispose();
        reader.dispose();

        assert!(reader.is_closed());
        assert_err(reader.read(), SnapError::Closed);
        assert_err(reader.next_result(), SnapError::Closed);
        assert_err(reader.get_int32(0), SnapError::NoData);
        assert_err(reader.field_count(), SnapError::NoData);
    }

    #[test]
    fn close_handle_closes_from_another_thread() {
        let mut reader = SnapshotReader::new(Cursor::new(people())).unwrap();
        reader.read().unwrap();
        let handle = reader.close_handle();
        std::thread::spawn(move || handle.clone().close())
            .join()
            .unwrap();

        assert!(reader.is_closed());
        assert_err(reader.value(0), SnapError::NoData);
        assert_err(reader.read(), SnapError::Closed);
    }

    #[test]
    fn data_cursor_is_object_safe() {
        let mut reader = SnapshotReader::new(Cursor::new(people())).unwrap();
        let cursor: &mut dyn DataCursor = &mut reader;
        let mut ids = Vec::new();
        while cursor.read().unwrap() {
            ids.push(cursor.value_by_name("Id").unwrap().clone());
        }
        assert_eq!(ids, vec![Value::Int32(1), Value::Int32(2)]);
        cursor.close();
        assert!(cursor.is_closed());
    }

    #[test]
    fn reader_reserializes_to_identical_bytes() {
        let original = snapshot(
            &mut ResultSetBuilder::new()
                .column("A", ValueKind::SmallInt, true)
                .row(vec![SqlValue::from(5i16)])
                .row(vec![SqlValue::Int16(None)])
                .result_set()
                .anonymous_column(ValueKind::UniqueIdentifier, false)
                .result_set()
                .column("B", ValueKind::Real, false)
                .row(vec![SqlValue::from(1.5f32)])
                .build()
                .unwrap(),
        );

        let mut reader = SnapshotReader::new(Cursor::new(original.clone())).unwrap();
        let mut copy = Vec::new();
        Serializer::new().serialize(&mut reader, &mut copy).unwrap();
        assert_eq!(copy, original);
    }
}
