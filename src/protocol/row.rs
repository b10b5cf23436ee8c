//! # Row Codec
//!
//! One row of a result set, decoded against its table descriptor.
//!
//! ## Wire Layout
//!
//! ```text
//! row record  := (body_len + 1): varint  body
//! end marker  := 0: varint
//!
//! body        := null_bitmap  value*
//! null_bitmap := ceil(nullable_count / 8) bytes, one bit per nullable column
//!                in ordinal order, LSB first, 1 = null
//! value       := payload of each non-null column, in ordinal order
//! ```
//!
//! The length prefix lets a reader skip rows without decoding them, which is
//! how the cursor fast-forwards to the next result set.
//!
//! ## Values
//!
//! A `Row` holds the provider values it was decoded to. Native values are
//! derived from them on first access and cached; concurrent first accesses
//! agree on a single cached slice.

use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

use eyre::{bail, ensure, Result, WrapErr};
use tokio::io::AsyncRead;

use super::table::TableDescriptor;
use crate::config::END_OF_ROWS_MARKER;
use crate::encoding::async_io;
use crate::encoding::io::{checked_len, take};
use crate::encoding::{WireRead, WireWrite};
use crate::error::SnapError;
use crate::types::{SqlValue, Value};

#[derive(Debug, Clone)]
pub struct Row {
    table: Arc<TableDescriptor>,
    values: Box<[SqlValue]>,
    native: OnceLock<Box<[Value]>>,
}

impl Row {
    pub fn new(table: Arc<TableDescriptor>, values: Vec<SqlValue>) -> Result<Self> {
        ensure!(
            values.len() == table.field_count(),
            SnapError::InvalidState(format!(
                "row has {} values but the table has {} columns",
                values.len(),
                table.field_count()
            ))
        );
        Ok(Self {
            table,
            values: values.into_boxed_slice(),
            native: OnceLock::new(),
        })
    }

    pub fn table(&self) -> &Arc<TableDescriptor> {
        &self.table
    }

    pub fn sql_values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn sql_value(&self, ordinal: usize) -> Result<&SqlValue> {
        self.table.column(ordinal)?;
        Ok(&self.values[ordinal])
    }

    /// Native values, computed on first call.
    pub fn values(&self) -> &[Value] {
        self.native.get_or_init(|| {
            self.table
                .columns()
                .iter()
                .zip(self.values.iter())
                .map(|(column, value)| (column.type_descriptor().to_native)(value))
                .collect()
        })
    }

    pub fn value(&self, ordinal: usize) -> Result<&Value> {
        self.table.column(ordinal)?;
        Ok(&self.values()[ordinal])
    }

    pub fn is_null(&self, ordinal: usize) -> Result<bool> {
        Ok(self.sql_value(ordinal)?.is_null())
    }

    /// Decodes a row body (the bytes after the length prefix).
    pub fn decode(table: Arc<TableDescriptor>, body: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let bitmap = take(body, &mut offset, table.null_bitmap_len(), "null bitmap")?;
        let nullable_count = table.nullable_ordinals().len();
        if nullable_count % 8 != 0 {
            let padding = bitmap[bitmap.len() - 1] >> (nullable_count % 8);
            ensure!(
                padding == 0,
                SnapError::Format("null bitmap has padding bits set".into())
            );
        }

        let mut values = Vec::with_capacity(table.field_count());
        for column in table.columns() {
            let is_null = table
                .null_slot(column.ordinal())
                .is_some_and(|slot| bitmap[slot / 8] & (1 << (slot % 8)) != 0);
            let value = if is_null {
                SqlValue::null_of(column.kind())?
            } else {
                (column.type_descriptor().read_provider)(body, &mut offset)
                    .wrap_err_with(|| format!("decoding column {}", column.ordinal()))?
            };
            values.push(value);
        }

        ensure!(
            offset == body.len(),
            SnapError::Format(format!(
                "row body has {} trailing bytes",
                body.len() - offset
            ))
        );
        Self::new(table, values)
    }

    pub fn read<R: Read + ?Sized>(table: &Arc<TableDescriptor>, input: &mut R) -> Result<RowState> {
        let len = input.read_varint_u64()?;
        if len == END_OF_ROWS_MARKER {
            return Ok(RowState::End);
        }
        let body = input.read_vec(checked_len(len - 1)?, "row body")?;
        Ok(RowState::Data(Self::decode(Arc::clone(table), &body)?))
    }

    pub async fn read_async<R>(table: &Arc<TableDescriptor>, input: &mut R) -> Result<RowState>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let len = async_io::read_varint_u64(input).await?;
        if len == END_OF_ROWS_MARKER {
            return Ok(RowState::End);
        }
        let body = async_io::read_vec(input, checked_len(len - 1)?, "row body").await?;
        Ok(RowState::Data(Self::decode(Arc::clone(table), &body)?))
    }

    /// Consumes one row record without decoding it. Returns false at the
    /// end-of-rows marker.
    pub fn skip<R: Read + ?Sized>(input: &mut R) -> Result<bool> {
        let len = input.read_varint_u64()?;
        if len == END_OF_ROWS_MARKER {
            return Ok(false);
        }
        input.skip_bytes(checked_len(len - 1)?, "skipped row")?;
        Ok(true)
    }

    pub async fn skip_async<R>(input: &mut R) -> Result<bool>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let len = async_io::read_varint_u64(input).await?;
        if len == END_OF_ROWS_MARKER {
            return Ok(false);
        }
        async_io::skip_bytes(input, checked_len(len - 1)?, "skipped row").await?;
        Ok(true)
    }

    /// Writes this row as a complete record. `scratch` is reused for the body.
    pub fn serialize<W: Write + ?Sized>(&self, out: &mut W, scratch: &mut Vec<u8>) -> Result<()> {
        scratch.clear();
        encode_body(&self.table, &self.values, scratch)?;
        write_record(out, scratch)
    }

    pub fn write_end<W: Write + ?Sized>(out: &mut W) -> Result<()> {
        out.write_varint_u64(END_OF_ROWS_MARKER)
    }
}

/// Appends the body of a row holding `values` to `out`.
pub(crate) fn encode_body(
    table: &TableDescriptor,
    values: &[SqlValue],
    out: &mut Vec<u8>,
) -> Result<()> {
    ensure!(
        values.len() == table.field_count(),
        SnapError::InvalidState(format!(
            "row has {} values but the table has {} columns",
            values.len(),
            table.field_count()
        ))
    );

    let bitmap_start = out.len();
    out.resize(bitmap_start + table.null_bitmap_len(), 0);

    for (column, value) in table.columns().iter().zip(values) {
        if value.is_null() {
            match table.null_slot(column.ordinal()) {
                Some(slot) => out[bitmap_start + slot / 8] |= 1 << (slot % 8),
                None => bail!(SnapError::InvalidState(format!(
                    "null value in non-nullable column {} ({})",
                    column.ordinal(),
                    column.name().unwrap_or("<anonymous>")
                ))),
            }
            continue;
        }
        (column.type_descriptor().serialize)(value, out)
            .wrap_err_with(|| format!("encoding column {}", column.ordinal()))?;
    }
    Ok(())
}

/// Writes `(body.len() + 1)` followed by the body.
pub(crate) fn write_record<W: Write + ?Sized>(out: &mut W, body: &[u8]) -> Result<()> {
    checked_len(body.len() as u64)?;
    out.write_varint_u64(body.len() as u64 + 1)?;
    out.write_all(body)?;
    Ok(())
}

/// Cursor position within a result set's rows.
#[derive(Debug, Clone, Default)]
pub enum RowState {
    #[default]
    NotRead,
    Data(Row),
    End,
}

impl RowState {
    pub fn row(&self) -> Result<&Row> {
        match self {
            RowState::Data(row) => Ok(row),
            RowState::NotRead | RowState::End => bail!(SnapError::NoData),
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, RowState::Data(_))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, RowState::End)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::snap_error;
    use crate::types::ValueKind;
    use std::io::Cursor;

    fn table() -> Arc<TableDescriptor> {
        let mut table = TableDescriptor::new(true);
        table.add(Some("Id"), ValueKind::Int, false).unwrap();
        table.add(Some("Name"), ValueKind::NVarChar, true).unwrap();
        table.add(Some("Score"), ValueKind::Float, true).unwrap();
        Arc::new(table)
    }

    fn row(values: Vec<SqlValue>) -> Row {
        Row::new(table(), values).unwrap()
    }

    #[test]
    fn body_layout_with_nulls() {
        let row = row(vec![
            SqlValue::from(1),
            SqlValue::String(None),
            SqlValue::from(2.5f64),
        ]);
        let mut body = Vec::new();
        encode_body(row.table(), row.sql_values(), &mut body).unwrap();

        assert_eq!(body[0], 0b01, "bitmap marks the first nullable column");
        assert_eq!(body[1], 2, "zig-zag 1");
        assert_eq!(&body[2..], &2.5f64.to_le_bytes());
    }

    #[test]
    fn record_roundtrip_and_end_marker() {
        let rows = [
            row(vec![SqlValue::from(1), SqlValue::from("a"), SqlValue::Double(None)]),
            row(vec![SqlValue::from(2), SqlValue::String(None), SqlValue::from(-0.5f64)]),
        ];

        let mut out = Vec::new();
        let mut scratch = Vec::new();
        for r in &rows {
            r.serialize(&mut out, &mut scratch).unwrap();
        }
        Row::write_end(&mut out).unwrap();

        let table = table();
        let mut cursor = Cursor::new(&out);
        for expected in &rows {
            let state = Row::read(&table, &mut cursor).unwrap();
            assert_eq!(state.row().unwrap().sql_values(), expected.sql_values());
        }
        assert!(Row::read(&table, &mut cursor).unwrap().is_end());
        assert_eq!(cursor.position() as usize, out.len());
    }

    #[test]
    fn null_in_non_nullable_column_is_rejected() {
        let row = Row::new(
            table(),
            vec![SqlValue::Int32(None), SqlValue::from("x"), SqlValue::from(1.0f64)],
        )
        .unwrap();
        let err = row.serialize(&mut Vec::new(), &mut Vec::new()).unwrap_err();
        assert!(snap_error(&err).is_some_and(SnapError::is_invalid_state));
    }

    #[test]
    fn wrong_value_count_is_rejected() {
        let err = Row::new(table(), vec![SqlValue::from(1)]).unwrap_err();
        assert!(matches!(
            snap_error(&err),
            Some(SnapError::InvalidState(_))
        ));
    }

    #[test]
    fn native_values_are_memoized() {
        let row = row(vec![
            SqlValue::from(7),
            SqlValue::String(None),
            SqlValue::from(1.25f64),
        ]);
        let first = row.values().as_ptr();
        assert_eq!(
            row.values(),
            &[Value::Int32(7), Value::Null, Value::Double(1.25)]
        );
        assert_eq!(row.values().as_ptr(), first);
        assert!(row.is_null(1).unwrap());
        assert!(row.value(3).is_err());
    }

    #[test]
    fn concurrent_first_access_agrees() {
        let row = Arc::new(row(vec![
            SqlValue::from(1),
            SqlValue::from("shared"),
            SqlValue::Double(None),
        ]));
        let pointers: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let row = Arc::clone(&row);
                    scope.spawn(move || row.values().as_ptr() as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn skip_walks_records_without_decoding() {
        let mut out = Vec::new();
        let mut scratch = Vec::new();
        row(vec![SqlValue::from(1), SqlValue::from("a"), SqlValue::Double(None)])
            .serialize(&mut out, &mut scratch)
            .unwrap();
        write_record(&mut out, &[0xFF, 0xFF, 0xFF]).unwrap();
        Row::write_end(&mut out).unwrap();
        out.push(0xAB);

        let mut cursor = Cursor::new(&out);
        assert!(Row::skip(&mut cursor).unwrap());
        assert!(Row::skip(&mut cursor).unwrap());
        assert!(!Row::skip(&mut cursor).unwrap());
        assert_eq!(cursor.position() as usize, out.len() - 1);
    }

    #[test]
    fn trailing_bytes_and_padding_bits_are_format_errors() {
        let table = table();

        let mut body = Vec::new();
        encode_body(
            &table,
            &[SqlValue::from(1), SqlValue::String(None), SqlValue::Double(None)],
            &mut body,
        )
        .unwrap();
        body.push(0);
        let err = Row::decode(Arc::clone(&table), &body).unwrap_err();
        assert!(matches!(snap_error(&err), Some(SnapError::Format(_))));

        let err = Row::decode(table, &[0b100, 2]).unwrap_err();
        assert!(matches!(snap_error(&err), Some(SnapError::Format(_))));
    }

    #[test]
    fn truncated_row_record_is_eof() {
        let mut out = Vec::new();
        out.write_varint_u64(10).unwrap();
        out.extend_from_slice(&[0, 2]);
        let err = Row::read(&table(), &mut Cursor::new(&out)).unwrap_err();
        assert!(matches!(
            snap_error(&err),
            Some(SnapError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn sentinel_states_have_no_data() {
        for state in [RowState::NotRead, RowState::End] {
            let err = state.row().unwrap_err();
            assert_eq!(snap_error(&err), Some(&SnapError::NoData));
        }
    }

    #[tokio::test]
    async fn async_read_and_skip() {
        let mut out = Vec::new();
        let mut scratch = Vec::new();
        let first = row(vec![SqlValue::from(1), SqlValue::from("a"), SqlValue::Double(None)]);
        let second = row(vec![SqlValue::from(2), SqlValue::String(None), SqlValue::from(3.0f64)]);
        first.serialize(&mut out, &mut scratch).unwrap();
        second.serialize(&mut out, &mut scratch).unwrap();
        Row::write_end(&mut out).unwrap();

        let table = table();
        let mut input = out.as_slice();
        assert!(Row::skip_async(&mut input).await.unwrap());
        let state = Row::read_async(&table, &mut input).await.unwrap();
        assert_eq!(state.row().unwrap().sql_values(), second.sql_values());
        assert!(!Row::skip_async(&mut input).await.unwrap());
        assert!(input.is_empty());
    }
}
