//! # Snapshot Serializer
//!
//! Drains a [`RowSource`] into a snapshot stream.
//!
//! ## Stream Shape
//!
//! ```text
//! Header
//! repeat for every result set:
//!     TableDescriptor            (current schema, has_rows)
//!     Row*                       (only when has_rows)
//!     EndOfRows
//! EndOfStream
//! ```
//!
//! A source always contributes at least one result set, even when it has no
//! columns; the end-of-rows marker is written for every result set, including
//! those without rows.
//!
//! ## Async Path
//!
//! [`Serializer::serialize_async`] produces byte-identical output. Each record
//! (header, descriptor, row, marker) is encoded into memory and handed to the
//! sink in one write, and the cancellation token is checked before every such
//! write. A cancelled run leaves a truncated stream behind.
//!
//! ## Usage
//!
//! ```ignore
//! let mut file = BufWriter::new(File::create("result.snap")?);
//! let stats = Serializer::new().serialize(&mut source, &mut file)?;
//! ```

use std::io::Write;

use eyre::{bail, Result, WrapErr};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::config::DEFAULT_ROW_BUFFER_CAPACITY;
use crate::encoding::async_io;
use crate::error::SnapError;
use crate::protocol::{encode_body, write_record, Header, Row, TableDescriptor, TableEntry};
use crate::source::{AsyncRowSource, RowSource};
use crate::types::SqlValue;

/// Runtime knobs of a [`Serializer`].
///
/// | Option | Default | Description |
/// |--------|---------|-------------|
/// | `row_buffer_capacity` | 256 | Initial capacity of the per-row scratch buffer |
/// | `flush_each_result_set` | false | Flush the sink after every end-of-rows marker |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerOptions {
    row_buffer_capacity: usize,
    flush_each_result_set: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializerOptions {
    pub fn new() -> Self {
        Self {
            row_buffer_capacity: DEFAULT_ROW_BUFFER_CAPACITY,
            flush_each_result_set: false,
        }
    }

    pub fn row_buffer_capacity(mut self, capacity: usize) -> Self {
        self.row_buffer_capacity = capacity;
        self
    }

    /// Flush after every result set so a consumer tailing the sink sees whole
    /// result sets as soon as they are written.
    pub fn flush_each_result_set(mut self, enabled: bool) -> Self {
        self.flush_each_result_set = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeStats {
    pub result_sets: usize,
    pub rows: u64,
    pub bytes: u64,
}

struct CountingWriter<'a, W: Write + ?Sized> {
    inner: &'a mut W,
    count: u64,
}

impl<W: Write + ?Sized> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Scratch space reused across rows.
struct RowBuffers {
    values: Vec<SqlValue>,
    body: Vec<u8>,
    record: Vec<u8>,
}

impl RowBuffers {
    fn new(capacity: usize) -> Self {
        Self {
            values: Vec::new(),
            body: Vec::with_capacity(capacity),
            record: Vec::with_capacity(capacity + 4),
        }
    }

    fn encode(&mut self, table: &TableDescriptor) -> Result<()> {
        self.body.clear();
        encode_body(table, &self.values, &mut self.body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Serializer {
    options: SerializerOptions,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SerializerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    #[instrument(level = "debug", skip_all, err)]
    pub fn serialize<S, W>(&self, source: &mut S, out: &mut W) -> Result<SerializeStats>
    where
        S: RowSource + ?Sized,
        W: Write + ?Sized,
    {
        let mut out = CountingWriter {
            inner: out,
            count: 0,
        };
        let header = Header::from_source(&*source);
        header.serialize(&mut out)?;
        debug!(
            records_affected = header.records_affected(),
            depth = header.depth(),
            "wrote snapshot header"
        );

        let mut stats = SerializeStats::default();
        let mut buffers = RowBuffers::new(self.options.row_buffer_capacity);
        loop {
            let table = TableDescriptor::from_schema(
                &RowSource::schema(&*source)?,
                RowSource::has_rows(&*source)?,
            )
            .wrap_err_with(|| format!("building descriptor of result set {}", stats.result_sets))?;
            table.serialize(&mut out)?;

            let mut rows = 0u64;
            if table.has_rows() {
                while RowSource::read(source)? {
                    buffers.values.clear();
                    for ordinal in 0..table.field_count() {
                        buffers.values.push(RowSource::value(&*source, ordinal)?);
                    }
                    buffers.encode(&table).wrap_err_with(|| {
                        format!("encoding result set {} row {}", stats.result_sets, rows)
                    })?;
                    write_record(&mut out, &buffers.body)?;
                    trace!(row = rows, len = buffers.body.len(), "wrote row");
                    rows += 1;
                }
            }
            Row::write_end(&mut out)?;
            if self.options.flush_each_result_set {
                out.flush()?;
            }

            debug!(
                result_set = stats.result_sets,
                columns = table.field_count(),
                rows,
                "wrote result set"
            );
            stats.result_sets += 1;
            stats.rows += rows;

            if !RowSource::next_result(source)? {
                break;
            }
        }

        TableEntry::write_end(&mut out)?;
        out.flush()?;
        stats.bytes = out.count;
        debug!(?stats, "snapshot complete");
        Ok(stats)
    }

    #[instrument(level = "debug", skip_all, err)]
    pub async fn serialize_async<S, W>(
        &self,
        source: &mut S,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<SerializeStats>
    where
        S: AsyncRowSource + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut stats = SerializeStats::default();
        let mut buffers = RowBuffers::new(self.options.row_buffer_capacity);

        let header = Header::new(
            AsyncRowSource::records_affected(&*source),
            AsyncRowSource::depth(&*source),
        );
        header.serialize(&mut buffers.record)?;
        async_io::write_chunk(out, &buffers.record, cancel).await?;
        stats.bytes += buffers.record.len() as u64;
        debug!(
            records_affected = header.records_affected(),
            depth = header.depth(),
            "wrote snapshot header"
        );

        loop {
            let table = TableDescriptor::from_schema(
                &AsyncRowSource::schema(&*source)?,
                AsyncRowSource::has_rows(&*source)?,
            )
            .wrap_err_with(|| format!("building descriptor of result set {}", stats.result_sets))?;
            buffers.record.clear();
            table.serialize(&mut buffers.record)?;
            async_io::write_chunk(out, &buffers.record, cancel).await?;
            stats.bytes += buffers.record.len() as u64;

            let mut rows = 0u64;
            if table.has_rows() {
                while AsyncRowSource::read(source).await? {
                    buffers.values.clear();
                    for ordinal in 0..table.field_count() {
                        buffers.values.push(AsyncRowSource::value(&*source, ordinal)?);
                    }
                    buffers.encode(&table).wrap_err_with(|| {
                        format!("encoding result set {} row {}", stats.result_sets, rows)
                    })?;
                    buffers.record.clear();
                    write_record(&mut buffers.record, &buffers.body)?;
                    async_io::write_chunk(out, &buffers.record, cancel).await?;
                    stats.bytes += buffers.record.len() as u64;
                    trace!(row = rows, len = buffers.body.len(), "wrote row");
                    rows += 1;
                }
            }

            buffers.record.clear();
            Row::write_end(&mut buffers.record)?;
            async_io::write_chunk(out, &buffers.record, cancel).await?;
            stats.bytes += buffers.record.len() as u64;
            if self.options.flush_each_result_set {
                out.flush().await?;
            }

            debug!(
                result_set = stats.result_sets,
                columns = table.field_count(),
                rows,
                "wrote result set"
            );
            stats.result_sets += 1;
            stats.rows += rows;

            if !AsyncRowSource::next_result(source).await? {
                break;
            }
        }

        buffers.record.clear();
        TableEntry::write_end(&mut buffers.record)?;
        async_io::write_chunk(out, &buffers.record, cancel).await?;
        stats.bytes += buffers.record.len() as u64;
        out.flush().await?;
        debug!(?stats, "snapshot complete");
        Ok(stats)
    }

    /// Parameter collections have no snapshot encoding yet.
    pub fn write_parameters<W: Write + ?Sized>(
        &self,
        _parameters: &[(String, SqlValue)],
        _out: &mut W,
    ) -> Result<()> {
        bail!(SnapError::NotImplemented("parameter collection serialization"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::snap_error;
    use crate::source::{ColumnSchema, ResultSetBuilder};
    use crate::types::ValueKind;
    use async_trait::async_trait;

    fn single_int() -> crate::source::MemorySource {
        ResultSetBuilder::new()
            .column("Id", ValueKind::Int, false)
            .row(vec![SqlValue::from(1)])
            .build()
            .unwrap()
    }

    #[test]
    fn exact_bytes_of_a_single_row_snapshot() {
        let mut out = Vec::new();
        let stats = Serializer::new()
            .serialize(&mut single_int(), &mut out)
            .unwrap();

        assert_eq!(
            out,
            vec![
                1, 1, 0, // header: version, records affected -1, depth 0
                2, 1, 0, 32, 2, b'I', b'd', // one column, has rows
                2, 2, // row: len 1, zig-zag 1
                0, // end of rows
                0, // end of stream
            ]
        );
        assert_eq!(
            stats,
            SerializeStats {
                result_sets: 1,
                rows: 1,
                bytes: out.len() as u64,
            }
        );
    }

    #[test]
    fn result_set_without_rows_still_gets_end_marker() {
        let mut source = ResultSetBuilder::new()
            .column("Id", ValueKind::Int, false)
            .build()
            .unwrap();
        let mut out = Vec::new();
        Serializer::new().serialize(&mut source, &mut out).unwrap();

        assert_eq!(&out[3..], &[2, 0, 0, 32, 2, b'I', b'd', 0, 0]);
    }

    #[test]
    fn empty_source_writes_one_empty_result_set() {
        let mut source = ResultSetBuilder::new().build().unwrap();
        let mut out = Vec::new();
        let stats = Serializer::new().serialize(&mut source, &mut out).unwrap();
        assert_eq!(out, vec![1, 1, 0, 1, 0, 0, 0]);
        assert_eq!(stats.result_sets, 1);
    }

    #[test]
    fn options_builder() {
        let options = SerializerOptions::new()
            .row_buffer_capacity(4096)
            .flush_each_result_set(true);
        let serializer = Serializer::with_options(options.clone());
        assert_eq!(serializer.options(), &options);
        assert_eq!(
            SerializerOptions::default().row_buffer_capacity,
            DEFAULT_ROW_BUFFER_CAPACITY
        );
    }

    struct NullingSource {
        rows_left: usize,
    }

    impl RowSource for NullingSource {
        fn read(&mut self) -> Result<bool> {
            if self.rows_left == 0 {
                return Ok(false);
            }
            self.rows_left -= 1;
            Ok(true)
        }

        fn next_result(&mut self) -> Result<bool> {
            Ok(false)
        }

        fn records_affected(&self) -> i32 {
            -1
        }

        fn depth(&self) -> i32 {
            0
        }

        fn has_rows(&self) -> Result<bool> {
            Ok(true)
        }

        fn schema(&self) -> Result<Vec<ColumnSchema>> {
            Ok(vec![ColumnSchema::new("Id", ValueKind::Int, false)])
        }

        fn value(&self, _ordinal: usize) -> Result<SqlValue> {
            Ok(SqlValue::Int32(None))
        }
    }

    #[test]
    fn null_in_non_nullable_column_fails_the_write() {
        let mut out = Vec::new();
        let err = Serializer::new()
            .serialize(&mut NullingSource { rows_left: 1 }, &mut out)
            .unwrap_err();
        assert!(matches!(snap_error(&err), Some(SnapError::InvalidState(_))));
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn write_parameters_is_not_implemented() {
        let err = Serializer::new()
            .write_parameters(&[("@id".to_string(), SqlValue::from(1))], &mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            snap_error(&err),
            Some(SnapError::NotImplemented(_))
        ));
    }

    #[tokio::test]
    async fn async_output_matches_sync() {
        let build = || {
            ResultSetBuilder::new()
                .column("Id", ValueKind::BigInt, false)
                .column("Note", ValueKind::VarChar, true)
                .row(vec![SqlValue::from(10i64), SqlValue::from("x")])
                .row(vec![SqlValue::from(-3i64), SqlValue::String(None)])
                .result_set()
                .anonymous_column(ValueKind::Bit, true)
                .row(vec![SqlValue::Boolean(Some(true))])
                .records_affected(2)
                .build()
                .unwrap()
        };

        let mut sync_out = Vec::new();
        let sync_stats = Serializer::new()
            .serialize(&mut build(), &mut sync_out)
            .unwrap();

        let mut async_out = Vec::new();
        let async_stats = Serializer::new()
            .serialize_async(&mut build(), &mut async_out, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(async_out, sync_out);
        assert_eq!(async_stats, sync_stats);
        assert_eq!(sync_stats.rows, 3);
    }

    /// Cancels its token after handing out a fixed number of rows.
    struct CancellingSource {
        inner: crate::source::MemorySource,
        cancel: CancellationToken,
        cancel_after: usize,
    }

    #[async_trait]
    impl AsyncRowSource for CancellingSource {
        async fn read(&mut self) -> Result<bool> {
            if self.cancel_after == 0 {
                self.cancel.cancel();
            } else {
                self.cancel_after -= 1;
            }
            RowSource::read(&mut self.inner)
        }

        async fn next_result(&mut self) -> Result<bool> {
            RowSource::next_result(&mut self.inner)
        }

        fn records_affected(&self) -> i32 {
            RowSource::records_affected(&self.inner)
        }

        fn depth(&self) -> i32 {
            RowSource::depth(&self.inner)
        }

        fn has_rows(&self) -> Result<bool> {
            RowSource::has_rows(&self.inner)
        }

        fn schema(&self) -> Result<Vec<ColumnSchema>> {
            RowSource::schema(&self.inner)
        }

        fn value(&self, ordinal: usize) -> Result<SqlValue> {
            RowSource::value(&self.inner, ordinal)
        }
    }

    #[tokio::test]
    async fn cancellation_stops_between_records() {
        let inner = ResultSetBuilder::new()
            .column("Id", ValueKind::Int, false)
            .row(vec![SqlValue::from(1)])
            .row(vec![SqlValue::from(2)])
            .row(vec![SqlValue::from(3)])
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        let mut source = CancellingSource {
            inner,
            cancel: cancel.clone(),
            cancel_after: 1,
        };

        let mut out = Vec::new();
        let err = Serializer::new()
            .serialize_async(&mut source, &mut out, &cancel)
            .await
            .unwrap_err();

        assert_eq!(snap_error(&err), Some(&SnapError::Cancelled));
        // header + descriptor + exactly one row record
        assert_eq!(out.len(), 3 + 7 + 2);
        assert_eq!(&out[10..], &[2, 2]);
    }

    #[tokio::test]
    async fn cancelled_token_writes_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut out = Vec::new();
        let err = Serializer::new()
            .serialize_async(&mut single_int(), &mut out, &cancel)
            .await
            .unwrap_err();
        assert_eq!(snap_error(&err), Some(&SnapError::Cancelled));
        assert!(out.is_empty());
    }
}
