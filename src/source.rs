//! # Row Sources
//!
//! The forward-only cursor abstraction the serializer consumes.
//!
//! A source is positioned on its first result set when handed over. `read`
//! advances to the next row of the current result set, `next_result` moves to
//! the following result set. Column metadata and values always refer to the
//! current position.
//!
//! ## Traits
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`RowSource`] | `Serializer::serialize` |
//! | [`AsyncRowSource`] | `Serializer::serialize_async` |
//!
//! Every `RowSource + Send` is also an `AsyncRowSource`, so in-memory sources
//! and snapshot readers work with both serializer paths.
//!
//! ## In-Memory Source
//!
//! ```ignore
//! let source = ResultSetBuilder::new()
//!     .column("Id", ValueKind::Int, false)
//!     .column("Name", ValueKind::NVarChar, true)
//!     .row(vec![SqlValue::from(1), SqlValue::from("a")])
//!     .result_set()
//!     .build()?;
//! ```

use async_trait::async_trait;
use eyre::{bail, ensure, Result};

use crate::error::SnapError;
use crate::protocol::TableDescriptor;
use crate::types::{SqlValue, TypeDescriptor, ValueKind};

/// Name, kind and nullability of one column of the current result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: Option<String>,
    pub kind: ValueKind,
    pub allow_null: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ValueKind, allow_null: bool) -> Self {
        Self {
            name: Some(name.into()),
            kind,
            allow_null,
        }
    }

    pub fn anonymous(kind: ValueKind, allow_null: bool) -> Self {
        Self {
            name: None,
            kind,
            allow_null,
        }
    }
}

pub trait RowSource {
    /// Advances to the next row. Returns false once the result set is exhausted.
    fn read(&mut self) -> Result<bool>;

    /// Moves to the next result set. Returns false when there is none.
    fn next_result(&mut self) -> Result<bool>;

    /// Rows changed by the statement, or -1 when not applicable.
    fn records_affected(&self) -> i32;

    fn depth(&self) -> i32;

    fn has_rows(&self) -> Result<bool>;

    fn schema(&self) -> Result<Vec<ColumnSchema>>;

    /// Value of `ordinal` in the current row.
    fn value(&self, ordinal: usize) -> Result<SqlValue>;
}

impl<S: RowSource + ?Sized> RowSource for &mut S {
    fn read(&mut self) -> Result<bool> {
        (**self).read()
    }

    fn next_result(&mut self) -> Result<bool> {
        (**self).next_result()
    }

    fn records_affected(&self) -> i32 {
        (**self).records_affected()
    }

    fn depth(&self) -> i32 {
        (**self).depth()
    }

    fn has_rows(&self) -> Result<bool> {
        (**self).has_rows()
    }

    fn schema(&self) -> Result<Vec<ColumnSchema>> {
        (**self).schema()
    }

    fn value(&self, ordinal: usize) -> Result<SqlValue> {
        (**self).value(ordinal)
    }
}

/// Async counterpart of [`RowSource`]. Only cursor movement awaits; metadata
/// and values of the current row are already in memory.
#[async_trait]
pub trait AsyncRowSource: Send {
    async fn read(&mut self) -> Result<bool>;

    async fn next_result(&mut self) -> Result<bool>;

    fn records_affected(&self) -> i32;

    fn depth(&self) -> i32;

    fn has_rows(&self) -> Result<bool>;

    fn schema(&self) -> Result<Vec<ColumnSchema>>;

    fn value(&self, ordinal: usize) -> Result<SqlValue>;
}

#[async_trait]
impl<S: RowSource + Send> AsyncRowSource for S {
    async fn read(&mut self) -> Result<bool> {
        RowSource::read(self)
    }

    async fn next_result(&mut self) -> Result<bool> {
        RowSource::next_result(self)
    }

    fn records_affected(&self) -> i32 {
        RowSource::records_affected(self)
    }

    fn depth(&self) -> i32 {
        RowSource::depth(self)
    }

    fn has_rows(&self) -> Result<bool> {
        RowSource::has_rows(self)
    }

    fn schema(&self) -> Result<Vec<ColumnSchema>> {
        RowSource::schema(self)
    }

    fn value(&self, ordinal: usize) -> Result<SqlValue> {
        RowSource::value(self, ordinal)
    }
}

#[derive(Debug, Clone, Default)]
struct ResultSet {
    schema: Vec<ColumnSchema>,
    rows: Vec<Vec<SqlValue>>,
}

/// A row source over result sets held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    sets: Vec<ResultSet>,
    set: usize,
    /// Rows consumed in the current set; the current row is `cursor - 1`.
    cursor: usize,
    records_affected: i32,
    depth: i32,
}

impl MemorySource {
    pub fn builder() -> ResultSetBuilder {
        ResultSetBuilder::new()
    }

    pub fn result_set_count(&self) -> usize {
        self.sets.len()
    }

    fn current_set(&self) -> Option<&ResultSet> {
        self.sets.get(self.set)
    }

    fn current_row(&self) -> Result<&[SqlValue]> {
        let Some(set) = self.current_set() else {
            bail!(SnapError::NoData);
        };
        match self.cursor.checked_sub(1).and_then(|i| set.rows.get(i)) {
            Some(row) => Ok(row),
            None => bail!(SnapError::NoData),
        }
    }
}

impl RowSource for MemorySource {
    fn read(&mut self) -> Result<bool> {
        let Some(set) = self.current_set() else {
            return Ok(false);
        };
        if self.cursor < set.rows.len() {
            self.cursor += 1;
            Ok(true)
        } else {
            self.cursor = set.rows.len() + 1;
            Ok(false)
        }
    }

    fn next_result(&mut self) -> Result<bool> {
        if self.set < self.sets.len() {
            self.set += 1;
        }
        self.cursor = 0;
        Ok(self.set < self.sets.len())
    }

    fn records_affected(&self) -> i32 {
        self.records_affected
    }

    fn depth(&self) -> i32 {
        self.depth
    }

    fn has_rows(&self) -> Result<bool> {
        Ok(self.current_set().is_some_and(|set| !set.rows.is_empty()))
    }

    fn schema(&self) -> Result<Vec<ColumnSchema>> {
        Ok(self
            .current_set()
            .map(|set| set.schema.clone())
            .unwrap_or_default())
    }

    fn value(&self, ordinal: usize) -> Result<SqlValue> {
        let row = self.current_row()?;
        match row.get(ordinal) {
            Some(value) => Ok(value.clone()),
            None => bail!(SnapError::ColumnOutOfRange {
                ordinal,
                field_count: row.len(),
            }),
        }
    }
}

/// Fluent builder for [`MemorySource`].
///
/// `column` and `row` apply to the result set opened by the most recent
/// `result_set` call; the first one is opened implicitly.
#[derive(Debug, Clone)]
pub struct ResultSetBuilder {
    sets: Vec<ResultSet>,
    records_affected: i32,
    depth: i32,
}

impl Default for ResultSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSetBuilder {
    pub fn new() -> Self {
        Self {
            sets: Vec::new(),
            records_affected: -1,
            depth: 0,
        }
    }

    fn last(&mut self) -> &mut ResultSet {
        if self.sets.is_empty() {
            self.sets.push(ResultSet::default());
        }
        let last = self.sets.len() - 1;
        &mut self.sets[last]
    }

    /// Opens a new, empty result set.
    pub fn result_set(mut self) -> Self {
        self.sets.push(ResultSet::default());
        self
    }

    pub fn column(mut self, name: impl Into<String>, kind: ValueKind, allow_null: bool) -> Self {
        self.last().schema.push(ColumnSchema::new(name, kind, allow_null));
        self
    }

    pub fn anonymous_column(mut self, kind: ValueKind, allow_null: bool) -> Self {
        self.last().schema.push(ColumnSchema::anonymous(kind, allow_null));
        self
    }

    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.last().rows.push(values);
        self
    }

    pub fn records_affected(mut self, records_affected: i32) -> Self {
        self.records_affected = records_affected;
        self
    }

    pub fn depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    /// Checks every row against its result set's columns and builds the source.
    pub fn build(self) -> Result<MemorySource> {
        for (index, set) in self.sets.iter().enumerate() {
            TableDescriptor::from_schema(&set.schema, !set.rows.is_empty())?;
            for (row_index, row) in set.rows.iter().enumerate() {
                ensure!(
                    row.len() == set.schema.len(),
                    SnapError::InvalidState(format!(
                        "result set {} row {} has {} values for {} columns",
                        index,
                        row_index,
                        row.len(),
                        set.schema.len()
                    ))
                );
                for (column, value) in set.schema.iter().zip(row) {
                    let desc = TypeDescriptor::get(column.kind);
                    if value.provider_type() != desc.provider {
                        bail!(SnapError::InvalidCast {
                            requested: desc.provider.name(),
                            actual: value.provider_type().name(),
                        });
                    }
                }
            }
        }
        Ok(MemorySource {
            sets: self.sets,
            set: 0,
            cursor: 0,
            records_affected: self.records_affected,
            depth: self.depth,
        })
    }
}
