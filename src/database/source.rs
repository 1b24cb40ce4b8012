//! Source traits consumed by the change-stream engine

use crate::error::{Error, Result};
use crate::schema::Column;
use async_trait::async_trait;
use mysql_async::{from_value_opt, Row, Value as Native};
use std::collections::HashMap;

/// Operation tag of a row inserted into the table
pub const OPERATION_INSERT: &str = "Insert";
/// Operation tag of an updated row
pub const OPERATION_UPDATE: &str = "Update";
/// Operation tag of a deleted row
pub const OPERATION_DELETE: &str = "Delete";

/// A database-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Backtick-quoted `db`.`table` form
    pub fn escaped(&self) -> String {
        format!(
            "{}.{}",
            super::escape_identifier(&self.database),
            super::escape_identifier(&self.table)
        )
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.escaped())
    }
}

/// One row of the change stream before decoding
#[derive(Debug, Clone, PartialEq)]
pub struct RawChangeRow {
    /// `Insert`, `Update`, `Delete` or a metadata tag
    pub operation: String,
    /// Partition the change belongs to, as reported by the server
    pub partition: i64,
    /// Opaque resume token for that partition
    pub offset: Vec<u8>,
    /// Column values by name, including stream metadata columns
    pub values: HashMap<String, Native>,
}

impl RawChangeRow {
    /// Convert a result row of `OBSERVE`
    pub fn from_row(row: Row) -> Result<Self> {
        let values: HashMap<String, Native> = row
            .columns_ref()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = row.get(i).unwrap_or(Native::NULL);
                (column.name_str().into_owned(), value)
            })
            .collect();

        let operation: String = Self::required(&values, "Type")?;
        let partition: i64 = Self::required(&values, "PartitionId")?;
        let offset: Vec<u8> = Self::required(&values, "Offset")?;

        Ok(Self {
            operation,
            partition,
            offset,
            values,
        })
    }

    fn required<T: mysql_async::prelude::FromValue>(
        values: &HashMap<String, Native>,
        name: &str,
    ) -> Result<T> {
        let value = values
            .get(name)
            .cloned()
            .ok_or_else(|| Error::decode(name, "missing from change stream row"))?;
        from_value_opt(value).map_err(|e| Error::decode(name, e.to_string()))
    }

    /// Value of a column, `None` if the stream did not carry it
    pub fn value(&self, column: &str) -> Option<&Native> {
        self.values.get(column)
    }
}

/// Where change events come from
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Ordered live columns of a table with primary-key flags
    async fn resolve_columns(&self, table: &TableRef) -> Result<Vec<Column>>;

    /// Fixed number of partitions of a database
    async fn partition_count(&self, database: &str) -> Result<usize>;

    /// Start streaming changes from the positions in `resume_literals`
    async fn open_change_stream(
        &self,
        table: &TableRef,
        resume_literals: &str,
    ) -> Result<Box<dyn ChangeCursor>>;
}

/// An open, logically infinite stream of raw change rows
#[async_trait]
pub trait ChangeCursor: Send {
    /// Next row, or `None` once the server closes the stream.
    ///
    /// Cancel safe: dropping the future before it completes loses no row.
    async fn next_row(&mut self) -> Result<Option<RawChangeRow>>;

    /// Stop the stream and release its transport
    async fn close(&mut self) -> Result<()>;
}
