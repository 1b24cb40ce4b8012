//! Change stream reader
//!
//! Resolves the columns to read once, opens the change stream at the
//! positions held by the offset state and turns raw rows into
//! [`ChangeEvent`]s.

use super::guard::PollGuard;
use super::types::{ChangeEvent, Operation, ReaderStatus};
use crate::database::{ChangeCursor, ChangeSource, RawChangeRow, TableRef};
use crate::error::{Error, Result};
use crate::schema::Column;
use crate::state::State;
use crate::value::{decode_value, Row, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reads one table's change stream
pub struct ChangeStreamReader {
    source: Arc<dyn ChangeSource>,
    table: TableRef,
    /// Selected columns in table order, synthetic key last if present
    columns: Vec<Column>,
    /// Subset of `columns` flagged as primary key, never empty
    key_columns: Vec<Column>,
    guard: PollGuard,
    cursor: Option<Box<dyn ChangeCursor>>,
    partitions: usize,
    status: ReaderStatus,
    skipped: u64,
}

impl ChangeStreamReader {
    /// Resolve the table's columns and apply the selection.
    ///
    /// When no selected column is a primary key, a synthetic identity column
    /// is appended so delete events always carry a key.
    pub async fn open(
        source: Arc<dyn ChangeSource>,
        table: TableRef,
        selection: Option<&HashSet<String>>,
        guard: PollGuard,
    ) -> Result<Self> {
        let mut columns = source.resolve_columns(&table).await?;
        if let Some(selected) = selection {
            columns.retain(|c| selected.contains(&c.name));
        }
        if !columns.iter().any(|c| c.primary_key) {
            let key = Column::synthetic_key();
            if columns.iter().any(|c| c.name == key.name) {
                return Err(Error::schema(format!(
                    "table {table} has no primary key and a column named {}",
                    key.name
                )));
            }
            debug!(table = %table, column = %key.name, "No primary key selected, using synthetic key");
            columns.push(key);
        }
        let key_columns = columns.iter().filter(|c| c.primary_key).cloned().collect();

        Ok(Self {
            source,
            table,
            columns,
            key_columns,
            guard,
            cursor: None,
            partitions: 0,
            status: ReaderStatus::Idle,
            skipped: 0,
        })
    }

    /// Open the change stream at the positions in `state`
    pub async fn start(&mut self, state: &State) -> Result<()> {
        if self.status != ReaderStatus::Idle {
            return Err(Error::state(format!(
                "reader cannot start from status {:?}",
                self.status
            )));
        }
        match self
            .source
            .open_change_stream(&self.table, &state.offsets_as_sql())
            .await
        {
            Ok(cursor) => {
                self.cursor = Some(cursor);
                self.partitions = state.len();
                self.status = ReaderStatus::Streaming;
                Ok(())
            }
            Err(e) => {
                self.status = ReaderStatus::Failed;
                Err(e)
            }
        }
    }

    /// Next accepted event.
    ///
    /// Returns `Ok(None)` once the stream is closed by the server or
    /// `cancel` fires. Rows with metadata operation tags are skipped.
    pub async fn next_event(&mut self, cancel: &CancellationToken) -> Result<Option<ChangeEvent>> {
        loop {
            if self.status != ReaderStatus::Streaming {
                return Ok(None);
            }
            if cancel.is_cancelled() {
                self.finish(ReaderStatus::Cancelled).await;
                return Ok(None);
            }

            let Some(cursor) = self.cursor.as_mut() else {
                return Err(Error::state("reader is streaming without a cursor"));
            };
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                polled = self.guard.poll(cursor.next_row()) => polled,
            };
            let Some(next) = polled else {
                continue;
            };

            let raw = match next {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    self.finish(ReaderStatus::Completed).await;
                    return Ok(None);
                }
                Err(e) => {
                    self.finish(ReaderStatus::Failed).await;
                    return Err(e);
                }
            };

            match self.to_event(raw) {
                Ok(Some(event)) => return Ok(Some(event)),
                Ok(None) => self.skipped += 1,
                Err(e) => {
                    self.finish(ReaderStatus::Failed).await;
                    return Err(e);
                }
            }
        }
    }

    fn to_event(&self, raw: RawChangeRow) -> Result<Option<ChangeEvent>> {
        let Some(operation) = Operation::from_tag(&raw.operation) else {
            return Ok(None);
        };

        let partition = usize::try_from(raw.partition)
            .ok()
            .filter(|p| *p < self.partitions)
            .ok_or_else(|| {
                Error::state(format!(
                    "partition {} is outside the {} partitions of the offset state",
                    raw.partition, self.partitions
                ))
            })?;

        let columns = match operation {
            Operation::Delete => &self.key_columns,
            Operation::Insert | Operation::Update => &self.columns,
        };

        Ok(Some(ChangeEvent {
            operation,
            partition,
            offset: hex::encode(&raw.offset),
            row: decode_row(columns, &raw)?,
        }))
    }

    async fn finish(&mut self, status: ReaderStatus) {
        self.status = status;
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close().await {
                warn!(table = %self.table, error = %e, "Failed to close change stream");
            }
        }
    }

    /// Stop reading and release the stream
    pub async fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.finish(ReaderStatus::Cancelled).await;
        }
    }

    pub fn status(&self) -> ReaderStatus {
        self.status
    }

    /// Columns decoded for inserts and updates
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns decoded for deletes
    pub fn key_columns(&self) -> &[Column] {
        &self.key_columns
    }

    /// Rows ignored because of their operation tag
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// Decode the given columns of a raw row; columns the row lacks decode to NULL
fn decode_row(columns: &[Column], raw: &RawChangeRow) -> Result<Row> {
    columns
        .iter()
        .map(|column| {
            let value = match raw.value(&column.name) {
                Some(native) => decode_value(&column.name, column.data_type, native)?,
                None => Value::Null,
            };
            Ok((column.name.clone(), value))
        })
        .collect()
}
