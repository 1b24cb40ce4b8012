//! `OBSERVE` result cursor
//!
//! The query runs on a dedicated connection inside a spawned task that
//! forwards rows through a bounded channel, so receiving a row is cancel safe.

use super::connection::connect;
use super::source::{ChangeCursor, RawChangeRow};
use crate::config::SourceConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::Conn;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Rows buffered between the reading task and the consumer
const ROW_BUFFER: usize = 256;

/// Cursor over a running `OBSERVE` query
#[derive(Debug)]
pub struct ObserveCursor {
    config: SourceConfig,
    connection_id: u32,
    rows: mpsc::Receiver<Result<RawChangeRow>>,
    task: JoinHandle<()>,
    closed: bool,
}

impl ObserveCursor {
    /// Connect and start the query
    pub async fn open(config: SourceConfig, sql: String) -> Result<Self> {
        let conn = connect(&config).await?;
        let connection_id = conn.id();
        let (tx, rows) = mpsc::channel(ROW_BUFFER);

        debug!(connection_id, "Starting change stream query");
        let task = tokio::spawn(run_query(conn, sql, tx));

        Ok(Self {
            config,
            connection_id,
            rows,
            task,
            closed: false,
        })
    }
}

async fn run_query(mut conn: Conn, sql: String, tx: mpsc::Sender<Result<RawChangeRow>>) {
    if let Err(e) = forward_rows(&mut conn, &sql, &tx).await {
        // Receiver may be gone already
        let _ = tx.send(Err(e)).await;
    }
    if let Err(e) = conn.disconnect().await {
        debug!(error = %e, "Change stream connection did not close cleanly");
    }
}

async fn forward_rows(
    conn: &mut Conn,
    sql: &str,
    tx: &mpsc::Sender<Result<RawChangeRow>>,
) -> Result<()> {
    let mut result = conn.query_iter(sql).await.map_err(Error::from_driver)?;

    while let Some(row) = result.next().await.map_err(Error::from_driver)? {
        let row = RawChangeRow::from_row(row)?;
        if tx.send(Ok(row)).await.is_err() {
            return Ok(());
        }
    }

    Ok(())
}

#[async_trait]
impl ChangeCursor for ObserveCursor {
    async fn next_row(&mut self) -> Result<Option<RawChangeRow>> {
        match self.rows.recv().await {
            Some(row) => row.map(Some),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.rows.close();

        if self.task.is_finished() {
            return Ok(());
        }
        self.task.abort();

        // The server keeps the query running until told otherwise
        match connect(&self.config).await {
            Ok(mut side) => {
                let kill = format!("KILL QUERY {}", self.connection_id);
                if let Err(e) = side.query_drop(kill).await {
                    warn!(connection_id = self.connection_id, error = %e, "Failed to cancel change stream query");
                }
                let _ = side.disconnect().await;
            }
            Err(e) => {
                warn!(connection_id = self.connection_id, error = %e, "Failed to connect to cancel change stream query");
            }
        }

        Ok(())
    }
}

impl Drop for ObserveCursor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
