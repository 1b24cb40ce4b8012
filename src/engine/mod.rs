//! Execution engine module
//!
//! Drives a change stream from a table into a sequence of messages.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ChangeStreamReader` - Polls the change stream and decodes events
//! - `Checkpointer` - Decides when offset state is emitted
//! - `PollGuard` - Bounds a single cursor poll so cancellation is prompt
//! - `start_sync` / `run_sync` - Tie reader, offset state and checkpoints together
//! - Message types for output (Record, Checkpoint, Log)

mod checkpoint;
mod guard;
mod reader;
mod selection;
mod types;

pub use checkpoint::Checkpointer;
pub use guard::PollGuard;
pub use reader::ChangeStreamReader;
pub use selection::{selected_columns, SchemaSelection, Selection, TableSelection};
pub use types::{
    ChangeEvent, Message, Operation, ReaderStatus, RecordType, SyncConfig, SyncOutcome, SyncStats,
    DEFAULT_CHECKPOINT_BATCH_SIZE, DEFAULT_POLL_TIMEOUT,
};

use crate::database::{ChangeSource, TableRef};
use crate::error::{Error, Result};
use crate::state::State;
use futures::Stream;
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

// ============================================================================
// Sync Driver
// ============================================================================

/// Stream one table's changes into `tx` until the stream ends, `cancel`
/// fires, or an error occurs.
///
/// Without prior state a fresh state sized by the database's partition count
/// is used. After every accepted event the state is advanced before the
/// checkpoint cadence is evaluated. A final checkpoint is emitted when the
/// stream completes or is cancelled, never on error.
pub async fn run_sync(
    source: Arc<dyn ChangeSource>,
    table: TableRef,
    selection: Option<HashSet<String>>,
    prior_state: Option<State>,
    config: SyncConfig,
    cancel: CancellationToken,
    tx: mpsc::Sender<Message>,
) -> Result<SyncOutcome> {
    config.validate()?;
    let start = Instant::now();

    let mut state = match prior_state {
        Some(state) => state,
        None => State::new(
            source
                .partition_count(&table.database)
                .await
                .map_err(|e| sync_failed(&table, 0, e))?,
        ),
    };

    info!(table = %table, partitions = state.len(), "Sync STARTING");
    let _ = tx
        .send(Message::info(format!(
            "Starting change stream for {table} across {} partitions",
            state.len()
        )))
        .await;

    let mut reader = ChangeStreamReader::open(
        Arc::clone(&source),
        table.clone(),
        selection.as_ref(),
        PollGuard::new(config.poll_timeout),
    )
    .await
    .map_err(|e| sync_failed(&table, 0, e))?;
    reader
        .start(&state)
        .await
        .map_err(|e| sync_failed(&table, 0, e))?;

    let mut checkpointer = Checkpointer::new(config.checkpoint_batch_size);
    let mut stats = SyncStats::new();

    loop {
        let event = match reader.next_event(&cancel).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(e) => return Err(sync_failed(&table, stats.events(), e)),
        };

        let record = Message::record(
            &table.database,
            &table.table,
            event.operation.record_type(),
            event.row,
        );
        if !emit(&tx, record, &cancel).await {
            reader.cancel().await;
            break;
        }

        state.set_offset(event.partition, event.offset);
        stats.add_event(event.operation);

        if checkpointer.record_event() {
            if !emit(&tx, Message::checkpoint(&state), &cancel).await {
                reader.cancel().await;
                break;
            }
            stats.add_checkpoint();
            debug!(events = stats.events(), checkpoints = stats.checkpoints, "Checkpoint emitted");
        }
    }

    // Final checkpoint for the partial batch; the receiver may already be gone
    if tx.send(Message::checkpoint(&state)).await.is_ok() {
        stats.add_checkpoint();
        debug!(pending = checkpointer.pending(), "Final checkpoint emitted");
    }

    stats.skipped = reader.skipped();
    stats.set_duration(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));

    let status = reader.status();
    if status == ReaderStatus::Cancelled {
        warn!(table = %table, events = stats.events(), "Sync cancelled");
    }
    info!(
        table = %table,
        events = stats.events(),
        checkpoints = stats.checkpoints,
        duration_ms = stats.duration_ms,
        "Sync DONE"
    );

    Ok(SyncOutcome {
        state,
        status,
        stats,
    })
}

fn sync_failed(table: &TableRef, events: u64, e: Error) -> Error {
    error!(table = %table, error = %e, events, "Sync FAILED");
    e
}

/// Send unless cancelled first; `false` when the message was not delivered
async fn emit(tx: &mpsc::Sender<Message>, message: Message, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send(message) => sent.is_ok(),
    }
}

/// Spawn [`run_sync`] on its own task.
///
/// Returns the message stream and a handle resolving to the final state.
/// Dropping the stream cancels the sync.
pub fn start_sync(
    source: Arc<dyn ChangeSource>,
    table: TableRef,
    selection: Option<HashSet<String>>,
    prior_state: Option<State>,
    config: SyncConfig,
    cancel: CancellationToken,
) -> (MessageStream, JoinHandle<Result<SyncOutcome>>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let guard = cancel.clone().drop_guard();

    let handle = tokio::spawn(run_sync(
        source,
        table,
        selection,
        prior_state,
        config,
        cancel,
        tx,
    ));

    (
        MessageStream {
            rx,
            _cancel_on_drop: guard,
        },
        handle,
    )
}

/// Wait for a spawned sync and flatten a panicked or aborted task into an error
pub async fn join_sync(handle: JoinHandle<Result<SyncOutcome>>) -> Result<SyncOutcome> {
    handle
        .await
        .map_err(|e| Error::Other(format!("sync task failed: {e}")))?
}

/// Messages produced by a running sync
#[derive(Debug)]
pub struct MessageStream {
    rx: mpsc::Receiver<Message>,
    _cancel_on_drop: DropGuard,
}

impl MessageStream {
    /// Receive the next message, `None` once the sync has finished
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Stream for MessageStream {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
