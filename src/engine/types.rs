//! Engine types
//!
//! Change events, output messages and configuration for the sync engine.

use crate::error::{Error, Result};
use crate::state::State;
use crate::types::{JsonValue, LogLevel};
use crate::value::Row;
use serde::{Serialize, Serializer};
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Change Events
// ============================================================================

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// Parse the stream's operation tag; metadata tags yield `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            crate::database::OPERATION_INSERT => Some(Operation::Insert),
            crate::database::OPERATION_UPDATE => Some(Operation::Update),
            crate::database::OPERATION_DELETE => Some(Operation::Delete),
            _ => None,
        }
    }

    /// Record type handed downstream
    pub fn record_type(self) -> RecordType {
        match self {
            Operation::Insert => RecordType::Upsert,
            Operation::Update => RecordType::Update,
            Operation::Delete => RecordType::Delete,
        }
    }
}

/// A decoded change with the position it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub operation: Operation,
    /// Partition index into the offset state
    pub partition: usize,
    /// Hex-encoded resume token for that partition
    pub offset: String,
    /// Key columns only for deletes, all selected columns otherwise
    pub row: Row,
}

/// Record type of an emitted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    Upsert,
    Update,
    Delete,
}

// ============================================================================
// Messages
// ============================================================================

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A changed row
    Record {
        schema: String,
        table: String,
        record_type: RecordType,
        data: Row,
    },
    /// Offset state to persist
    Checkpoint {
        /// Serialized offset state document
        state_json: String,
    },
    /// Log message
    Log { level: LogLevel, message: String },
}

impl Message {
    /// Create a record message
    pub fn record(
        schema: impl Into<String>,
        table: impl Into<String>,
        record_type: RecordType,
        data: Row,
    ) -> Self {
        Self::Record {
            schema: schema.into(),
            table: table.into(),
            record_type,
            data,
        }
    }

    /// Create a checkpoint message from the current state
    pub fn checkpoint(state: &State) -> Self {
        Self::Checkpoint {
            state_json: state.to_json(),
        }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a checkpoint message
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, Self::Checkpoint { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }

    /// Render as one line-oriented JSON object
    pub fn to_json(&self) -> JsonValue {
        match self {
            Message::Record {
                schema,
                table,
                record_type,
                data,
            } => json!({
                "type": "RECORD",
                "schema": schema,
                "table": table,
                "record_type": record_type,
                "data": data,
            }),
            Message::Checkpoint { state_json } => json!({
                "type": "CHECKPOINT",
                "state": serde_json::from_str::<JsonValue>(state_json)
                    .unwrap_or_else(|_| JsonValue::String(state_json.clone())),
            }),
            Message::Log { level, message } => json!({
                "type": "LOG",
                "level": level,
                "message": message,
            }),
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Default number of events between checkpoints
pub const DEFAULT_CHECKPOINT_BATCH_SIZE: usize = 10_000;

/// Default bound on a single cursor poll
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Events between checkpoints
    pub checkpoint_batch_size: usize,
    /// Longest a single cursor poll may block
    pub poll_timeout: Duration,
    /// Messages buffered ahead of the consumer
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            checkpoint_batch_size: DEFAULT_CHECKPOINT_BATCH_SIZE,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            channel_capacity: 1024,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set checkpoint batch size
    #[must_use]
    pub fn with_checkpoint_batch_size(mut self, size: usize) -> Self {
        self.checkpoint_batch_size = size;
        self
    }

    /// Set poll timeout
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set message channel capacity
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_batch_size == 0 {
            return Err(Error::invalid_value(
                "checkpoint_batch_size",
                "must be at least 1",
            ));
        }
        if self.poll_timeout.is_zero() {
            return Err(Error::invalid_value("poll_timeout", "must be positive"));
        }
        if self.channel_capacity == 0 {
            return Err(Error::invalid_value("channel_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Status and Statistics
// ============================================================================

/// Lifecycle of a change stream reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderStatus {
    #[default]
    Idle,
    Streaming,
    /// The server closed the stream
    Completed,
    Cancelled,
    Failed,
}

impl ReaderStatus {
    /// Whether the reader has stopped
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReaderStatus::Completed | ReaderStatus::Cancelled | ReaderStatus::Failed
        )
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    /// Rows with a non-data operation tag
    pub skipped: u64,
    pub checkpoints: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an accepted event
    pub fn add_event(&mut self, operation: Operation) {
        match operation {
            Operation::Insert => self.inserts += 1,
            Operation::Update => self.updates += 1,
            Operation::Delete => self.deletes += 1,
        }
    }

    /// Total accepted events
    pub fn events(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }

    /// Add a checkpoint
    pub fn add_checkpoint(&mut self) {
        self.checkpoints += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// What a finished sync hands back
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Offset state after the last emitted event
    pub state: State,
    pub status: ReaderStatus,
    pub stats: SyncStats,
}
