// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # SingleStore Change Data Capture
//!
//! A source connector that streams row changes from a SingleStore table
//! through the `OBSERVE` change stream, with resumable per-partition offsets.
//!
//! ## Features
//!
//! - **Change stream reading**: Inserts, updates and deletes decoded into
//!   canonical values
//! - **Resumable offsets**: One opaque token per database partition,
//!   checkpointed every N events
//! - **Type mapping**: SingleStore column types to canonical types, including
//!   `VECTOR` columns in either projection format
//! - **Prompt cancellation**: Every poll of the stream is bounded
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use singlestore_cdc::{engine, ChangeSource, SingleStoreConnection, SourceConfig};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> singlestore_cdc::Result<()> {
//!     let config = SourceConfig::from_file("source.yaml")?;
//!     let connection = SingleStoreConnection::new(config);
//!     let table = connection.table_ref();
//!     let source: Arc<dyn ChangeSource> = Arc::new(connection);
//!
//!     let (mut messages, handle) = engine::start_sync(
//!         source,
//!         table,
//!         None,
//!         None,
//!         engine::SyncConfig::default(),
//!         CancellationToken::new(),
//!     );
//!     while let Some(msg) = messages.next().await {
//!         println!("{}", msg.to_json());
//!     }
//!
//!     let outcome = engine::join_sync(handle).await?;
//!     println!("resume with {}", outcome.state.to_json());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Engine                               │
//! │  start_sync(source, table, selection, state) → Stream<Message>  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌────────────┬─────────────┬───┴─────────┬────────────┬───────────┐
//! │  Database  │   Schema    │    Value    │   State    │  Config   │
//! ├────────────┼─────────────┼─────────────┼────────────┼───────────┤
//! │ OBSERVE    │ Type mapper │ Canonical   │ Offsets    │ Form      │
//! │ Metadata   │ Columns     │ Decoding    │ Checkpoint │ SSL modes │
//! │ KILL QUERY │ VECTOR      │ Rendering   │ State file │ Driver    │
//! └────────────┴─────────────┴─────────────┴────────────┴───────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Canonical value model
pub mod value;

/// Column types and the native type mapper
pub mod schema;

/// Offset state and persistence
pub mod state;

/// Source configuration and configuration form
pub mod config;

/// SingleStore connection and change stream cursor
pub mod database;

/// Change stream reader and sync driver
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::SourceConfig;
pub use database::{ChangeSource, SingleStoreConnection, TableRef};
pub use engine::{start_sync, Message, SyncConfig};
pub use state::{State, StateManager};
pub use value::{DataType, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
