//! CLI module
//!
//! Command-line interface for running the connector.
//!
//! # Commands
//!
//! - `form` - Print the configuration form
//! - `check` - Run a configuration test (`connect` or `table`)
//! - `schema` - Describe the configured table
//! - `sync` - Stream changes as NDJSON
//! - `serve` - Start HTTP server mode

mod commands;
mod runner;
mod server;

pub use commands::{CheckTest, Cli, Commands, OutputFormat};
pub use runner::Runner;
pub use server::{router, serve, ServerConfig};
