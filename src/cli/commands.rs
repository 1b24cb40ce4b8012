//! CLI commands and argument parsing

use crate::config::{TEST_CONNECT, TEST_TABLE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SingleStore change-stream connector CLI
#[derive(Parser, Debug)]
#[command(name = "singlestore-cdc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source configuration file (JSON or YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline configuration JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON), rewritten at every checkpoint
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the configuration form
    Form,

    /// Run a configuration test
    Check {
        /// Which test to run
        #[arg(long, value_enum, default_value = "connect")]
        test: CheckTest,
    },

    /// Describe the configured table
    Schema,

    /// Stream changes from the configured table
    Sync {
        /// Columns to read (comma-separated, default = all)
        #[arg(long)]
        columns: Option<String>,

        /// Events between checkpoints
        #[arg(long, default_value = "10000")]
        batch_size: usize,

        /// Longest a single poll of the stream may block, in milliseconds
        #[arg(long, default_value = "1000")]
        poll_timeout_ms: u64,
    },

    /// Start HTTP server mode
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "50051")]
        port: u16,
    },
}

/// Configuration test names
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CheckTest {
    /// Open a session and run a trivial query
    Connect,
    /// Verify the configured table exists
    Table,
}

impl CheckTest {
    /// Name used in the configuration form
    pub fn as_str(self) -> &'static str {
        match self {
            CheckTest::Connect => TEST_CONNECT,
            CheckTest::Table => TEST_TABLE,
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync() {
        let cli = Cli::parse_from([
            "singlestore-cdc",
            "sync",
            "--config-json",
            "{}",
            "--columns",
            "a,b",
            "--batch-size",
            "5",
        ]);
        assert_eq!(cli.config_json.as_deref(), Some("{}"));
        match cli.command {
            Commands::Sync {
                columns,
                batch_size,
                poll_timeout_ms,
            } => {
                assert_eq!(columns.as_deref(), Some("a,b"));
                assert_eq!(batch_size, 5);
                assert_eq!(poll_timeout_ms, 1000);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_check_and_serve_defaults() {
        let cli = Cli::parse_from(["singlestore-cdc", "check", "--test", "table"]);
        assert!(matches!(cli.command, Commands::Check { test: CheckTest::Table }));
        assert_eq!(CheckTest::Table.as_str(), "table");

        let cli = Cli::parse_from(["singlestore-cdc", "serve"]);
        assert!(matches!(cli.command, Commands::Serve { port: 50051 }));
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
