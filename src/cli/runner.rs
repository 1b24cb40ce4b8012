//! CLI runner - executes commands

use crate::cli::commands::{CheckTest, Cli, Commands, OutputFormat};
use crate::cli::server::{serve, ServerConfig};
use crate::config::{configuration_form, SourceConfig};
use crate::database::{ChangeSource, SingleStoreConnection};
use crate::engine::{join_sync, start_sync, Message, SyncConfig};
use crate::error::{Error, Result, ResultExt};
use crate::state::StateManager;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Form => self.form(),
            Commands::Check { test } => self.check(*test).await,
            Commands::Schema => self.schema().await,
            Commands::Sync {
                columns,
                batch_size,
                poll_timeout_ms,
            } => {
                let config = SyncConfig::new()
                    .with_checkpoint_batch_size(*batch_size)
                    .with_poll_timeout(Duration::from_millis(*poll_timeout_ms));
                self.sync(columns.as_deref(), config).await
            }
            Commands::Serve { port } => serve(ServerConfig::default(), *port).await,
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<SourceConfig> {
        // Inline config takes precedence
        if let Some(json_str) = &self.cli.config_json {
            return SourceConfig::from_json(json_str);
        }

        if let Some(path) = &self.cli.config {
            return SourceConfig::from_file(path);
        }

        Err(Error::config(
            "Configuration not specified (use --config or --config-json)",
        ))
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
                .with_context(|| format!("Cannot resume from {}", path.display()))
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Print the configuration form
    fn form(&self) -> Result<()> {
        self.output_message(&serde_json::to_value(configuration_form())?);
        Ok(())
    }

    /// Run one configuration test
    async fn check(&self, test: CheckTest) -> Result<()> {
        let connection = SingleStoreConnection::new(self.load_config()?);

        let result = match test {
            CheckTest::Connect => connection.check_connection().await,
            CheckTest::Table => connection.check_table_existence().await,
        };

        let status = match result {
            Ok(()) => json!({
                "test": test.as_str(),
                "status": "SUCCEEDED",
            }),
            Err(e) => json!({
                "test": test.as_str(),
                "status": "FAILED",
                "message": e.to_string(),
            }),
        };
        self.output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": status,
        }));

        Ok(())
    }

    /// Describe the configured table
    async fn schema(&self) -> Result<()> {
        let connection = SingleStoreConnection::new(self.load_config()?);
        let schemas = connection.schema().await?;

        self.output_message(&json!({
            "type": "SCHEMA",
            "schemas": schemas,
        }));
        Ok(())
    }

    /// Stream changes until the server closes the stream or Ctrl-C
    async fn sync(&self, columns: Option<&str>, config: SyncConfig) -> Result<()> {
        let connection = SingleStoreConnection::new(self.load_config()?);
        let table = connection.table_ref();
        let source: Arc<dyn ChangeSource> = Arc::new(connection);

        let state_manager = self.load_state()?;
        let prior_state = state_manager.state().await;
        let selection = columns.map(parse_columns);

        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping sync");
                    cancel.cancel();
                }
            }
        });

        let (mut messages, handle) =
            start_sync(source, table, selection, prior_state, config, cancel);

        while let Some(msg) = messages.next().await {
            if let Message::Checkpoint { state_json } = &msg {
                state_manager.checkpoint(state_json).await?;
            }
            self.output_message(&msg.to_json());
        }

        let outcome = join_sync(handle).await;
        interrupt.abort();
        let outcome = outcome?;

        info!(
            status = ?outcome.status,
            inserts = outcome.stats.inserts,
            updates = outcome.stats.updates,
            deletes = outcome.stats.deletes,
            skipped = outcome.stats.skipped,
            "Sync finished"
        );
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Split a comma-separated column list, ignoring blanks
fn parse_columns(columns: &str) -> HashSet<String> {
    columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}
