//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State manager for persisting and loading offset state
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file
    path: PathBuf,
    /// Last known state (cached); `None` until the first checkpoint of a fresh sync
    state: Arc<RwLock<Option<State>>>,
}

impl StateManager {
    /// Create a new state manager with the given path, without reading it
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::new(PathBuf::new())
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| Error::State {
                message: format!("Failed to read state file: {e}"),
            })?;
            State::from_prior_json(Some(&contents))?
        } else {
            None
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Create an in-memory state manager from an inline JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(State::from_prior_json(Some(json))?)),
        })
    }

    /// Save current state to file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = match &*self.state.read().await {
            Some(state) => state.to_json(),
            None => return Ok(()),
        };

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to write state file: {e}"),
            })?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to rename state file: {e}"),
            })?;

        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> Option<State> {
        self.state.read().await.clone()
    }

    /// Replace the current state and persist it
    pub async fn update(&self, state: State) -> Result<()> {
        *self.state.write().await = Some(state);
        self.save().await
    }

    /// Record a serialized checkpoint and persist it
    pub async fn checkpoint(&self, state_json: &str) -> Result<()> {
        self.update(State::from_json(state_json)?).await
    }

    /// Export state as a JSON document, `{}` when nothing is recorded yet
    pub async fn to_json(&self) -> String {
        self.state
            .read()
            .await
            .as_ref()
            .map_or_else(|| "{}".to_string(), State::to_json)
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
        }
    }
}
