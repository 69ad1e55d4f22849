//! State manager implementation
//!
//! File-backed cursor persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Loads, updates and saves per-stream cursors
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Backing file; empty for in-memory state
    path: PathBuf,
    state: Arc<RwLock<State>>,
}

impl StateManager {
    /// State backed by a file that does not need to exist yet
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(State::new())),
        }
    }

    /// State that is never written to disk
    pub fn in_memory() -> Self {
        Self::new(PathBuf::new())
    }

    /// Open a state file, loading it when present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse(&contents)?
        } else {
            State::new()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Committed cursor for a stream
    pub async fn get_cursor(&self, stream: &str) -> Option<String> {
        self.state
            .read()
            .await
            .get_cursor(stream)
            .map(ToString::to_string)
    }

    /// Record a stream's completed cursor and persist
    pub async fn commit_cursor(&self, stream: &str, cursor_field: &str, value: &str) -> Result<()> {
        self.state
            .write()
            .await
            .set_cursor(stream, cursor_field, value.to_string());
        debug!(stream, cursor = value, "Committed cursor");
        self.save().await
    }

    /// Forget a stream's cursor and persist
    pub async fn clear_stream(&self, stream: &str) -> Result<()> {
        self.state.write().await.streams.remove(stream);
        self.save().await
    }

    /// Snapshot of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Write to a temp file then rename over the state file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state)
                .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::state(format!("Failed to create state directory: {e}")))?;
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        Ok(())
    }

    /// The state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the state is memory-only
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

fn parse(contents: &str) -> Result<State> {
    serde_json::from_str(contents)
        .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))
}
