//! Run store contract
//!
//! Defines the `RunStore` contract for job, checkpoint, setting and event
//! records.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::checkpoint::errors::CheckpointError;
use crate::checkpoint::models::Checkpoint;
use crate::model::{Job, RunEvent, RunSetting};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error during storage operation
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Record not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Write would rewrite or skip a step of the checkpoint chain
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Identifier cannot be used as a storage key
    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<CheckpointError> for StorageError {
    fn from(err: CheckpointError) -> Self {
        StorageError::Conflict(err.to_string())
    }
}

/// Durable persistence for run records.
///
/// Once `store_checkpoint` returns, `retrieve_latest_checkpoint` for the same
/// run observes the stored checkpoint. A checkpoint for a given step is never
/// rewritten.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Get the backend type name (e.g., "memory", "file")
    fn backend_type(&self) -> &'static str;

    /// Append a checkpoint to its run's chain
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()>;

    /// Highest-step checkpoint of a run, if any was stored
    async fn retrieve_latest_checkpoint(
        &self,
        job_id: &str,
        run_id: &str,
    ) -> StorageResult<Option<Checkpoint>>;

    /// Checkpoint of a run at an exact step
    async fn retrieve_checkpoint(
        &self,
        job_id: &str,
        run_id: &str,
        step_number: u32,
    ) -> StorageResult<Checkpoint>;

    /// Every checkpoint of every run in a job, in creation order
    async fn list_checkpoints_by_job(&self, job_id: &str) -> StorageResult<Vec<Checkpoint>>;

    /// Insert or update a job record
    async fn store_job(&self, job: &Job) -> StorageResult<()>;

    async fn retrieve_job(&self, job_id: &str) -> StorageResult<Option<Job>>;

    async fn store_run_setting(&self, setting: &RunSetting) -> StorageResult<()>;

    async fn retrieve_run_setting(
        &self,
        job_id: &str,
        run_id: &str,
    ) -> StorageResult<Option<RunSetting>>;

    /// Append an emitted event to its run's event log
    async fn store_event(&self, event: &RunEvent) -> StorageResult<()>;

    /// Events of a run in emission order
    async fn list_events(&self, job_id: &str, run_id: &str) -> StorageResult<Vec<RunEvent>>;
}

/// Builder for creating run stores from configuration
pub struct RunStoreBuilder {
    backend_type: String,
    base_path: Option<PathBuf>,
}

impl RunStoreBuilder {
    /// Create a new builder
    pub fn new(backend_type: &str) -> Self {
        Self {
            backend_type: backend_type.to_string(),
            base_path: None,
        }
    }

    /// Set the base path (for file backend)
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Build the run store
    pub fn build(self) -> StorageResult<Arc<dyn RunStore>> {
        match self.backend_type.as_str() {
            "memory" => Ok(Arc::new(super::InMemoryRunStore::new())),
            #[cfg(feature = "file-store")]
            "file" | "filesystem" => {
                let base_path = self
                    .base_path
                    .ok_or_else(|| StorageError::Configuration("base_path is required".into()))?;
                Ok(Arc::new(super::FileRunStore::new(base_path)?))
            }
            unknown => Err(StorageError::Configuration(format!(
                "Unknown backend type: {}",
                unknown
            ))),
        }
    }
}
