//! Error types for the checkpoint system

use thiserror::Error;

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Violations of the append-only checkpoint chain
#[derive(Error, Debug, PartialEq)]
pub enum CheckpointError {
    #[error("Step gap: expected step {expected}, found {found}")]
    StepGap { expected: u32, found: u32 },

    #[error("Checkpoint belongs to run {found}, chain is for run {expected}")]
    RunMismatch { expected: String, found: String },

    #[error("Checkpoint at step {step_number} does not extend the previous message sequence")]
    NotAnExtension { step_number: u32 },

    #[error("Checkpoint at step {step_number} adds no messages")]
    EmptySuffix { step_number: u32 },

    #[error("Chain already ended with status {status}")]
    ChainClosed { status: String },
}

impl CheckpointError {
    /// Check if this error means the caller tried to rewrite history
    pub fn is_rewrite(&self) -> bool {
        matches!(
            self,
            CheckpointError::StepGap { .. } | CheckpointError::NotAnExtension { .. }
        )
    }
}
