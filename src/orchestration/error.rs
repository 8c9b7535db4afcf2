//! Error types for the expert runtime

use thiserror::Error;

use crate::checkpoint::StorageError;
use crate::model::{JobError, JobStatus};
use crate::tools::ExecutorError;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised while running an expert
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Unknown expert: {0}")]
    UnknownExpert(String),

    #[error("Job {job_id} already finished with status {status}")]
    JobAlreadyFinished { job_id: String, status: JobStatus },

    /// The run cannot continue from the given checkpoint with the given input
    #[error("Cannot resume: {0}")]
    InvalidResume(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Generation failed after {attempts} attempt(s): {message}")]
    Generation { attempts: u32, message: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Step {step} timed out after {timeout_ms}ms")]
    StepTimeout { step: u32, timeout_ms: u64 },

    #[error("Tool execution failed: {0}")]
    Executor(ExecutorError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RuntimeError {
    pub fn invalid_resume(message: impl Into<String>) -> Self {
        Self::InvalidResume(message.into())
    }

    /// Errors that end the run with a `stoppedByError` checkpoint.
    ///
    /// Storage errors and cancellation propagate to the caller as-is.
    pub fn is_step_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::Generation { .. }
                | RuntimeError::MalformedResponse(_)
                | RuntimeError::StepTimeout { .. }
                | RuntimeError::Executor(_)
        )
    }
}

impl From<ExecutorError> for RuntimeError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Cancelled => RuntimeError::Cancelled,
            other => RuntimeError::Executor(other),
        }
    }
}

impl From<JobError> for RuntimeError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyFinished { job_id, status } => {
                RuntimeError::JobAlreadyFinished { job_id, status }
            }
            JobError::NotTerminal { job_id } => {
                RuntimeError::InvalidResume(format!("job {} cannot finish as running", job_id))
            }
        }
    }
}
