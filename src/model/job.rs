//! Job: the root of a run lineage.

use super::usage::Usage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregate status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Running,
    Completed,
    StoppedByMaxSteps,
    StoppedByInteractiveTool,
    StoppedByError,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::StoppedByMaxSteps => "stoppedByMaxSteps",
            JobStatus::StoppedByInteractiveTool => "stoppedByInteractiveTool",
            JobStatus::StoppedByError => "stoppedByError",
        };
        write!(f, "{}", s)
    }
}

/// Illegal job lifecycle transition
#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("job {job_id} already finished with status {status}")]
    AlreadyFinished { job_id: String, status: JobStatus },

    #[error("job {job_id} cannot finish with status running")]
    NotTerminal { job_id: String },
}

/// Top-level unit of work tracking aggregate status and usage.
///
/// `finished_at` is set exactly when `status` is terminal, and a terminal job
/// never returns to `running`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub coordinator_expert_key: String,
    pub total_steps: u32,
    pub max_steps: Option<u32>,
    pub usage: Usage,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Start a running job
    pub fn start(
        id: impl Into<String>,
        coordinator_expert_key: impl Into<String>,
        max_steps: Option<u32>,
    ) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Running,
            coordinator_expert_key: coordinator_expert_key.into(),
            total_steps: 0,
            max_steps,
            usage: Usage::zero(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record progress of the coordinator run
    pub fn record_progress(&mut self, total_steps: u32, usage: Usage) -> Result<(), JobError> {
        self.ensure_running()?;
        self.total_steps = self.total_steps.max(total_steps);
        self.usage = usage;
        Ok(())
    }

    /// Move to a terminal status
    pub fn finish(&mut self, status: JobStatus) -> Result<(), JobError> {
        self.ensure_running()?;
        if !status.is_terminal() {
            return Err(JobError::NotTerminal {
                job_id: self.id.clone(),
            });
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), JobError> {
        if self.is_finished() {
            return Err(JobError::AlreadyFinished {
                job_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_at_tracks_status() {
        let mut job = Job::start("job-1", "coordinator", Some(10));
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.finished_at.is_none());

        job.finish(JobStatus::Completed).unwrap();
        assert!(job.finished_at.is_some());
        assert!(job.is_finished());
    }

    #[test]
    fn test_terminal_job_is_never_reopened() {
        let mut job = Job::start("job-1", "coordinator", None);
        job.finish(JobStatus::StoppedByError).unwrap();

        let err = job.finish(JobStatus::Completed).unwrap_err();
        assert!(matches!(err, JobError::AlreadyFinished { .. }));
        assert!(job.record_progress(3, Usage::zero()).is_err());
        assert_eq!(job.status, JobStatus::StoppedByError);
    }

    #[test]
    fn test_finish_requires_terminal_status() {
        let mut job = Job::start("job-1", "coordinator", None);
        assert_eq!(
            job.finish(JobStatus::Running),
            Err(JobError::NotTerminal {
                job_id: "job-1".to_string()
            })
        );
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_record_progress_keeps_highest_step() {
        let mut job = Job::start("job-1", "coordinator", None);
        job.record_progress(4, Usage::zero()).unwrap();
        job.record_progress(2, Usage::zero()).unwrap();
        assert_eq!(job.total_steps, 4);
    }
}
