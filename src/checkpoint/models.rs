//! Data models for the checkpoint system

use crate::model::{Expert, Message, ToolCall, ToolResult, Usage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status recorded on a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckpointStatus {
    Init,
    Proceeding,
    Completed,
    StoppedByInteractiveTool,
    StoppedByDelegate,
    StoppedByExceededMaxSteps,
    StoppedByError,
}

impl CheckpointStatus {
    /// Whether the run that wrote this checkpoint has stopped
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CheckpointStatus::Init | CheckpointStatus::Proceeding)
    }
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckpointStatus::Init => "init",
            CheckpointStatus::Proceeding => "proceeding",
            CheckpointStatus::Completed => "completed",
            CheckpointStatus::StoppedByInteractiveTool => "stoppedByInteractiveTool",
            CheckpointStatus::StoppedByDelegate => "stoppedByDelegate",
            CheckpointStatus::StoppedByExceededMaxSteps => "stoppedByExceededMaxSteps",
            CheckpointStatus::StoppedByError => "stoppedByError",
        };
        write!(f, "{}", s)
    }
}

/// Identity of the expert a checkpoint belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertRef {
    pub key: String,
    pub name: String,
    pub version: String,
}

impl From<&Expert> for ExpertRef {
    fn from(expert: &Expert) -> Self {
        Self {
            key: expert.key.clone(),
            name: expert.name.clone(),
            version: expert.version.clone(),
        }
    }
}

/// Sub-run to launch when a run stops by delegation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationTarget {
    pub expert_key: String,
    pub tool_call_id: String,
    pub query: String,
}

/// Link from a sub-run back to the call that spawned it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedBy {
    pub parent_run_id: String,
    pub parent_expert_key: String,
    /// Step of the parent checkpoint that halted for this delegation
    #[serde(default)]
    pub parent_step_number: u32,
    pub tool_call_id: String,
}

/// Durable snapshot of a run's conversation state at one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub job_id: String,
    pub run_id: String,
    pub expert: ExpertRef,
    pub step_number: u32,
    pub status: CheckpointStatus,
    pub messages: Vec<Message>,
    /// Cumulative usage of the run up to this checkpoint
    pub usage: Usage,
    /// Calls still awaiting results when the run halted
    #[serde(default)]
    pub pending_tool_calls: Vec<ToolCall>,
    /// Results already produced for the halted batch
    #[serde(default)]
    pub partial_tool_results: Vec<ToolResult>,
    #[serde(default)]
    pub delegate_to: Vec<DelegationTarget>,
    #[serde(default)]
    pub delegated_by: Option<DelegatedBy>,
    /// Last error when the run stopped by error
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn with_status(mut self, status: CheckpointStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_pending(mut self, pending: Vec<ToolCall>, partial: Vec<ToolResult>) -> Self {
        self.pending_tool_calls = pending;
        self.partial_tool_results = partial;
        self
    }

    pub fn with_delegate_to(mut self, targets: Vec<DelegationTarget>) -> Self {
        self.delegate_to = targets;
        self
    }

    pub fn with_delegated_by(mut self, delegated_by: Option<DelegatedBy>) -> Self {
        self.delegated_by = delegated_by;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Final output text of the run, from the last expert message
    pub fn output_text(&self) -> Option<&str> {
        crate::model::last_expert_text(&self.messages)
    }

    /// Short one-line summary for logs and listings
    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            job_id: self.job_id.clone(),
            run_id: self.run_id.clone(),
            step_number: self.step_number,
            status: self.status,
            message_count: self.messages.len(),
            created_at: self.created_at,
        }
    }
}

/// Lightweight checkpoint description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSummary {
    pub job_id: String,
    pub run_id: String,
    pub step_number: u32,
    pub status: CheckpointStatus,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!CheckpointStatus::Init.is_terminal());
        assert!(!CheckpointStatus::Proceeding.is_terminal());
        assert!(CheckpointStatus::Completed.is_terminal());
        assert!(CheckpointStatus::StoppedByDelegate.is_terminal());
        assert_eq!(CheckpointStatus::StoppedByError.to_string(), "stoppedByError");
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_value(CheckpointStatus::StoppedByExceededMaxSteps).unwrap();
        assert_eq!(json, "stoppedByExceededMaxSteps");
    }
}
