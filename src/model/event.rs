//! RunEvent wire taxonomy.
//!
//! The flattened JSON form of [`RunEvent`] is also the line format of the
//! on-disk event log.

use super::tool::{ToolCall, ToolResult};
use super::usage::Usage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind-specific event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEventKind {
    #[serde(rename_all = "camelCase")]
    RuntimeInit {
        runtime_version: String,
        expert_name: String,
        model: String,
        max_steps: u32,
        query: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    StartGeneration { message_count: usize },
    #[serde(rename_all = "camelCase")]
    StreamingText { delta: String },
    #[serde(rename_all = "camelCase")]
    CallTools {
        text: String,
        tool_calls: Vec<ToolCall>,
        usage: Usage,
    },
    #[serde(rename_all = "camelCase")]
    ResolveToolResults { tool_results: Vec<ToolResult> },
    #[serde(rename_all = "camelCase")]
    CompleteRun { text: String, usage: Usage },
    #[serde(rename_all = "camelCase")]
    StopRunByInteractiveTool { tool_calls: Vec<ToolCall> },
    #[serde(rename_all = "camelCase")]
    StopRunByDelegate { delegate_to: Vec<String> },
    #[serde(rename_all = "camelCase")]
    StopRunByExceededMaxSteps { max_steps: u32 },
    #[serde(rename_all = "camelCase")]
    StopRunByError { error: String },
}

impl RunEventKind {
    /// Wire name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::RuntimeInit { .. } => "runtimeInit",
            Self::StartGeneration { .. } => "startGeneration",
            Self::StreamingText { .. } => "streamingText",
            Self::CallTools { .. } => "callTools",
            Self::ResolveToolResults { .. } => "resolveToolResults",
            Self::CompleteRun { .. } => "completeRun",
            Self::StopRunByInteractiveTool { .. } => "stopRunByInteractiveTool",
            Self::StopRunByDelegate { .. } => "stopRunByDelegate",
            Self::StopRunByExceededMaxSteps { .. } => "stopRunByExceededMaxSteps",
            Self::StopRunByError { .. } => "stopRunByError",
        }
    }

    /// Whether this kind ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteRun { .. }
                | Self::StopRunByInteractiveTool { .. }
                | Self::StopRunByDelegate { .. }
                | Self::StopRunByExceededMaxSteps { .. }
                | Self::StopRunByError { .. }
        )
    }
}

/// An event that has not been emitted yet.
///
/// Identity and timestamp are assigned by the emitter, so producers build
/// this and never a [`RunEvent`] directly.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub job_id: String,
    pub run_id: String,
    pub expert_key: String,
    pub step_number: u32,
    pub kind: RunEventKind,
}

impl PendingEvent {
    pub fn new(
        job_id: impl Into<String>,
        run_id: impl Into<String>,
        expert_key: impl Into<String>,
        step_number: u32,
        kind: RunEventKind,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            run_id: run_id.into(),
            expert_key: expert_key.into(),
            step_number,
            kind,
        }
    }

    /// Stamp with a fresh id and the current time
    pub fn stamp(self) -> RunEvent {
        RunEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            job_id: self.job_id,
            run_id: self.run_id,
            expert_key: self.expert_key,
            step_number: self.step_number,
            kind: self.kind,
        }
    }
}

/// An emitted runtime event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub job_id: String,
    pub run_id: String,
    pub expert_key: String,
    pub step_number: u32,
    #[serde(flatten)]
    pub kind: RunEventKind,
}
