//! Per-run settings built by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_STEPS: u32 = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// Result supplied by the caller for a pending interactive tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveToolResult {
    pub tool_call_id: String,
    pub skill_name: String,
    pub tool_name: String,
    pub text: String,
}

/// Input that starts or continues a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunInput {
    Query { text: String },
    InteractiveToolResult(InteractiveToolResult),
}

impl RunInput {
    pub fn query(text: impl Into<String>) -> Self {
        Self::Query { text: text.into() }
    }
}

/// Settings for one run, addressed by `(job_id, run_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSetting {
    pub job_id: String,
    pub run_id: String,
    pub expert_key: String,
    pub model: String,
    pub max_steps: u32,
    pub max_retries: u32,
    /// Per-step timeout in milliseconds
    pub timeout: u64,
    pub input: RunInput,
    pub started_at: DateTime<Utc>,
}

impl RunSetting {
    /// Setting with default limits
    pub fn new(
        job_id: impl Into<String>,
        run_id: impl Into<String>,
        expert_key: impl Into<String>,
        model: impl Into<String>,
        input: RunInput,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            run_id: run_id.into(),
            expert_key: expert_key.into(),
            model: model.into(),
            max_steps: DEFAULT_MAX_STEPS,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT_MS,
            input,
            started_at: Utc::now(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.as_millis() as u64;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Query text when the input is a query
    pub fn query(&self) -> Option<&str> {
        match &self.input {
            RunInput::Query { text } => Some(text),
            RunInput::InteractiveToolResult(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let setting = RunSetting::new("job", "run", "expert", "model", RunInput::query("hi"));
        assert_eq!(setting.max_steps, 100);
        assert_eq!(setting.max_retries, 5);
        assert_eq!(setting.timeout_duration(), Duration::from_secs(300));
        assert_eq!(setting.query(), Some("hi"));
    }

    #[test]
    fn test_interactive_input_round_trip() {
        let input = RunInput::InteractiveToolResult(InteractiveToolResult {
            tool_call_id: "c1".into(),
            skill_name: "ask".into(),
            tool_name: "confirm".into(),
            text: "yes".into(),
        });
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["type"], "interactiveToolResult");
        assert_eq!(json["toolCallId"], "c1");
        let back: RunInput = serde_json::from_value(json).unwrap();
        assert_eq!(back, input);
    }
}
