//! Markdown transcript of expert runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::events::EventListener;
use crate::model::{RunEvent, RunEventKind, ToolCall, ToolResult, Usage};

/// Event listener writing a human-readable log of every event it receives.
///
/// Each event becomes one `###` section of a markdown file.
#[derive(Debug)]
pub struct RunLogger {
    log_file: PathBuf,
}

impl RunLogger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    pub fn new(log_file: Option<&Path>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => std::env::temp_dir().join("erk-logs").join(format!(
                "run_{}_{}.md",
                Utc::now().timestamp_millis(),
                std::process::id()
            )),
        };

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self { log_file };
        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }
        Ok(logger)
    }

    /// Logger writing `<dir>/<job_id>_<run_id>.md`
    pub fn for_run(dir: &Path, job_id: &str, run_id: &str) -> Result<Self> {
        Self::new(Some(&dir.join(format!("{}_{}.md", job_id, run_id))))
    }

    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();
        writeln!(file, "# Expert Run Log\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;
        Ok(())
    }

    fn append_to_log(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;
        Ok(())
    }

    /// Append the section for one event
    pub fn log_event(&self, event: &RunEvent) -> Result<()> {
        // Deltas are folded into the final text; logging each would flood the file
        if matches!(event.kind, RunEventKind::StreamingText { .. }) {
            return Ok(());
        }
        self.append_to_log(&format_event(event))
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

#[async_trait]
impl EventListener for RunLogger {
    fn name(&self) -> &str {
        "run-logger"
    }

    async fn on_event(&self, event: &RunEvent) -> Result<()> {
        self.log_event(event)
    }
}

fn format_event(event: &RunEvent) -> String {
    let mut content = format!(
        "### {} - {}\n\n**Expert:** {}\n**Run:** {}\n**Step:** {}\n\n",
        event.kind.name(),
        event.timestamp.to_rfc3339(),
        event.expert_key,
        event.run_id,
        event.step_number
    );

    match &event.kind {
        RunEventKind::RuntimeInit {
            runtime_version,
            expert_name,
            model,
            max_steps,
            query,
        } => {
            content.push_str(&format!(
                "**Runtime:** {}\n**Expert name:** {}\n**Model:** {}\n**Max steps:** {}\n\n",
                runtime_version, expert_name, model, max_steps
            ));
            if let Some(query) = query {
                content.push_str(&format!("**Query:**\n```\n{}\n```\n\n", query));
            }
        }
        RunEventKind::StartGeneration { message_count } => {
            content.push_str(&format!("**Messages:** {}\n\n", message_count));
        }
        RunEventKind::StreamingText { delta } => {
            content.push_str(&format!("{}\n\n", delta));
        }
        RunEventKind::CallTools {
            text,
            tool_calls,
            usage,
        } => {
            if !text.trim().is_empty() {
                content.push_str(&format!("**Response:**\n```\n{}\n```\n\n", text));
            }
            content.push_str(&format_tool_calls(tool_calls));
            content.push_str(&format_usage(usage));
        }
        RunEventKind::ResolveToolResults { tool_results } => {
            content.push_str(&format_tool_results(tool_results));
        }
        RunEventKind::CompleteRun { text, usage } => {
            content.push_str(&format!("**Result:**\n```\n{}\n```\n\n", text));
            content.push_str(&format_usage(usage));
            content.push_str("---\n\n");
        }
        RunEventKind::StopRunByInteractiveTool { tool_calls } => {
            content.push_str("**Waiting for input on:**\n");
            content.push_str(&format_tool_calls(tool_calls));
        }
        RunEventKind::StopRunByDelegate { delegate_to } => {
            content.push_str(&format!("**Delegated to:** {}\n\n", delegate_to.join(", ")));
        }
        RunEventKind::StopRunByExceededMaxSteps { max_steps } => {
            content.push_str(&format!("**Max steps reached:** {}\n\n---\n\n", max_steps));
        }
        RunEventKind::StopRunByError { error } => {
            content.push_str(&format!("**Error:** {}\n\n---\n\n", error));
        }
    }
    content
}

fn format_tool_calls(calls: &[ToolCall]) -> String {
    let mut content = String::new();
    for call in calls {
        content.push_str(&format!(
            "- **{}.{}** (`{}`): `{}`\n",
            call.skill_name,
            call.tool_name,
            call.id,
            serde_json::Value::Object(call.args.clone())
        ));
    }
    content.push('\n');
    content
}

fn format_tool_results(results: &[ToolResult]) -> String {
    let mut content = String::new();
    for result in results {
        let status = if result.is_failure() { "Error" } else { "Result" };
        content.push_str(&format!(
            "**{}.{} {}:**\n```\n{}\n```\n\n",
            result.skill_name,
            result.tool_name,
            status,
            result.joined_text()
        ));
    }
    content
}

fn format_usage(usage: &Usage) -> String {
    format!(
        "**Usage:** {} input / {} output tokens\n\n",
        usage.input_tokens, usage.output_tokens
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PendingEvent;
    use serde_json::json;
    use tempfile::TempDir;

    fn event(kind: RunEventKind) -> RunEvent {
        PendingEvent::new("job", "run", "main", 1, kind).stamp()
    }

    #[test]
    fn test_logger_creation() {
        let dir = TempDir::new().unwrap();
        let logger = RunLogger::for_run(dir.path(), "job", "run").unwrap();
        assert!(logger.log_file().exists());
        let content = std::fs::read_to_string(logger.log_file()).unwrap();
        assert!(content.contains("# Expert Run Log"));
    }

    #[tokio::test]
    async fn test_events_become_sections() {
        let dir = TempDir::new().unwrap();
        let logger = RunLogger::new(Some(&dir.path().join("log.md"))).unwrap();

        let call = ToolCall::new("c1", "math", "add", json!({"a": 1}));
        logger
            .on_event(&event(RunEventKind::CallTools {
                text: "adding".to_string(),
                tool_calls: vec![call.clone()],
                usage: Usage::zero(),
            }))
            .await
            .unwrap();
        logger
            .on_event(&event(RunEventKind::ResolveToolResults {
                tool_results: vec![ToolResult::failure(&call, "boom")],
            }))
            .await
            .unwrap();
        logger
            .on_event(&event(RunEventKind::StreamingText {
                delta: "partial".to_string(),
            }))
            .await
            .unwrap();
        logger
            .on_event(&event(RunEventKind::CompleteRun {
                text: "3".to_string(),
                usage: Usage::zero(),
            }))
            .await
            .unwrap();

        let content = std::fs::read_to_string(logger.log_file()).unwrap();
        assert!(content.contains("### callTools"));
        assert!(content.contains("**math.add** (`c1`)"));
        assert!(content.contains("**math.add Error:**"));
        assert!(content.contains("boom"));
        assert!(content.contains("### completeRun"));
        assert!(!content.contains("partial"));
    }
}
