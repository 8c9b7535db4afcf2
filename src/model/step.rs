//! One traversal of the runtime state machine.

use super::message::Message;
use super::tool::{ToolCall, ToolResult};
use super::usage::Usage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A step: exactly one model generation plus at most one tool-execution round.
///
/// Steps are not persisted on their own; the checkpoint written at the end of
/// a step holds `input_messages` followed by `new_messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_number: u32,
    pub input_messages: Vec<Message>,
    pub new_messages: Vec<Message>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
    pub usage: Usage,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Step {
    /// Start a step whose prompt is `history` followed by `carried` messages.
    ///
    /// Carried messages (a follow-up query, resolved tool results from a
    /// resume) are part of this step's new messages.
    pub fn start(step_number: u32, history: &[Message], carried: Vec<Message>) -> Self {
        let mut input_messages = history.to_vec();
        input_messages.extend(carried.iter().cloned());
        Self {
            step_number,
            input_messages,
            new_messages: carried,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            usage: Usage::zero(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Messages sent to the model for this step's generation
    pub fn prompt(&self) -> &[Message] {
        &self.input_messages
    }

    /// Record a message produced during this step
    pub fn push_message(&mut self, message: Message) {
        self.new_messages.push(message);
    }

    pub fn add_usage(&mut self, usage: Usage) {
        self.usage += usage;
    }

    pub fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_start_carries_messages() {
        let history = vec![Message::instruction("sys"), Message::user("q")];
        let step = Step::start(3, &history, vec![Message::user("follow-up")]);

        assert_eq!(step.step_number, 3);
        assert_eq!(step.input_messages.len(), 3);
        assert_eq!(step.new_messages.len(), 1);
        assert!(step.finished_at.is_none());
    }

    #[test]
    fn test_finish_is_sticky() {
        let mut step = Step::start(1, &[], vec![]);
        step.finish();
        let first = step.finished_at;
        step.finish();
        assert_eq!(step.finished_at, first);
    }
}
