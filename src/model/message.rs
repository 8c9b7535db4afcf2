//! Conversation messages carried by checkpoints.

use super::tool::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// A conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// System instruction of the running expert
    Instruction { id: String, text: String },
    /// Query or follow-up from the caller
    User { id: String, text: String },
    /// Model output, optionally requesting tool calls
    Expert {
        id: String,
        text: String,
        #[serde(default, rename = "toolCalls")]
        tool_calls: Vec<ToolCall>,
    },
    /// Ordered results answering the previous expert message's tool calls
    Tool { id: String, results: Vec<ToolResult> },
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Message {
    pub fn instruction(text: impl Into<String>) -> Self {
        Self::Instruction {
            id: new_id(),
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            id: new_id(),
            text: text.into(),
        }
    }

    pub fn expert(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Expert {
            id: new_id(),
            text: text.into(),
            tool_calls,
        }
    }

    pub fn tool(results: Vec<ToolResult>) -> Self {
        Self::Tool {
            id: new_id(),
            results,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Instruction { id, .. }
            | Self::User { id, .. }
            | Self::Expert { id, .. }
            | Self::Tool { id, .. } => id,
        }
    }

    /// Short role label used in logs
    pub fn role(&self) -> &'static str {
        match self {
            Self::Instruction { .. } => "instruction",
            Self::User { .. } => "user",
            Self::Expert { .. } => "expert",
            Self::Tool { .. } => "tool",
        }
    }
}

/// Text of the last expert message in `messages`, if any.
///
/// This is the "final output" of a run that completed.
pub fn last_expert_text(messages: &[Message]) -> Option<&str> {
    messages.iter().rev().find_map(|m| match m {
        Message::Expert { text, .. } => Some(text.as_str()),
        _ => None,
    })
}
