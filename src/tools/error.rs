//! Error types for tool execution

use thiserror::Error;

/// Failure reported by a skill manager for one call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkillError {
    /// The tool ran and failed; becomes a failure result
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// The skill manager could not be reached
    #[error("Skill '{skill}' is unreachable: {message}")]
    Transport { skill: String, message: String },
}

impl SkillError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn transport(skill: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            skill: skill.into(),
            message: message.into(),
        }
    }
}

/// Step-fatal errors raised while executing a batch of tool calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Skill '{skill}' is unreachable: {message}")]
    Transport { skill: String, message: String },

    #[error("Interactive result targets call '{found}', which is not pending")]
    InteractiveMismatch { found: String },

    #[error("No interactive result supplied for call '{tool_call_id}'")]
    MissingInteractiveResult { tool_call_id: String },

    #[error("Run cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// Check if this error is a cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutorError::Cancelled)
    }
}
