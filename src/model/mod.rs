//! Core data model: immutable value records shared by every runtime component.

pub mod event;
pub mod expert;
pub mod job;
pub mod message;
pub mod setting;
pub mod step;
pub mod tool;
pub mod usage;

pub use event::{PendingEvent, RunEvent, RunEventKind};
pub use expert::{Expert, ExpertCatalog, Skill, SkillKind, SkillTool};
pub use job::{Job, JobError, JobStatus};
pub use message::{last_expert_text, Message};
pub use setting::{
    InteractiveToolResult, RunInput, RunSetting, DEFAULT_MAX_RETRIES, DEFAULT_MAX_STEPS,
    DEFAULT_TIMEOUT_MS,
};
pub use step::Step;
pub use tool::{ContentPart, ToolCall, ToolDefinition, ToolResult};
pub use usage::{sum_usage, Usage};
