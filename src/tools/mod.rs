//! Tool call classification and execution.
//!
//! Each call of a batch is classified as a remote tool call, a delegation to
//! another expert, or an interactive call that needs the caller. Remote calls
//! run on [`SkillManager`]s; tool failures become failure results, while an
//! unreachable manager is fatal for the step.

pub mod classifier;
pub mod error;
pub mod executor;
pub mod skill;

pub use classifier::{classify_tool_call, ClassifiedToolCalls, IndexedCall, ToolCallKind};
pub use error::{ExecutorError, SkillError};
pub use executor::{
    delegation_target, DelegateExecutor, InteractiveExecutor, RemoteToolExecutor, SubRunLauncher,
    SubRunOutcome, ToolCallExecutor, ToolExecution,
};
pub use skill::{SkillManager, SkillManagers};
