//! Run orchestration
//!
//! [`ExpertRuntime`] is the entry point: it resolves where a run starts,
//! opens the job and drives the per-run [`RunState`] machine. Tool calls of
//! a step are executed by [`StepExecutor`], and delegate calls are handed to
//! a [`DelegationStrategy`] that runs them as sub-runs.

pub mod delegation;
pub mod error;
pub mod runtime;
pub mod state_machine;
pub mod step_executor;

pub use delegation::{
    select_strategy, DelegationStrategy, ParallelDelegationStrategy, SingleDelegationStrategy,
};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{
    ExpertRuntime, RunOutput, RunParams, RuntimeConfig, RuntimeDeps, RUNTIME_VERSION,
};
pub use state_machine::{HaltPayload, RunState};
pub use step_executor::{order_results, StepExecutor, StepResult, ToolExecutionMode};
