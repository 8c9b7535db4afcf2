//! Tool phase of a single step.
//!
//! Dispatches classified calls to their executors and reassembles the
//! results in the original call order, whatever order they completed in.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use super::delegation::select_strategy;
use crate::model::{ToolCall, ToolResult, Usage};
use crate::tools::{
    ClassifiedToolCalls, DelegateExecutor, ExecutorError, IndexedCall, InteractiveExecutor,
    RemoteToolExecutor, SkillManagers, SubRunLauncher, ToolCallExecutor, ToolExecution,
};

/// How remote tool calls of one batch are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Ordered results and aggregated usage of a tool phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResult {
    pub results: Vec<ToolResult>,
    pub usage: Usage,
}

impl StepResult {
    /// Sort indexed executions by batch index and sum their usage
    pub fn merge(mut executions: Vec<(usize, ToolExecution)>) -> Self {
        executions.sort_by_key(|(index, _)| *index);
        let usage: Usage = executions.iter().map(|(_, e)| e.usage).sum();
        Self {
            results: executions.into_iter().map(|(_, e)| e.result).collect(),
            usage,
        }
    }
}

/// Order `results` by the position of their call in `calls`.
///
/// Results without a matching call keep their relative order at the end.
pub fn order_results(calls: &[ToolCall], mut results: Vec<ToolResult>) -> Vec<ToolResult> {
    let position = |result: &ToolResult| {
        calls
            .iter()
            .position(|c| c.id == result.id)
            .unwrap_or(usize::MAX)
    };
    results.sort_by_key(position);
    results
}

/// Drives the tool-execution phase of one step
pub struct StepExecutor<'a> {
    skills: &'a SkillManagers,
    mode: ToolExecutionMode,
}

impl<'a> StepExecutor<'a> {
    pub fn new(skills: &'a SkillManagers, mode: ToolExecutionMode) -> Self {
        Self { skills, mode }
    }

    /// Run remote tool calls on their skill managers
    pub async fn execute_remote(
        &self,
        calls: &[IndexedCall],
    ) -> Result<Vec<(usize, ToolExecution)>, ExecutorError> {
        let executor = RemoteToolExecutor;
        match self.mode {
            ToolExecutionMode::Sequential => {
                let mut executions = Vec::with_capacity(calls.len());
                for entry in calls {
                    executions.push((entry.index, executor.execute(&entry.call, self.skills).await?));
                }
                Ok(executions)
            }
            ToolExecutionMode::Parallel => {
                let settled = join_all(calls.iter().map(|entry| async move {
                    (entry.index, executor.execute(&entry.call, self.skills).await)
                }))
                .await;
                settled
                    .into_iter()
                    .map(|(index, result)| result.map(|execution| (index, execution)))
                    .collect()
            }
        }
    }

    /// Run delegate calls as sub-runs with the strategy for their count
    pub async fn execute_delegates(
        &self,
        calls: &[IndexedCall],
        launcher: &dyn SubRunLauncher,
    ) -> Result<Vec<(usize, ToolExecution)>, ExecutorError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let strategy = select_strategy(calls.len());
        tracing::info!(
            strategy = strategy.name(),
            count = calls.len(),
            "Dispatching delegate calls"
        );
        strategy
            .delegate(calls, &DelegateExecutor::new(launcher), self.skills)
            .await
    }

    /// Resolve interactive calls from the resume input
    pub async fn execute_interactive(
        &self,
        calls: &[IndexedCall],
        executor: Option<&InteractiveExecutor>,
    ) -> Result<Vec<(usize, ToolExecution)>, ExecutorError> {
        let Some(first) = calls.first() else {
            return Ok(Vec::new());
        };
        let Some(executor) = executor else {
            return Err(ExecutorError::MissingInteractiveResult {
                tool_call_id: first.call.id.clone(),
            });
        };
        let mut executions = Vec::with_capacity(calls.len());
        for entry in calls {
            executions.push((entry.index, executor.execute(&entry.call, self.skills).await?));
        }
        Ok(executions)
    }

    /// Execute every bucket and merge the results in batch order
    pub async fn execute(
        &self,
        classified: &ClassifiedToolCalls,
        launcher: &dyn SubRunLauncher,
        interactive: Option<&InteractiveExecutor>,
    ) -> Result<StepResult, ExecutorError> {
        let mut executions = self.execute_remote(&classified.remote).await?;
        executions.extend(self.execute_delegates(&classified.delegate, launcher).await?);
        executions.extend(
            self.execute_interactive(&classified.interactive, interactive)
                .await?,
        );
        Ok(StepResult::merge(executions))
    }
}
