//! Executors for the three kinds of tool call.

use async_trait::async_trait;

use super::classifier::ToolCallKind;
use super::error::{ExecutorError, SkillError};
use super::skill::SkillManagers;
use crate::checkpoint::{Checkpoint, CheckpointStatus, DelegationTarget};
use crate::model::{InteractiveToolResult, ToolCall, ToolResult, Usage};

/// Result of one executed call and the usage it incurred
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    pub result: ToolResult,
    pub usage: Usage,
}

impl ToolExecution {
    pub fn new(result: ToolResult) -> Self {
        Self {
            result,
            usage: Usage::zero(),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// Executes tool calls of one kind
#[async_trait]
pub trait ToolCallExecutor: Send + Sync {
    fn kind(&self) -> ToolCallKind;

    async fn execute(
        &self,
        call: &ToolCall,
        skills: &SkillManagers,
    ) -> Result<ToolExecution, ExecutorError>;
}

/// Runs calls on the skill manager that owns them
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteToolExecutor;

#[async_trait]
impl ToolCallExecutor for RemoteToolExecutor {
    fn kind(&self) -> ToolCallKind {
        ToolCallKind::RemoteTool
    }

    async fn execute(
        &self,
        call: &ToolCall,
        skills: &SkillManagers,
    ) -> Result<ToolExecution, ExecutorError> {
        let Some(manager) = skills.get(&call.skill_name) else {
            tracing::warn!(
                skill = %call.skill_name,
                tool = %call.tool_name,
                "No skill manager registered"
            );
            return Ok(ToolExecution::new(ToolResult::failure(
                call,
                format!("No skill manager registered for skill '{}'", call.skill_name),
            )));
        };

        tracing::debug!(skill = %call.skill_name, tool = %call.tool_name, id = %call.id, "Calling tool");
        match manager.call_tool(call).await {
            Ok(parts) => Ok(ToolExecution::new(ToolResult::for_call(call, parts))),
            Err(err @ SkillError::Tool { .. }) => {
                tracing::debug!(id = %call.id, "Tool failed: {}", err);
                Ok(ToolExecution::new(ToolResult::failure(call, err.to_string())))
            }
            Err(SkillError::Transport { skill, message }) => {
                Err(ExecutorError::Transport { skill, message })
            }
        }
    }
}

/// Terminal state of a launched sub-run
#[derive(Debug, Clone, PartialEq)]
pub enum SubRunOutcome {
    /// The sub-run reached a terminal checkpoint
    Finished(Box<Checkpoint>),
    /// The sub-run could not be started or crashed
    Failed(String),
}

/// Launches the sub-run for one delegation target
#[async_trait]
pub trait SubRunLauncher: Send + Sync {
    /// Only cancellation is returned as an error; every other failure is an
    /// outcome for the delegating call.
    async fn launch(&self, target: &DelegationTarget) -> Result<SubRunOutcome, ExecutorError>;
}

/// Delegation target described by a delegate call
pub fn delegation_target(call: &ToolCall) -> DelegationTarget {
    let query = call
        .str_arg("query")
        .map(str::to_string)
        .unwrap_or_else(|| serde_json::Value::Object(call.args.clone()).to_string());
    DelegationTarget {
        expert_key: call.skill_name.clone(),
        tool_call_id: call.id.clone(),
        query,
    }
}

/// Runs a delegate call as a sub-run and wraps its output
pub struct DelegateExecutor<'a> {
    launcher: &'a dyn SubRunLauncher,
}

impl<'a> DelegateExecutor<'a> {
    pub fn new(launcher: &'a dyn SubRunLauncher) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl ToolCallExecutor for DelegateExecutor<'_> {
    fn kind(&self) -> ToolCallKind {
        ToolCallKind::Delegate
    }

    async fn execute(
        &self,
        call: &ToolCall,
        _skills: &SkillManagers,
    ) -> Result<ToolExecution, ExecutorError> {
        let target = delegation_target(call);
        let execution = match self.launcher.launch(&target).await? {
            SubRunOutcome::Finished(checkpoint) => {
                let usage = checkpoint.usage;
                ToolExecution::new(delegate_result(call, &checkpoint)).with_usage(usage)
            }
            SubRunOutcome::Failed(message) => ToolExecution::new(ToolResult::failure(
                call,
                format!("Delegate '{}' failed: {}", target.expert_key, message),
            )),
        };
        Ok(execution)
    }
}

fn delegate_result(call: &ToolCall, checkpoint: &Checkpoint) -> ToolResult {
    if checkpoint.status == CheckpointStatus::Completed {
        return ToolResult::text(call, checkpoint.output_text().unwrap_or_default());
    }
    let mut message = format!(
        "Delegate '{}' stopped with status {}",
        checkpoint.expert.key, checkpoint.status
    );
    if let Some(error) = &checkpoint.error {
        message.push_str(": ");
        message.push_str(error);
    }
    ToolResult::failure(call, message)
}

/// Resolves pending interactive calls from a resume input
#[derive(Debug, Clone)]
pub struct InteractiveExecutor {
    input: InteractiveToolResult,
}

impl InteractiveExecutor {
    /// Accept `input` only if it answers one of the `pending` calls
    pub fn new(input: InteractiveToolResult, pending: &[ToolCall]) -> Result<Self, ExecutorError> {
        if !pending.iter().any(|c| c.id == input.tool_call_id) {
            return Err(ExecutorError::InteractiveMismatch {
                found: input.tool_call_id,
            });
        }
        Ok(Self { input })
    }
}

#[async_trait]
impl ToolCallExecutor for InteractiveExecutor {
    fn kind(&self) -> ToolCallKind {
        ToolCallKind::Interactive
    }

    async fn execute(
        &self,
        call: &ToolCall,
        _skills: &SkillManagers,
    ) -> Result<ToolExecution, ExecutorError> {
        let result = if call.id == self.input.tool_call_id {
            ToolResult::text(call, self.input.text.clone())
        } else {
            ToolResult::failure(call, "No interactive result was supplied for this call")
        };
        Ok(ToolExecution::new(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::create_initial_checkpoint;
    use crate::model::{ContentPart, Expert, Message};
    use crate::tools::SkillManager;
    use serde_json::json;
    use std::sync::Arc;

    struct EchoSkill;

    #[async_trait]
    impl SkillManager for EchoSkill {
        fn name(&self) -> &str {
            "echo"
        }

        async fn call_tool(&self, call: &ToolCall) -> Result<Vec<ContentPart>, SkillError> {
            match call.tool_name.as_str() {
                "say" => Ok(vec![ContentPart::text(call.str_arg("text").unwrap_or(""))]),
                "fail" => Err(SkillError::tool("fail", "bad input")),
                _ => Err(SkillError::transport("echo", "socket closed")),
            }
        }
    }

    fn skills() -> SkillManagers {
        SkillManagers::new().with(Arc::new(EchoSkill))
    }

    #[tokio::test]
    async fn test_remote_success_and_tool_failure() {
        let ok = ToolCall::new("1", "echo", "say", json!({"text": "hi"}));
        let exec = RemoteToolExecutor.execute(&ok, &skills()).await.unwrap();
        assert_eq!(exec.result.joined_text(), "hi");
        assert_eq!(exec.result.id, "1");

        let bad = ToolCall::new("2", "echo", "fail", json!({}));
        let exec = RemoteToolExecutor.execute(&bad, &skills()).await.unwrap();
        assert!(exec.result.is_failure());
        assert!(exec.result.joined_text().contains("bad input"));
    }

    #[tokio::test]
    async fn test_remote_transport_error_is_fatal() {
        let call = ToolCall::new("1", "echo", "other", json!({}));
        let err = RemoteToolExecutor.execute(&call, &skills()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_remote_missing_manager_is_failure_result() {
        let call = ToolCall::new("1", "nowhere", "x", json!({}));
        let exec = RemoteToolExecutor.execute(&call, &skills()).await.unwrap();
        assert!(exec.result.is_failure());
    }

    struct FixedLauncher(CheckpointStatus);

    #[async_trait]
    impl SubRunLauncher for FixedLauncher {
        async fn launch(&self, target: &DelegationTarget) -> Result<SubRunOutcome, ExecutorError> {
            let expert = Expert::new(target.expert_key.clone(), "Helper", "help");
            let checkpoint = create_initial_checkpoint(
                "job",
                "sub",
                &expert,
                vec![
                    Message::user(target.query.clone()),
                    Message::expert("sub answer", vec![]),
                ],
            )
            .with_status(self.0)
            .with_usage(Usage {
                total_tokens: 7,
                ..Default::default()
            });
            Ok(SubRunOutcome::Finished(Box::new(checkpoint)))
        }
    }

    #[tokio::test]
    async fn test_delegate_wraps_sub_run_output() {
        let launcher = FixedLauncher(CheckpointStatus::Completed);
        let call = ToolCall::new("d1", "helper", "helper", json!({"query": "look it up"}));
        let exec = DelegateExecutor::new(&launcher)
            .execute(&call, &SkillManagers::new())
            .await
            .unwrap();
        assert_eq!(exec.result.joined_text(), "sub answer");
        assert_eq!(exec.usage.total_tokens, 7);
    }

    #[tokio::test]
    async fn test_delegate_non_completed_is_failure() {
        let launcher = FixedLauncher(CheckpointStatus::StoppedByExceededMaxSteps);
        let call = ToolCall::new("d1", "helper", "helper", json!({"query": "q"}));
        let exec = DelegateExecutor::new(&launcher)
            .execute(&call, &SkillManagers::new())
            .await
            .unwrap();
        assert!(exec.result.is_failure());
        assert!(exec.result.joined_text().contains("stoppedByExceededMaxSteps"));
    }

    #[test]
    fn test_delegation_target_falls_back_to_args() {
        let call = ToolCall::new("d1", "helper", "helper", json!({"topic": "rust"}));
        let target = delegation_target(&call);
        assert_eq!(target.expert_key, "helper");
        assert_eq!(target.query, r#"{"topic":"rust"}"#);
    }

    #[tokio::test]
    async fn test_interactive_executor_matches_pending_call() {
        let pending = vec![
            ToolCall::new("i1", "ask", "user", json!({})),
            ToolCall::new("i2", "ask", "user", json!({})),
        ];
        let input = InteractiveToolResult {
            tool_call_id: "i1".to_string(),
            skill_name: "ask".to_string(),
            tool_name: "user".to_string(),
            text: "yes".to_string(),
        };
        let executor = InteractiveExecutor::new(input.clone(), &pending).unwrap();
        let answered = executor.execute(&pending[0], &SkillManagers::new()).await.unwrap();
        assert_eq!(answered.result.joined_text(), "yes");
        let unanswered = executor.execute(&pending[1], &SkillManagers::new()).await.unwrap();
        assert!(unanswered.result.is_failure());

        let wrong = InteractiveToolResult {
            tool_call_id: "zzz".to_string(),
            ..input
        };
        assert!(matches!(
            InteractiveExecutor::new(wrong, &pending),
            Err(ExecutorError::InteractiveMismatch { .. })
        ));
    }
}
