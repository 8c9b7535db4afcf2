//! Runtime state machine for one run.
//!
//! ```text
//! PreparingForStep -> Generating -> Completed
//!                          |
//!                 ResolvingToolResult -> CallingInteractiveTool -> FinishingStep
//!                          |          -> Delegating             -> FinishingStep
//!                          +-------------------------------------> FinishingStep
//! FinishingStep -> PreparingForStep | Completed | StoppedBy*
//! ```
//!
//! Each state has one transition function. A step's checkpoint is persisted
//! once, in `FinishingStep`, with the step's final status.

use futures_util::StreamExt;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{RuntimeError, RuntimeResult};
use super::runtime::{ExpertRuntime, SubRunContext, RUNTIME_VERSION};
use super::step_executor::{order_results, StepExecutor, StepResult};
use crate::checkpoint::{
    create_next_step_checkpoint, Checkpoint, CheckpointStatus, DelegationTarget,
};
use crate::events::{EventEmitter, EventListener};
use crate::model::{
    Expert, InteractiveToolResult, Job, JobStatus, Message, PendingEvent, RunEventKind, RunInput,
    RunSetting, Step, ToolCall, ToolDefinition, ToolResult, Usage,
};
use crate::provider::{GenerateRequest, Generation, StreamChunk};
use crate::tools::{
    classify_tool_call, delegation_target, ClassifiedToolCalls, InteractiveExecutor,
    ToolCallKind,
};

/// Calls left unresolved when a step halts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HaltPayload {
    pub pending: Vec<ToolCall>,
    pub partial: Vec<ToolResult>,
    pub delegate_to: Vec<DelegationTarget>,
}

/// States of a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    PreparingForStep,
    Generating {
        step: Step,
    },
    ResolvingToolResult {
        step: Step,
        tool_calls: Vec<ToolCall>,
    },
    CallingInteractiveTool {
        step: Step,
        classified: ClassifiedToolCalls,
        partial: Vec<ToolResult>,
    },
    Delegating {
        step: Step,
        classified: ClassifiedToolCalls,
        partial: Vec<ToolResult>,
    },
    FinishingStep {
        step: Step,
        status: CheckpointStatus,
        halt: HaltPayload,
    },
    Completed,
    StoppedByInteractiveTool,
    StoppedByDelegate,
    StoppedByExceededMaxSteps,
    StoppedByError,
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::PreparingForStep => "PreparingForStep",
            RunState::Generating { .. } => "Generating",
            RunState::ResolvingToolResult { .. } => "ResolvingToolResult",
            RunState::CallingInteractiveTool { .. } => "CallingInteractiveTool",
            RunState::Delegating { .. } => "Delegating",
            RunState::FinishingStep { .. } => "FinishingStep",
            RunState::Completed => "Completed",
            RunState::StoppedByInteractiveTool => "StoppedByInteractiveTool",
            RunState::StoppedByDelegate => "StoppedByDelegate",
            RunState::StoppedByExceededMaxSteps => "StoppedByExceededMaxSteps",
            RunState::StoppedByError => "StoppedByError",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed
                | RunState::StoppedByInteractiveTool
                | RunState::StoppedByDelegate
                | RunState::StoppedByExceededMaxSteps
                | RunState::StoppedByError
        )
    }
}

/// A transition error and the step it interrupted
#[derive(Debug)]
pub(crate) struct StepFailure {
    error: RuntimeError,
    step: Option<Step>,
}

impl StepFailure {
    fn new(error: RuntimeError, step: Step) -> Self {
        Self {
            error,
            step: Some(step),
        }
    }
}

impl From<RuntimeError> for StepFailure {
    fn from(error: RuntimeError) -> Self {
        Self { error, step: None }
    }
}

type Transition = Result<RunState, StepFailure>;

/// Check that `input` can start or continue a run from `source`
pub(crate) fn validate_resume_input(
    source: Option<&Checkpoint>,
    input: &RunInput,
) -> RuntimeResult<()> {
    let Some(checkpoint) = source else {
        return match input {
            RunInput::Query { .. } => Ok(()),
            RunInput::InteractiveToolResult(_) => Err(RuntimeError::invalid_resume(
                "a new run needs a query input",
            )),
        };
    };

    match checkpoint.status {
        CheckpointStatus::Init | CheckpointStatus::Proceeding | CheckpointStatus::StoppedByDelegate => {
            Ok(())
        }
        CheckpointStatus::StoppedByInteractiveTool => match input {
            RunInput::InteractiveToolResult(result)
                if checkpoint
                    .pending_tool_calls
                    .iter()
                    .any(|c| c.id == result.tool_call_id) =>
            {
                Ok(())
            }
            RunInput::InteractiveToolResult(result) => Err(RuntimeError::invalid_resume(format!(
                "tool call '{}' is not pending",
                result.tool_call_id
            ))),
            RunInput::Query { .. } => Err(RuntimeError::invalid_resume(
                "a run stopped by an interactive tool needs an interactive tool result",
            )),
        },
        CheckpointStatus::Completed
        | CheckpointStatus::StoppedByExceededMaxSteps
        | CheckpointStatus::StoppedByError => match input {
            RunInput::Query { .. } => Ok(()),
            RunInput::InteractiveToolResult(_) => Err(RuntimeError::invalid_resume(format!(
                "a run with status {} needs a new query",
                checkpoint.status
            ))),
        },
    }
}

/// Reject tool calls with an empty or duplicate id, or an empty tool name
fn validate_tool_calls(calls: &[ToolCall]) -> RuntimeResult<()> {
    let mut seen = HashSet::new();
    for call in calls {
        if call.id.is_empty() {
            return Err(RuntimeError::MalformedResponse(format!(
                "tool call to '{}' has an empty id",
                call.tool_name
            )));
        }
        if call.tool_name.is_empty() {
            return Err(RuntimeError::MalformedResponse(format!(
                "tool call '{}' has an empty tool name",
                call.id
            )));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(RuntimeError::MalformedResponse(format!(
                "duplicate tool call id '{}'",
                call.id
            )));
        }
    }
    Ok(())
}

fn last_tool_calls(messages: &[Message]) -> Vec<ToolCall> {
    messages
        .iter()
        .rev()
        .find_map(|m| match m {
            Message::Expert { tool_calls, .. } => Some(tool_calls.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Drives one run from its latest checkpoint to a terminal checkpoint
pub(crate) struct StateMachine<'a> {
    runtime: &'a ExpertRuntime,
    expert: &'a Expert,
    setting: &'a RunSetting,
    emitter: &'a EventEmitter,
    listeners: &'a [Arc<dyn EventListener>],
    cancellation: &'a CancellationToken,
    tools: Vec<ToolDefinition>,
    latest: Checkpoint,
    usage: Usage,
    job: Option<Job>,
    carried: Vec<Message>,
    deadline: Instant,
}

impl<'a> StateMachine<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        runtime: &'a ExpertRuntime,
        expert: &'a Expert,
        setting: &'a RunSetting,
        emitter: &'a EventEmitter,
        listeners: &'a [Arc<dyn EventListener>],
        cancellation: &'a CancellationToken,
        latest: Checkpoint,
        job: Option<Job>,
    ) -> Self {
        Self {
            tools: runtime.tool_definitions(expert),
            usage: latest.usage,
            deadline: Instant::now() + setting.timeout_duration(),
            runtime,
            expert,
            setting,
            emitter,
            listeners,
            cancellation,
            latest,
            job,
            carried: Vec::new(),
        }
    }

    /// Run until a terminal checkpoint other than a delegation halt.
    ///
    /// Delegation halts are resolved by running the sub-runs and continuing
    /// with their results.
    pub(crate) async fn drive(&mut self) -> RuntimeResult<Checkpoint> {
        self.emit(
            self.latest.step_number + 1,
            RunEventKind::RuntimeInit {
                runtime_version: RUNTIME_VERSION.to_string(),
                expert_name: self.expert.name.clone(),
                model: self.setting.model.clone(),
                max_steps: self.setting.max_steps,
                query: self.setting.query().map(str::to_string),
            },
        )
        .await;

        let mut carried = match self.seed_messages().await {
            Ok(messages) => messages,
            Err(err) if err.is_step_fatal() => return self.fail(err, None).await,
            Err(err) => return Err(err),
        };

        loop {
            let checkpoint = self.run(carried).await?;
            if checkpoint.status != CheckpointStatus::StoppedByDelegate {
                return Ok(checkpoint);
            }
            carried = match self.resolve_halt(None).await {
                Ok(messages) => messages,
                Err(err) if err.is_step_fatal() => return self.fail(err, None).await,
                Err(err) => return Err(err),
            };
        }
    }

    /// Messages the first step carries, depending on how the run stopped
    async fn seed_messages(&mut self) -> RuntimeResult<Vec<Message>> {
        validate_resume_input(Some(&self.latest), &self.setting.input)?;
        match (self.latest.status, &self.setting.input) {
            (CheckpointStatus::Init | CheckpointStatus::Proceeding, _) => Ok(Vec::new()),
            (CheckpointStatus::StoppedByDelegate, _) => self.resolve_halt(None).await,
            (CheckpointStatus::StoppedByInteractiveTool, RunInput::InteractiveToolResult(result)) => {
                let result = result.clone();
                self.resolve_halt(Some(&result)).await
            }
            (_, RunInput::Query { text }) => Ok(vec![Message::user(text.clone())]),
            (status, _) => Err(RuntimeError::invalid_resume(format!(
                "cannot continue a run with status {}",
                status
            ))),
        }
    }

    /// Resolve the pending calls of a halted checkpoint into a tool message
    async fn resolve_halt(
        &mut self,
        input: Option<&InteractiveToolResult>,
    ) -> RuntimeResult<Vec<Message>> {
        let next = self.latest.step_number + 1;
        let pending = self.latest.pending_tool_calls.clone();
        let classified = ClassifiedToolCalls::classify(self.expert, &pending);
        let interactive = match input {
            Some(result) => Some(InteractiveExecutor::new(result.clone(), &pending)?),
            None => None,
        };

        tracing::info!(
            job_id = %self.setting.job_id,
            run_id = %self.setting.run_id,
            step = next,
            delegates = classified.delegate.len(),
            interactive = classified.interactive.len(),
            "Resolving halted tool calls"
        );

        let deps = self.runtime.deps();
        let executor = StepExecutor::new(&deps.skills, self.runtime.config().tool_execution);
        let launcher = SubRunContext::new(
            self.runtime,
            self.setting,
            self.latest.step_number,
            self.listeners,
            self.cancellation,
        );
        let resolved = executor
            .execute(&classified, &launcher, interactive.as_ref())
            .await?;
        self.usage += resolved.usage;

        let mut results = self.latest.partial_tool_results.clone();
        results.extend(resolved.results);
        let results = order_results(&last_tool_calls(&self.latest.messages), results);

        self.emit(
            next,
            RunEventKind::ResolveToolResults {
                tool_results: results.clone(),
            },
        )
        .await;
        Ok(vec![Message::tool(results)])
    }

    /// Run states from `PreparingForStep` until a terminal state
    async fn run(&mut self, carried: Vec<Message>) -> RuntimeResult<Checkpoint> {
        self.carried = carried;
        let mut state = RunState::PreparingForStep;

        while !state.is_terminal() {
            tracing::debug!(
                job_id = %self.setting.job_id,
                run_id = %self.setting.run_id,
                step = self.latest.step_number,
                state = state.name(),
                "State transition"
            );
            let transition = match state {
                RunState::PreparingForStep => self.prepare_for_step().await,
                RunState::Generating { step } => self.generate(step).await,
                RunState::ResolvingToolResult { step, tool_calls } => {
                    self.resolve_tool_results(step, tool_calls).await
                }
                RunState::CallingInteractiveTool {
                    step,
                    classified,
                    partial,
                } => Ok(self.call_interactive_tool(step, classified, partial)),
                RunState::Delegating {
                    step,
                    classified,
                    partial,
                } => Ok(self.delegate(step, classified, partial)),
                RunState::FinishingStep { step, status, halt } => {
                    self.finish_step(step, status, halt).await
                }
                terminal => Ok(terminal),
            };

            state = match transition {
                Ok(next) => next,
                Err(StepFailure { error, step }) if error.is_step_fatal() => {
                    return self.fail(error, step).await;
                }
                Err(StepFailure { error, .. }) => return Err(error),
            };
        }

        Ok(self.latest.clone())
    }

    async fn prepare_for_step(&mut self) -> Transition {
        if self.cancellation.is_cancelled() {
            tracing::info!(
                job_id = %self.setting.job_id,
                run_id = %self.setting.run_id,
                "Run cancelled before step {}",
                self.latest.step_number + 1
            );
            return Err(RuntimeError::Cancelled.into());
        }

        let next = self.latest.step_number + 1;
        if next > self.setting.max_steps {
            // Nothing new was generated, so nothing is persisted
            self.carried.clear();
            self.latest = self
                .latest
                .clone()
                .with_status(CheckpointStatus::StoppedByExceededMaxSteps);
            self.stop_job(JobStatus::StoppedByMaxSteps).await?;
            self.emit(
                self.latest.step_number,
                RunEventKind::StopRunByExceededMaxSteps {
                    max_steps: self.setting.max_steps,
                },
            )
            .await;
            return Ok(RunState::StoppedByExceededMaxSteps);
        }

        let carried = std::mem::take(&mut self.carried);
        let step = Step::start(next, &self.latest.messages, carried);
        self.deadline = Instant::now() + self.setting.timeout_duration();
        Ok(RunState::Generating { step })
    }

    async fn generate(&mut self, mut step: Step) -> Transition {
        let request = GenerateRequest {
            model: self.setting.model.clone(),
            messages: step.prompt().to_vec(),
            tools: self.tools.clone(),
        };
        self.emit(
            step.step_number,
            RunEventKind::StartGeneration {
                message_count: request.messages.len(),
            },
        )
        .await;

        let generated = self
            .within_deadline(
                step.step_number,
                self.generate_with_retry(&request, step.step_number),
            )
            .await
            .and_then(|generation| {
                validate_tool_calls(&generation.tool_calls)?;
                Ok(generation)
            });
        let generation = match generated {
            Ok(generation) => generation,
            Err(err) => return Err(StepFailure::new(err, step)),
        };

        step.add_usage(generation.usage);
        self.usage += generation.usage;
        step.push_message(Message::expert(
            generation.text.clone(),
            generation.tool_calls.clone(),
        ));

        if generation.tool_calls.is_empty() {
            return Ok(RunState::FinishingStep {
                step,
                status: CheckpointStatus::Completed,
                halt: HaltPayload::default(),
            });
        }

        step.tool_calls = generation.tool_calls.clone();
        self.emit(
            step.step_number,
            RunEventKind::CallTools {
                text: generation.text,
                tool_calls: generation.tool_calls.clone(),
                usage: generation.usage,
            },
        )
        .await;
        Ok(RunState::ResolvingToolResult {
            step,
            tool_calls: generation.tool_calls,
        })
    }

    async fn resolve_tool_results(&mut self, mut step: Step, tool_calls: Vec<ToolCall>) -> Transition {
        let classified = ClassifiedToolCalls::classify(self.expert, &tool_calls);
        tracing::info!(
            job_id = %self.setting.job_id,
            run_id = %self.setting.run_id,
            step = step.step_number,
            remote = classified.remote.len(),
            delegate = classified.delegate.len(),
            interactive = classified.interactive.len(),
            "Resolving tool calls"
        );

        // Remote calls run first, even when the batch halts
        let deps = self.runtime.deps();
        let executor = StepExecutor::new(&deps.skills, self.runtime.config().tool_execution);
        let executed = self
            .within_deadline(step.step_number, async {
                executor
                    .execute_remote(&classified.remote)
                    .await
                    .map_err(RuntimeError::from)
            })
            .await;
        let remote = match executed {
            Ok(executions) => StepResult::merge(executions),
            Err(err) => return Err(StepFailure::new(err, step)),
        };
        step.add_usage(remote.usage);
        self.usage += remote.usage;

        if !classified.interactive.is_empty() {
            return Ok(RunState::CallingInteractiveTool {
                step,
                classified,
                partial: remote.results,
            });
        }
        if !classified.delegate.is_empty() {
            return Ok(RunState::Delegating {
                step,
                classified,
                partial: remote.results,
            });
        }

        self.emit(
            step.step_number,
            RunEventKind::ResolveToolResults {
                tool_results: remote.results.clone(),
            },
        )
        .await;
        step.tool_results = remote.results.clone();
        step.push_message(Message::tool(remote.results));
        Ok(RunState::FinishingStep {
            step,
            status: CheckpointStatus::Proceeding,
            halt: HaltPayload::default(),
        })
    }

    fn call_interactive_tool(
        &self,
        mut step: Step,
        classified: ClassifiedToolCalls,
        partial: Vec<ToolResult>,
    ) -> RunState {
        step.tool_results = partial.clone();
        RunState::FinishingStep {
            step,
            status: CheckpointStatus::StoppedByInteractiveTool,
            halt: HaltPayload {
                pending: classified.halted_calls(),
                partial,
                delegate_to: Vec::new(),
            },
        }
    }

    fn delegate(
        &self,
        mut step: Step,
        classified: ClassifiedToolCalls,
        partial: Vec<ToolResult>,
    ) -> RunState {
        step.tool_results = partial.clone();
        let delegate_to = classified
            .delegate
            .iter()
            .map(|entry| delegation_target(&entry.call))
            .collect();
        RunState::FinishingStep {
            step,
            status: CheckpointStatus::StoppedByDelegate,
            halt: HaltPayload {
                pending: classified.halted_calls(),
                partial,
                delegate_to,
            },
        }
    }

    async fn finish_step(
        &mut self,
        mut step: Step,
        status: CheckpointStatus,
        halt: HaltPayload,
    ) -> Transition {
        let continues = matches!(
            status,
            CheckpointStatus::Proceeding | CheckpointStatus::StoppedByDelegate
        );
        let status = if continues && step.step_number >= self.setting.max_steps {
            CheckpointStatus::StoppedByExceededMaxSteps
        } else {
            status
        };

        step.finish();
        let checkpoint = create_next_step_checkpoint(&self.latest, step.new_messages)
            .with_status(status)
            .with_usage(self.usage)
            .with_pending(halt.pending, halt.partial)
            .with_delegate_to(halt.delegate_to);
        self.persist(checkpoint).await?;

        let step_number = self.latest.step_number;
        let next = match status {
            CheckpointStatus::Init | CheckpointStatus::Proceeding => {
                return Ok(RunState::PreparingForStep)
            }
            CheckpointStatus::Completed => {
                self.stop_job(JobStatus::Completed).await?;
                let text = self.latest.output_text().unwrap_or_default().to_string();
                self.emit(
                    step_number,
                    RunEventKind::CompleteRun {
                        text,
                        usage: self.usage,
                    },
                )
                .await;
                RunState::Completed
            }
            CheckpointStatus::StoppedByInteractiveTool => {
                self.stop_job(JobStatus::StoppedByInteractiveTool).await?;
                let tool_calls = self
                    .latest
                    .pending_tool_calls
                    .iter()
                    .filter(|c| classify_tool_call(self.expert, c) == ToolCallKind::Interactive)
                    .cloned()
                    .collect();
                self.emit(step_number, RunEventKind::StopRunByInteractiveTool { tool_calls })
                    .await;
                RunState::StoppedByInteractiveTool
            }
            CheckpointStatus::StoppedByDelegate => {
                let delegate_to = self
                    .latest
                    .delegate_to
                    .iter()
                    .map(|t| t.expert_key.clone())
                    .collect();
                self.emit(step_number, RunEventKind::StopRunByDelegate { delegate_to })
                    .await;
                RunState::StoppedByDelegate
            }
            CheckpointStatus::StoppedByExceededMaxSteps => {
                self.stop_job(JobStatus::StoppedByMaxSteps).await?;
                self.emit(
                    step_number,
                    RunEventKind::StopRunByExceededMaxSteps {
                        max_steps: self.setting.max_steps,
                    },
                )
                .await;
                RunState::StoppedByExceededMaxSteps
            }
            CheckpointStatus::StoppedByError => RunState::StoppedByError,
        };
        Ok(next)
    }

    /// Persist a stoppedByError checkpoint and stop the run.
    ///
    /// The checkpoint is only written when the interrupted step produced
    /// messages; otherwise the latest checkpoint is returned with the error
    /// status without being stored.
    async fn fail(&mut self, error: RuntimeError, step: Option<Step>) -> RuntimeResult<Checkpoint> {
        let message = error.to_string();
        tracing::error!(
            job_id = %self.setting.job_id,
            run_id = %self.setting.run_id,
            step = self.latest.step_number + 1,
            "Run stopped by error: {}",
            message
        );

        let new_messages = step.map(|s| s.new_messages).unwrap_or_default();
        if new_messages.is_empty() {
            self.latest = self
                .latest
                .clone()
                .with_status(CheckpointStatus::StoppedByError)
                .with_error(message.clone());
        } else {
            let checkpoint = create_next_step_checkpoint(&self.latest, new_messages)
                .with_status(CheckpointStatus::StoppedByError)
                .with_usage(self.usage)
                .with_error(message.clone());
            self.persist(checkpoint).await?;
        }

        self.stop_job(JobStatus::StoppedByError).await?;
        self.emit(
            self.latest.step_number,
            RunEventKind::StopRunByError { error: message },
        )
        .await;
        Ok(self.latest.clone())
    }

    async fn persist(&mut self, checkpoint: Checkpoint) -> RuntimeResult<()> {
        let deps = self.runtime.deps();
        deps.store.store_checkpoint(&checkpoint).await?;
        tracing::info!(
            job_id = %checkpoint.job_id,
            run_id = %checkpoint.run_id,
            step = checkpoint.step_number,
            status = %checkpoint.status,
            "Checkpoint stored"
        );

        if let Some(job) = self.job.as_mut() {
            job.record_progress(checkpoint.step_number, checkpoint.usage)?;
            deps.store.store_job(job).await?;
        }
        self.latest = checkpoint;
        Ok(())
    }

    async fn stop_job(&mut self, status: JobStatus) -> RuntimeResult<()> {
        if let Some(job) = self.job.as_mut() {
            job.finish(status)?;
            self.runtime.deps().store.store_job(job).await?;
            tracing::info!(job_id = %job.id, status = %status, "Job finished");
        }
        Ok(())
    }

    async fn emit(&self, step_number: u32, kind: RunEventKind) {
        let pending = PendingEvent::new(
            self.setting.job_id.clone(),
            self.setting.run_id.clone(),
            self.expert.key.clone(),
            step_number,
            kind,
        );
        if let Err(err) = self.emitter.emit(pending).await {
            tracing::warn!(
                job_id = %self.setting.job_id,
                run_id = %self.setting.run_id,
                step = step_number,
                "{}",
                err
            );
        }
    }

    async fn within_deadline<T, F>(&self, step_number: u32, future: F) -> RuntimeResult<T>
    where
        F: Future<Output = RuntimeResult<T>>,
    {
        tokio::time::timeout_at(self.deadline, future)
            .await
            .map_err(|_| RuntimeError::StepTimeout {
                step: step_number,
                timeout_ms: self.setting.timeout,
            })?
    }

    /// Generate with retries and exponential backoff
    async fn generate_with_retry(
        &self,
        request: &GenerateRequest,
        step_number: u32,
    ) -> RuntimeResult<Generation> {
        let max_retries = self.setting.max_retries;
        let backoff = self.runtime.config().retry_backoff;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match self.generate_once(request, step_number).await {
                Ok(generation) => return Ok(generation),
                Err(e) => {
                    tracing::warn!(
                        run_id = %self.setting.run_id,
                        step = step_number,
                        attempt,
                        "Generation failed: {:#}",
                        e
                    );
                    last_error = Some(e);
                    if attempt < max_retries {
                        let wait = backoff.saturating_mul(2u32.saturating_pow(attempt));
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        Err(RuntimeError::Generation {
            attempts: max_retries + 1,
            message: last_error
                .map(|e| format!("{:#}", e))
                .unwrap_or_else(|| "unknown provider error".to_string()),
        })
    }

    async fn generate_once(
        &self,
        request: &GenerateRequest,
        step_number: u32,
    ) -> anyhow::Result<Generation> {
        let provider = &self.runtime.deps().provider;
        if !self.runtime.config().stream {
            return provider.generate(request).await;
        }

        let mut stream = provider.generate_stream(request).await?;
        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::TextDelta(delta) => {
                    self.emit(step_number, RunEventKind::StreamingText { delta })
                        .await
                }
                StreamChunk::Finished(generation) => return Ok(generation),
            }
        }
        anyhow::bail!("{} stream ended before the generation finished", provider.provider_name())
    }
}
