//! Expert runtime - run entry point, job handling and sub-run launching

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{RuntimeError, RuntimeResult};
use super::state_machine::{validate_resume_input, StateMachine};
use super::step_executor::ToolExecutionMode;
use crate::checkpoint::{
    create_initial_checkpoint, Checkpoint, CheckpointStatus, DelegatedBy, DelegationTarget,
    RunStore,
};
use crate::events::{EventCollector, EventEmitter, EventListener, StoreEventListener};
use crate::model::{
    Expert, ExpertCatalog, Job, Message, RunEvent, RunInput, RunSetting, ToolDefinition,
};
use crate::observability::RunLogger;
use crate::provider::LlmProvider;
use crate::tools::{ExecutorError, SkillManagers, SubRunLauncher, SubRunOutcome};

/// Version reported in `runtimeInit` events
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime behaviour shared by every run
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Ask the provider for a stream and emit `streamingText` deltas
    pub stream: bool,
    /// How remote tool calls of one batch are executed
    pub tool_execution: ToolExecutionMode,
    /// Base delay between generation retries, doubled per attempt
    pub retry_backoff: Duration,
    /// Append every event to the run store
    pub persist_events: bool,
    /// Write a markdown transcript per top-level run into this directory
    pub run_log_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stream: false,
            tool_execution: ToolExecutionMode::Sequential,
            retry_backoff: Duration::from_secs(1),
            persist_events: true,
            run_log_dir: None,
        }
    }
}

/// Collaborators of the runtime
#[derive(Clone)]
pub struct RuntimeDeps {
    pub provider: Arc<dyn LlmProvider>,
    pub store: Arc<dyn RunStore>,
    pub experts: Arc<ExpertCatalog>,
    pub skills: SkillManagers,
}

impl std::fmt::Debug for RuntimeDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeDeps")
            .field("provider", &self.provider.provider_name())
            .field("store", &self.store.backend_type())
            .field("experts", &self.experts.keys())
            .field("skills", &self.skills.names())
            .finish()
    }
}

/// Parameters of one `run` call
pub struct RunParams {
    pub setting: RunSetting,
    /// Checkpoint to continue from; the store's latest is used when absent
    pub checkpoint: Option<Checkpoint>,
    /// Receives every event of the run and its sub-runs
    pub event_listener: Option<Arc<dyn EventListener>>,
    pub cancellation: CancellationToken,
}

impl RunParams {
    pub fn new(setting: RunSetting) -> Self {
        Self {
            setting,
            checkpoint: None,
            event_listener: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn with_event_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = Some(listener);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Final checkpoint of a run and every event emitted while it ran
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub checkpoint: Checkpoint,
    pub events: Vec<RunEvent>,
}

/// One run, top-level or delegated
pub(crate) struct RunRequest {
    setting: RunSetting,
    checkpoint: Option<Checkpoint>,
    delegated_by: Option<DelegatedBy>,
    listeners: Vec<Arc<dyn EventListener>>,
    cancellation: CancellationToken,
}

/// Core expert runtime
///
/// Runs experts step by step, persisting a checkpoint per step, and resolves
/// delegations by running the delegates as sub-runs of the same job.
pub struct ExpertRuntime {
    deps: RuntimeDeps,
    config: RuntimeConfig,
}

impl ExpertRuntime {
    /// Create a runtime with the default configuration
    pub fn new(deps: RuntimeDeps) -> Self {
        Self::with_config(deps, RuntimeConfig::default())
    }

    pub fn with_config(deps: RuntimeDeps, config: RuntimeConfig) -> Self {
        Self { deps, config }
    }

    pub fn deps(&self) -> &RuntimeDeps {
        &self.deps
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run an expert until it completes or stops.
    ///
    /// Starts a new run when the store holds no checkpoint for the setting's
    /// run, and continues from the latest (or the given) checkpoint otherwise.
    /// Returns the terminal checkpoint; stops caused by the model or tools are
    /// reported through its status, not as errors.
    pub async fn run(&self, params: RunParams) -> RuntimeResult<RunOutput> {
        let collector = EventCollector::new();
        let mut listeners: Vec<Arc<dyn EventListener>> = Vec::new();
        if self.config.persist_events {
            listeners.push(Arc::new(StoreEventListener::new(self.deps.store.clone())));
        }
        listeners.push(Arc::new(collector.clone()));
        if let Some(dir) = &self.config.run_log_dir {
            let setting = &params.setting;
            match RunLogger::for_run(dir, &setting.job_id, &setting.run_id) {
                Ok(logger) => listeners.push(Arc::new(logger)),
                Err(err) => tracing::warn!(
                    job_id = %setting.job_id,
                    run_id = %setting.run_id,
                    "Run transcript disabled: {:#}",
                    err
                ),
            }
        }
        if let Some(listener) = params.event_listener {
            listeners.push(listener);
        }

        let checkpoint = self
            .execute(RunRequest {
                setting: params.setting,
                checkpoint: params.checkpoint,
                delegated_by: None,
                listeners,
                cancellation: params.cancellation,
            })
            .await?;

        Ok(RunOutput {
            checkpoint,
            events: collector.events(),
        })
    }

    pub(crate) async fn execute(&self, request: RunRequest) -> RuntimeResult<Checkpoint> {
        let RunRequest {
            setting,
            checkpoint,
            delegated_by,
            listeners,
            cancellation,
        } = request;

        let expert = self
            .deps
            .experts
            .get(&setting.expert_key)
            .ok_or_else(|| RuntimeError::UnknownExpert(setting.expert_key.clone()))?;

        let source = match checkpoint {
            Some(checkpoint) => Some(checkpoint),
            None => {
                self.deps
                    .store
                    .retrieve_latest_checkpoint(&setting.job_id, &setting.run_id)
                    .await?
            }
        };
        validate_resume_input(source.as_ref(), &setting.input)?;

        // Sub-runs report into their parent's job
        let job = match delegated_by {
            Some(_) => None,
            None => Some(self.open_job(&setting).await?),
        };
        self.deps.store.store_run_setting(&setting).await?;

        let latest = match source {
            Some(checkpoint) => rebase(checkpoint, &setting, delegated_by.clone()),
            None => self.start_run(&setting, expert, delegated_by.clone()).await?,
        };

        tracing::info!(
            job_id = %setting.job_id,
            run_id = %setting.run_id,
            expert = %setting.expert_key,
            step = latest.step_number,
            status = %latest.status,
            delegated = delegated_by.is_some(),
            "Starting run"
        );

        let emitter = EventEmitter::with_listeners(listeners.clone());
        let mut machine = StateMachine::new(
            self,
            expert,
            &setting,
            &emitter,
            &listeners,
            &cancellation,
            latest,
            job,
        );
        machine.drive().await
    }

    /// Tool definitions offered to `expert`'s model
    pub fn tool_definitions(&self, expert: &Expert) -> Vec<ToolDefinition> {
        let mut tools = self.deps.experts.tool_definitions_for(expert);
        for skill in expert.skills.values().filter(|s| s.tools.is_empty()) {
            if let Some(manager) = self.deps.skills.get(&skill.name) {
                tools.extend(manager.tool_definitions());
            }
        }
        tools
    }

    async fn open_job(&self, setting: &RunSetting) -> RuntimeResult<Job> {
        match self.deps.store.retrieve_job(&setting.job_id).await? {
            Some(job) if job.is_finished() => Err(RuntimeError::JobAlreadyFinished {
                job_id: job.id,
                status: job.status,
            }),
            Some(job) => Ok(job),
            None => {
                let job = Job::start(
                    setting.job_id.clone(),
                    setting.expert_key.clone(),
                    Some(setting.max_steps),
                );
                self.deps.store.store_job(&job).await?;
                tracing::info!(job_id = %job.id, expert = %job.coordinator_expert_key, "Job started");
                Ok(job)
            }
        }
    }

    async fn start_run(
        &self,
        setting: &RunSetting,
        expert: &Expert,
        delegated_by: Option<DelegatedBy>,
    ) -> RuntimeResult<Checkpoint> {
        let RunInput::Query { text } = &setting.input else {
            return Err(RuntimeError::invalid_resume("a new run needs a query input"));
        };
        let checkpoint = create_initial_checkpoint(
            setting.job_id.clone(),
            setting.run_id.clone(),
            expert,
            vec![
                Message::instruction(expert.instruction.clone()),
                Message::user(text.clone()),
            ],
        )
        .with_delegated_by(delegated_by);
        self.deps.store.store_checkpoint(&checkpoint).await?;
        Ok(checkpoint)
    }
}

/// Move a checkpoint from another run onto the setting's run
pub(crate) fn rebase(
    mut checkpoint: Checkpoint,
    setting: &RunSetting,
    delegated_by: Option<DelegatedBy>,
) -> Checkpoint {
    if checkpoint.job_id != setting.job_id || checkpoint.run_id != setting.run_id {
        checkpoint.job_id = setting.job_id.clone();
        checkpoint.run_id = setting.run_id.clone();
        checkpoint.delegated_by = delegated_by;
    }
    checkpoint
}

/// Launches the sub-runs of one delegation halt under the parent's job,
/// limits and listeners.
///
/// A sub-run already recorded for the same halt and call is reused: a
/// finished one returns its checkpoint, an interrupted one continues under
/// its run id.
pub(crate) struct SubRunContext<'a> {
    runtime: &'a ExpertRuntime,
    parent: &'a RunSetting,
    parent_step: u32,
    listeners: &'a [Arc<dyn EventListener>],
    cancellation: &'a CancellationToken,
}

impl<'a> SubRunContext<'a> {
    pub(crate) fn new(
        runtime: &'a ExpertRuntime,
        parent: &'a RunSetting,
        parent_step: u32,
        listeners: &'a [Arc<dyn EventListener>],
        cancellation: &'a CancellationToken,
    ) -> Self {
        Self {
            runtime,
            parent,
            parent_step,
            listeners,
            cancellation,
        }
    }

    /// Latest checkpoint of the sub-run already launched for this call
    async fn previous_sub_run(
        &self,
        delegated_by: &DelegatedBy,
    ) -> RuntimeResult<Option<Checkpoint>> {
        let checkpoints = self
            .runtime
            .deps
            .store
            .list_checkpoints_by_job(&self.parent.job_id)
            .await?;
        Ok(checkpoints
            .into_iter()
            .filter(|cp| cp.delegated_by.as_ref() == Some(delegated_by))
            .max_by_key(|cp| cp.step_number))
    }
}

#[async_trait]
impl SubRunLauncher for SubRunContext<'_> {
    async fn launch(&self, target: &DelegationTarget) -> Result<SubRunOutcome, ExecutorError> {
        let delegated_by = DelegatedBy {
            parent_run_id: self.parent.run_id.clone(),
            parent_expert_key: self.parent.expert_key.clone(),
            parent_step_number: self.parent_step,
            tool_call_id: target.tool_call_id.clone(),
        };
        let previous = match self.previous_sub_run(&delegated_by).await {
            Ok(previous) => previous,
            Err(err) => {
                tracing::warn!(expert = %target.expert_key, "Sub-run lookup failed: {}", err);
                return Ok(SubRunOutcome::Failed(err.to_string()));
            }
        };
        let run_id = match previous {
            Some(checkpoint)
                if checkpoint.status.is_terminal()
                    && checkpoint.status != CheckpointStatus::StoppedByDelegate =>
            {
                tracing::info!(
                    job_id = %self.parent.job_id,
                    run_id = %checkpoint.run_id,
                    expert = %target.expert_key,
                    status = %checkpoint.status,
                    "Reusing finished sub-run"
                );
                return Ok(SubRunOutcome::Finished(Box::new(checkpoint)));
            }
            Some(checkpoint) => checkpoint.run_id,
            None => Uuid::new_v4().to_string(),
        };

        let setting = RunSetting::new(
            self.parent.job_id.clone(),
            run_id,
            target.expert_key.clone(),
            self.parent.model.clone(),
            RunInput::query(target.query.clone()),
        )
        .with_max_steps(self.parent.max_steps)
        .with_max_retries(self.parent.max_retries)
        .with_timeout(self.parent.timeout_duration());

        tracing::info!(
            job_id = %setting.job_id,
            parent_run_id = %self.parent.run_id,
            run_id = %setting.run_id,
            expert = %target.expert_key,
            "Launching sub-run"
        );

        let request = RunRequest {
            setting,
            checkpoint: None,
            delegated_by: Some(delegated_by),
            listeners: self.listeners.to_vec(),
            cancellation: self.cancellation.clone(),
        };
        match self.runtime.execute(request).await {
            Ok(checkpoint) => Ok(SubRunOutcome::Finished(Box::new(checkpoint))),
            Err(RuntimeError::Cancelled) => Err(ExecutorError::Cancelled),
            Err(err) => {
                tracing::warn!(expert = %target.expert_key, "Sub-run failed: {}", err);
                Ok(SubRunOutcome::Failed(err.to_string()))
            }
        }
    }
}
