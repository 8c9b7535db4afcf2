//! External agent CLI backends.
//!
//! An external backend runs one query per process: the converted expert and
//! the query are written to the CLI's stdin as JSON, and its stdout becomes
//! the expert's final answer. Each run is recorded as a one-step checkpoint
//! chain so it can be listed and continued like a native run.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::error::{AdapterError, AdapterResult, PrerequisiteError};
use super::registry::AdapterRegistry;
use super::traits::RuntimeAdapter;
use crate::checkpoint::{
    create_initial_checkpoint, create_next_step_checkpoint, Checkpoint, CheckpointStatus, RunStore,
};
use crate::config::BackendConfig;
use crate::events::{EventCollector, EventEmitter, StoreEventListener};
use crate::model::{
    Expert, ExpertCatalog, Job, JobStatus, Message, PendingEvent, RunEventKind, RunInput,
    RunSetting,
};
use crate::orchestration::runtime::rebase;
use crate::orchestration::{RunOutput, RunParams, RuntimeError, RUNTIME_VERSION};

/// Output of one CLI invocation
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub success: bool,
}

/// Runs experts through an external agent CLI
pub struct ExternalCliAdapter {
    config: BackendConfig,
    store: Arc<dyn RunStore>,
    experts: Arc<ExpertCatalog>,
}

impl ExternalCliAdapter {
    pub fn new(config: BackendConfig, store: Arc<dyn RunStore>, experts: Arc<ExpertCatalog>) -> Self {
        Self {
            config,
            store,
            experts,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Execute the CLI with timeout.
    ///
    /// # Arguments
    /// * `args` - Arguments passed after the executable.
    /// * `input` - Written to stdin, which is closed afterwards.
    pub async fn execute(&self, args: &[String], input: Option<&str>) -> AdapterResult<CliOutput> {
        let timeout_secs = self.config.timeout_seconds;

        let mut cmd = TokioCommand::new(&self.config.command);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AdapterError::execution(
                &self.config.name,
                format!("Failed to start {}: {}", self.config.command, e),
            )
        })?;

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await.map_err(|e| {
                AdapterError::execution(&self.config.name, format!("Failed to write stdin: {}", e))
            })?;
        }

        match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CliOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                return_code: output.status.code().unwrap_or(-1),
                success: output.status.success(),
            }),
            Ok(Err(e)) => Err(AdapterError::execution(
                &self.config.name,
                format!("Failed to execute command: {}", e),
            )),
            Err(_) => Ok(CliOutput {
                stdout: String::new(),
                stderr: format!("Command timed out after {} seconds", timeout_secs),
                return_code: -1,
                success: false,
            }),
        }
    }

    async fn check_version(&self, minimum: &str) -> Result<(), PrerequisiteError> {
        let help_url = self.config.help_url.clone();
        let required = parse_version(minimum).ok_or_else(|| {
            PrerequisiteError::version_mismatch(format!("Invalid minimum version '{}'", minimum))
        })?;

        let output = self
            .execute(&self.config.version_args, None)
            .await
            .map_err(|e| PrerequisiteError::version_mismatch(e.to_string()))?;
        let text = format!("{}\n{}", output.stdout, output.stderr);
        let found = parse_version(&text).ok_or_else(|| {
            PrerequisiteError::version_mismatch(format!(
                "Could not read the version of {}",
                self.config.command
            ))
            .with_help_url(help_url.clone())
        })?;

        if found < required {
            return Err(PrerequisiteError::version_mismatch(format!(
                "{} {}.{}.{} is older than the required {}",
                self.config.command, found.0, found.1, found.2, minimum
            ))
            .with_help_url(help_url));
        }
        Ok(())
    }

    async fn emit(&self, emitter: &EventEmitter, setting: &RunSetting, step: u32, kind: RunEventKind) {
        let pending = PendingEvent::new(
            setting.job_id.clone(),
            setting.run_id.clone(),
            setting.expert_key.clone(),
            step,
            kind,
        );
        if let Err(err) = emitter.emit(pending).await {
            tracing::warn!(backend = %self.config.name, run_id = %setting.run_id, "{}", err);
        }
    }

    async fn open_job(&self, setting: &RunSetting) -> AdapterResult<Job> {
        match self.store.retrieve_job(&setting.job_id).await? {
            Some(job) if job.is_finished() => Err(RuntimeError::JobAlreadyFinished {
                job_id: job.id,
                status: job.status,
            }
            .into()),
            Some(job) => Ok(job),
            None => {
                let job = Job::start(
                    setting.job_id.clone(),
                    setting.expert_key.clone(),
                    Some(setting.max_steps),
                );
                self.store.store_job(&job).await?;
                Ok(job)
            }
        }
    }

    /// Checkpoint the run continues from, and the messages the step carries
    async fn seed(
        &self,
        setting: &RunSetting,
        expert: &Expert,
        query: &str,
        checkpoint: Option<Checkpoint>,
    ) -> AdapterResult<(Checkpoint, Vec<Message>)> {
        let source = match checkpoint {
            Some(checkpoint) => Some(checkpoint),
            None => {
                self.store
                    .retrieve_latest_checkpoint(&setting.job_id, &setting.run_id)
                    .await?
            }
        };
        match source {
            Some(checkpoint) => Ok((
                rebase(checkpoint, setting, None),
                vec![Message::user(query.to_string())],
            )),
            None => {
                let checkpoint = create_initial_checkpoint(
                    setting.job_id.clone(),
                    setting.run_id.clone(),
                    expert,
                    vec![
                        Message::instruction(expert.instruction.clone()),
                        Message::user(query.to_string()),
                    ],
                );
                self.store.store_checkpoint(&checkpoint).await?;
                Ok((checkpoint, Vec::new()))
            }
        }
    }
}

#[async_trait]
impl RuntimeAdapter for ExternalCliAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn check_prerequisites(&self) -> Result<(), PrerequisiteError> {
        let help_url = self.config.help_url.clone();
        tracing::info!(backend = %self.config.name, command = %self.config.command, "Checking prerequisites");

        if find_executable(&self.config.command).is_none() {
            return Err(PrerequisiteError::cli_not_found(format!(
                "'{}' was not found on PATH",
                self.config.command
            ))
            .with_help_url(help_url));
        }

        if let Some(var) = &self.config.auth_env {
            let present = std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false);
            if !present {
                return Err(PrerequisiteError::auth_missing(format!(
                    "Environment variable {} is not set",
                    var
                ))
                .with_help_url(help_url));
            }
        }

        if let Some(minimum) = &self.config.min_version {
            self.check_version(minimum).await?;
        }
        Ok(())
    }

    fn convert_expert(&self, expert: &Expert) -> AdapterResult<Value> {
        let tools: Vec<String> = expert
            .skill_tool_definitions()
            .into_iter()
            .map(|t| format!("{}.{}", t.skill_name, t.name))
            .collect();
        Ok(json!({
            "name": expert.name,
            "description": expert.description,
            "systemPrompt": expert.instruction,
            "allowedTools": tools,
        }))
    }

    async fn run(&self, params: RunParams) -> AdapterResult<RunOutput> {
        let RunParams {
            setting,
            checkpoint,
            event_listener,
            cancellation,
        } = params;
        let backend = self.config.name.clone();

        let RunInput::Query { text: query } = &setting.input else {
            return Err(AdapterError::execution(
                &backend,
                "external backends only accept query inputs",
            ));
        };
        let expert = self
            .experts
            .get(&setting.expert_key)
            .ok_or_else(|| RuntimeError::UnknownExpert(setting.expert_key.clone()))?;
        if cancellation.is_cancelled() {
            return Err(RuntimeError::Cancelled.into());
        }

        let mut job = self.open_job(&setting).await?;
        self.store.store_run_setting(&setting).await?;

        let collector = EventCollector::new();
        let mut emitter = EventEmitter::new();
        emitter.subscribe(Arc::new(StoreEventListener::new(self.store.clone())));
        emitter.subscribe(Arc::new(collector.clone()));
        if let Some(listener) = event_listener {
            emitter.subscribe(listener);
        }

        let (base, mut carried) = self.seed(&setting, expert, query, checkpoint).await?;
        let step = base.step_number + 1;
        self.emit(
            &emitter,
            &setting,
            step,
            RunEventKind::RuntimeInit {
                runtime_version: RUNTIME_VERSION.to_string(),
                expert_name: expert.name.clone(),
                model: setting.model.clone(),
                max_steps: setting.max_steps,
                query: Some(query.clone()),
            },
        )
        .await;

        let payload = json!({
            "expert": self.convert_expert(expert)?,
            "model": setting.model,
            "query": query,
        });
        tracing::info!(backend = %backend, run_id = %setting.run_id, step, "Running external CLI");
        let outcome = match self
            .execute(&self.config.args, Some(&payload.to_string()))
            .await
        {
            Ok(output) if output.success => Ok(output.stdout.trim().to_string()),
            Ok(output) => Err(format!(
                "{} exited with code {}: {}",
                self.config.command,
                output.return_code,
                output.stderr.trim()
            )),
            Err(err) => Err(err.to_string()),
        };

        let usage = base.usage;
        let (checkpoint, job_status, kind) = match outcome {
            Ok(text) => {
                carried.push(Message::expert(text.clone(), Vec::new()));
                let checkpoint = create_next_step_checkpoint(&base, carried)
                    .with_status(CheckpointStatus::Completed)
                    .with_usage(usage);
                self.store.store_checkpoint(&checkpoint).await?;
                (
                    checkpoint,
                    JobStatus::Completed,
                    RunEventKind::CompleteRun { text, usage },
                )
            }
            Err(error) => {
                tracing::error!(backend = %backend, run_id = %setting.run_id, "{}", error);
                let checkpoint = if carried.is_empty() {
                    base.with_status(CheckpointStatus::StoppedByError)
                        .with_error(error.clone())
                } else {
                    let checkpoint = create_next_step_checkpoint(&base, carried)
                        .with_status(CheckpointStatus::StoppedByError)
                        .with_usage(usage)
                        .with_error(error.clone());
                    self.store.store_checkpoint(&checkpoint).await?;
                    checkpoint
                };
                (
                    checkpoint,
                    JobStatus::StoppedByError,
                    RunEventKind::StopRunByError { error },
                )
            }
        };

        job.record_progress(checkpoint.step_number, checkpoint.usage)
            .map_err(RuntimeError::from)?;
        job.finish(job_status).map_err(RuntimeError::from)?;
        self.store.store_job(&job).await?;
        self.emit(&emitter, &setting, checkpoint.step_number, kind).await;

        Ok(RunOutput {
            checkpoint,
            events: collector.events(),
        })
    }
}

/// Register one external backend
pub fn register(
    registry: &mut AdapterRegistry,
    config: BackendConfig,
    store: Arc<dyn RunStore>,
    experts: Arc<ExpertCatalog>,
) -> AdapterResult<()> {
    let name = config.name.clone();
    registry.register(name, move || {
        Arc::new(ExternalCliAdapter::new(
            config.clone(),
            store.clone(),
            experts.clone(),
        )) as Arc<dyn RuntimeAdapter>
    })
}

/// Locate an executable by path or on `PATH`
pub fn find_executable(command: &str) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}

/// First `major.minor[.patch]` found in `text`
pub fn parse_version(text: &str) -> Option<(u64, u64, u64)> {
    let re = Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").ok()?;
    let caps = re.captures(text)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some((part(1), part(2), part(3)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("other-cli 1.4.2 (build 77)"), Some((1, 4, 2)));
        assert_eq!(parse_version("v2.0"), Some((2, 0, 0)));
        assert_eq!(parse_version("no version here"), None);
        assert!(parse_version("1.10.0") > parse_version("1.9.9"));
    }

    #[test]
    fn test_find_executable() {
        assert!(find_executable("definitely-not-a-real-binary-erk").is_none());
        assert!(find_executable("/definitely/not/here").is_none());
    }

    #[test]
    fn test_convert_expert_lists_tools() {
        use crate::checkpoint::InMemoryRunStore;
        use crate::model::{Skill, SkillTool};

        let config = BackendConfig {
            name: "other-cli".to_string(),
            command: "other".to_string(),
            args: vec![],
            auth_env: None,
            min_version: None,
            version_args: vec!["--version".to_string()],
            timeout_seconds: 5,
            help_url: None,
        };
        let adapter = ExternalCliAdapter::new(
            config,
            Arc::new(InMemoryRunStore::new()),
            Arc::new(ExpertCatalog::new()),
        );
        let expert = Expert::new("main", "Main", "Be brief")
            .with_skill(Skill::remote("math", vec![SkillTool::new("add", "Add")]));

        let value = adapter.convert_expert(&expert).unwrap();
        assert_eq!(value["systemPrompt"], "Be brief");
        assert_eq!(value["allowedTools"][0], "math.add");
    }
}
