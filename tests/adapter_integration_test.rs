//! Integration tests for the backend registry
//!
//! External backends are driven through `sh`, so these tests only run on
//! unix hosts.
#![cfg(unix)]

use async_trait::async_trait;
use erk::adapter::{compose_registry, AdapterError, PrerequisiteKind, NATIVE_BACKEND};
use erk::checkpoint::{CheckpointStatus, InMemoryRunStore, RunStore};
use erk::config::{Configuration, ConfigurationLoader};
use erk::model::{JobStatus, RunInput};
use erk::orchestration::{RunParams, RuntimeDeps};
use erk::provider::{GenerateRequest, Generation, LlmProvider};
use erk::tools::SkillManagers;
use std::sync::Arc;

const CONFIG: &str = r#"
[runtime]
default_model = "test-model"
max_steps = 5

[storage]
backend = "memory"

[[backends]]
name = "echo-cli"
command = "sh"
args = ["-c", "cat >/dev/null; echo answer"]

[[backends]]
name = "broken-cli"
command = "sh"
args = ["-c", "cat >/dev/null; echo boom >&2; exit 3"]

[[backends]]
name = "ghost-cli"
command = "erk-test-no-such-binary"
help_url = "https://example.invalid/install"

[[backends]]
name = "locked-cli"
command = "sh"
auth_env = "ERK_TEST_TOKEN_THAT_IS_NEVER_SET"

[[backends]]
name = "old-cli"
command = "sh"
version_args = ["-c", "echo tool version 2.3.1"]
min_version = "3.0"

[[backends]]
name = "current-cli"
command = "sh"
version_args = ["-c", "echo tool version 2.3.1"]
min_version = "2.3"

[experts.writer]
name = "Writer"
instruction = "Write short answers"

[experts.writer.skills.files]
tools = [{ name = "read", description = "Read a file" }]
"#;

struct FixedProvider;

#[async_trait]
impl LlmProvider for FixedProvider {
    async fn generate(&self, _request: &GenerateRequest) -> anyhow::Result<Generation> {
        Ok(Generation::text("native answer"))
    }

    fn provider_name(&self) -> &str {
        "fixed"
    }
}

fn setup() -> (Configuration, Arc<InMemoryRunStore>, erk::adapter::AdapterRegistry) {
    let config = ConfigurationLoader::parse(CONFIG).unwrap();
    let store = Arc::new(InMemoryRunStore::new());
    let deps = RuntimeDeps {
        provider: Arc::new(FixedProvider),
        store: store.clone(),
        experts: Arc::new(config.expert_catalog()),
        skills: SkillManagers::new(),
    };
    let registry = compose_registry(&config, deps).unwrap();
    (config, store, registry)
}

#[test]
fn test_registry_lists_every_backend() {
    let (_, _, registry) = setup();
    assert_eq!(registry.len(), 7);
    assert!(registry.contains(NATIVE_BACKEND));
    assert!(registry.contains("echo-cli"));

    let err = registry.create("missing").err().unwrap();
    match &err {
        AdapterError::UnknownBackend { name, available } => {
            assert_eq!(name, "missing");
            assert!(available.contains(&"native".to_string()));
            assert!(available.contains(&"ghost-cli".to_string()));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("Available backends"));
}

#[test]
fn test_duplicate_backend_name_is_rejected() {
    let config = ConfigurationLoader::parse(
        r#"
[[backends]]
name = "native"
command = "sh"
"#,
    )
    .unwrap();
    let deps = RuntimeDeps {
        provider: Arc::new(FixedProvider),
        store: Arc::new(InMemoryRunStore::new()),
        experts: Arc::new(config.expert_catalog()),
        skills: SkillManagers::new(),
    };
    let err = compose_registry(&config, deps).unwrap_err();
    assert!(matches!(err, AdapterError::DuplicateBackend(name) if name == "native"));
}

#[tokio::test]
async fn test_prerequisite_failures_are_typed() {
    let (_, _, registry) = setup();

    let ghost = registry.create("ghost-cli").unwrap();
    let err = ghost.check_prerequisites().await.unwrap_err();
    assert_eq!(err.kind, PrerequisiteKind::CliNotFound);
    assert_eq!(err.help_url.as_deref(), Some("https://example.invalid/install"));

    let locked = registry.create("locked-cli").unwrap();
    let err = locked.check_prerequisites().await.unwrap_err();
    assert_eq!(err.kind, PrerequisiteKind::AuthMissing);
    assert!(err.message.contains("ERK_TEST_TOKEN_THAT_IS_NEVER_SET"));

    let old = registry.create("old-cli").unwrap();
    let err = old.check_prerequisites().await.unwrap_err();
    assert_eq!(err.kind, PrerequisiteKind::VersionMismatch);
    assert!(err.message.contains("2.3.1"));

    let current = registry.create("current-cli").unwrap();
    assert!(current.check_prerequisites().await.is_ok());

    let native = registry.create(NATIVE_BACKEND).unwrap();
    assert!(native.check_prerequisites().await.is_ok());
}

#[tokio::test]
async fn test_native_backend_runs_expert() {
    let (config, store, registry) = setup();
    let native = registry.create(NATIVE_BACKEND).unwrap();

    let setting = config.run_setting("job", "run", "writer", RunInput::query("hi"));
    let output = native.run(RunParams::new(setting)).await.unwrap();
    assert_eq!(output.checkpoint.status, CheckpointStatus::Completed);
    assert_eq!(output.checkpoint.output_text(), Some("native answer"));

    let job = store.retrieve_job("job").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_external_backend_records_one_step() {
    let (config, store, registry) = setup();
    let adapter = registry.create("echo-cli").unwrap();

    let converted = adapter
        .convert_expert(config.expert_catalog().get("writer").unwrap())
        .unwrap();
    assert_eq!(converted["systemPrompt"], "Write short answers");
    assert_eq!(converted["allowedTools"][0], "files.read");

    let setting = config.run_setting("job", "run", "writer", RunInput::query("hi"));
    let output = adapter.run(RunParams::new(setting)).await.unwrap();

    let checkpoint = &output.checkpoint;
    assert_eq!(checkpoint.status, CheckpointStatus::Completed);
    assert_eq!(checkpoint.step_number, 1);
    assert_eq!(checkpoint.output_text(), Some("answer"));

    let kinds: Vec<&str> = output.events.iter().map(|e| e.kind.name()).collect();
    assert_eq!(kinds, vec!["runtimeInit", "completeRun"]);

    let chain = store.list_checkpoints_by_job("job").await.unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(store.list_events("job", "run").await.unwrap().len(), 2);
    let job = store.retrieve_job("job").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_external_backend_failure_stops_by_error() {
    let (config, store, registry) = setup();
    let adapter = registry.create("broken-cli").unwrap();

    let setting = config.run_setting("job", "run", "writer", RunInput::query("hi"));
    let output = adapter.run(RunParams::new(setting)).await.unwrap();

    let checkpoint = &output.checkpoint;
    assert_eq!(checkpoint.status, CheckpointStatus::StoppedByError);
    let error = checkpoint.error.as_deref().unwrap();
    assert!(error.contains("code 3"));
    assert!(error.contains("boom"));
    assert_eq!(output.events.last().unwrap().kind.name(), "stopRunByError");

    let job = store.retrieve_job("job").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::StoppedByError);
}

#[tokio::test]
async fn test_missing_cli_stops_by_error() {
    let (config, store, registry) = setup();
    let adapter = registry.create("ghost-cli").unwrap();

    let setting = config.run_setting("job", "run", "writer", RunInput::query("hi"));
    let output = adapter.run(RunParams::new(setting)).await.unwrap();

    let checkpoint = &output.checkpoint;
    assert_eq!(checkpoint.status, CheckpointStatus::StoppedByError);
    assert!(checkpoint
        .error
        .as_deref()
        .unwrap()
        .contains("Failed to start erk-test-no-such-binary"));
    assert_eq!(output.events.last().unwrap().kind.name(), "stopRunByError");
    assert_eq!(store.list_events("job", "run").await.unwrap().len(), 2);

    let job = store.retrieve_job("job").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::StoppedByError);
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn test_native_run_writes_transcript() {
    let log_dir = tempfile::TempDir::new().unwrap();
    let mut config = ConfigurationLoader::parse(CONFIG).unwrap();
    config.logging.run_log_dir = Some(log_dir.path().display().to_string());
    let deps = RuntimeDeps {
        provider: Arc::new(FixedProvider),
        store: Arc::new(InMemoryRunStore::new()),
        experts: Arc::new(config.expert_catalog()),
        skills: SkillManagers::new(),
    };
    let registry = compose_registry(&config, deps).unwrap();
    let native = registry.create(NATIVE_BACKEND).unwrap();

    let setting = config.run_setting("job", "run", "writer", RunInput::query("hi"));
    native.run(RunParams::new(setting)).await.unwrap();

    let transcript = std::fs::read_to_string(log_dir.path().join("job_run.md")).unwrap();
    assert!(transcript.starts_with("# Expert Run Log"));
    assert!(transcript.contains("### runtimeInit"));
    assert!(transcript.contains("### completeRun"));
    assert!(transcript.contains("native answer"));
}
