//! Expert Runtime Kit (ERK) - resumable expert agent runs
//!
//! ERK runs "experts": model-directed, multi-step task executions that call
//! tools, delegate sub-tasks to other experts and resume from durable
//! checkpoints.
//!
//! - **`model`** - Value records: messages, tool calls, steps, jobs, events
//! - **`checkpoint`** - Checkpoint constructors, chain rules and run stores
//! - **`events`** - Event emitter and built-in listeners
//! - **`tools`** - Tool-call classification and executors
//! - **`provider`** - The LLM capability the runtime consumes
//! - **`orchestration`** - State machine, step executor and delegation
//! - **`adapter`** - Backend registry (native runtime, external CLIs)
//! - **`config`** - TOML configuration and environment overrides
//! - **`observability`** - Tracing setup and markdown run logs
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! erk = { version = "0.1", default-features = false }
//! # Filesystem run store and external CLI backends:
//! erk = { version = "0.1", features = ["file-store", "external-cli"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use erk::prelude::*;
//! use std::sync::Arc;
//!
//! async fn example(provider: Arc<dyn LlmProvider>) -> anyhow::Result<()> {
//!     let loader = ConfigurationLoader::new(None)?;
//!     let config = &loader.config;
//!
//!     let deps = RuntimeDeps {
//!         provider,
//!         store: config.open_store()?,
//!         experts: Arc::new(config.expert_catalog()),
//!         skills: SkillManagers::new(),
//!     };
//!     let registry = compose_registry(config, deps)?;
//!     let adapter = registry.create(&config.runtime.default_backend)?;
//!     adapter.check_prerequisites().await?;
//!
//!     let setting = config.run_setting("job-1", "run-1", "coordinator", RunInput::query("Summarize the repo"));
//!     let output = adapter.run(RunParams::new(setting)).await?;
//!     println!("{:?}: {:?}", output.checkpoint.status, output.checkpoint.output_text());
//!     Ok(())
//! }
//! ```

/// Adapter registry and backends
pub mod adapter;

/// Checkpoints and the run storage contract
pub mod checkpoint;

/// Configuration management
pub mod config;

/// Run event emission
pub mod events;

/// Core data model
pub mod model;

/// Tracing setup and run transcripts
pub mod observability;

/// Run orchestration
pub mod orchestration;

/// LLM provider abstraction
pub mod provider;

/// Tool classification and execution
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{compose_registry, AdapterRegistry, RuntimeAdapter};
    pub use crate::checkpoint::{Checkpoint, CheckpointStatus, InMemoryRunStore, RunStore};
    pub use crate::config::{Configuration, ConfigurationLoader, EnvironmentLoader};
    pub use crate::events::{EventListener, EventEmitter};
    pub use crate::model::{
        Expert, ExpertCatalog, Message, RunEvent, RunEventKind, RunInput, RunSetting, Skill,
        ToolCall, ToolResult, Usage,
    };
    pub use crate::orchestration::{
        ExpertRuntime, RunOutput, RunParams, RuntimeConfig, RuntimeDeps, RuntimeError,
    };
    pub use crate::provider::{GenerateRequest, Generation, LlmProvider};
    pub use crate::tools::{SkillManager, SkillManagers};

    #[cfg(feature = "file-store")]
    pub use crate::checkpoint::FileRunStore;
}
