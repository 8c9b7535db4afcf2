//! TOML configuration parsing and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::checkpoint::{RunStore, RunStoreBuilder};
use crate::model::{
    Expert, ExpertCatalog, RunInput, RunSetting, DEFAULT_MAX_RETRIES, DEFAULT_MAX_STEPS,
    DEFAULT_TIMEOUT_MS,
};
use crate::orchestration::{RuntimeConfig, ToolExecutionMode};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// External CLI backends registered next to the native runtime
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Expert catalog, keyed by expert key
    #[serde(default)]
    pub experts: BTreeMap<String, Expert>,
}

/// `[runtime]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSection {
    #[serde(default = "default_backend")]
    pub default_backend: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Run remote tool calls of one batch concurrently
    #[serde(default)]
    pub parallel_tool_calls: bool,
    #[serde(default)]
    pub stream: bool,
}

fn default_backend() -> String {
    "native".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_MS / 1000
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            default_model: default_model(),
            max_steps: default_max_steps(),
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            parallel_tool_calls: false,
            stream: false,
        }
    }
}

/// `[storage]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "file" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Root of the file store; `~` and `$VARS` are expanded
    #[serde(default)]
    pub base_path: Option<String>,
}

fn default_storage_backend() -> String {
    "file".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            base_path: None,
        }
    }
}

impl StorageConfig {
    /// Expanded base path, `~/.erk/store` when unset
    pub fn resolved_base_path(&self) -> Result<PathBuf> {
        match &self.base_path {
            Some(path) => {
                let expanded = shellexpand::full(path)
                    .with_context(|| format!("Failed to expand storage path: {}", path))?;
                Ok(PathBuf::from(expanded.as_ref()))
            }
            None => dirs::home_dir()
                .map(|home| home.join(".erk").join("store"))
                .context("Could not determine home directory for the default store"),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for markdown transcripts of native runs; `~` is expanded.
    /// None are written when unset.
    #[serde(default)]
    pub run_log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            run_log_dir: None,
        }
    }
}

/// One `[[backends]]` entry: an external agent CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    /// Executable name or path
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variable that must hold the CLI's credentials
    #[serde(default)]
    pub auth_env: Option<String>,
    /// Lowest accepted version, e.g. "1.2" or "1.2.3"
    #[serde(default)]
    pub min_version: Option<String>,
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    #[serde(default = "default_backend_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub help_url: Option<String>,
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_backend_timeout() -> u64 {
    600
}

impl Configuration {
    /// Runtime behaviour from the `[runtime]` section
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            stream: self.runtime.stream,
            tool_execution: if self.runtime.parallel_tool_calls {
                ToolExecutionMode::Parallel
            } else {
                ToolExecutionMode::Sequential
            },
            run_log_dir: self
                .logging
                .run_log_dir
                .as_deref()
                .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref())),
            ..RuntimeConfig::default()
        }
    }

    /// Build a run setting with the configured model and limits
    pub fn run_setting(
        &self,
        job_id: impl Into<String>,
        run_id: impl Into<String>,
        expert_key: impl Into<String>,
        input: RunInput,
    ) -> RunSetting {
        RunSetting::new(
            job_id,
            run_id,
            expert_key,
            self.runtime.default_model.clone(),
            input,
        )
        .with_max_steps(self.runtime.max_steps)
        .with_max_retries(self.runtime.max_retries)
        .with_timeout(Duration::from_secs(self.runtime.timeout_seconds))
    }

    pub fn expert_catalog(&self) -> ExpertCatalog {
        self.experts.values().cloned().collect()
    }

    /// Open the configured run store
    pub fn open_store(&self) -> Result<Arc<dyn RunStore>> {
        let mut builder = RunStoreBuilder::new(&self.storage.backend);
        if self.storage.backend != "memory" {
            builder = builder.with_base_path(self.storage.resolved_base_path()?);
        }
        builder
            .build()
            .with_context(|| format!("Failed to open {} store", self.storage.backend))
    }

    /// Fill expert keys and skill names from their table keys
    fn normalize(&mut self) {
        for (key, expert) in self.experts.iter_mut() {
            if expert.key.is_empty() {
                expert.key = key.clone();
            }
            if expert.name.is_empty() {
                expert.name = key.clone();
            }
            for (skill_name, skill) in expert.skills.iter_mut() {
                if skill.name.is_empty() {
                    skill.name = skill_name.clone();
                }
            }
        }
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    pub config_path: PathBuf,
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None, uses `config/erk.toml`
    ///   and falls back to the defaults when that file does not exist.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/erk.toml"));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Configuration::default()
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(mut config: Configuration) -> Self {
        config.normalize();
        Self {
            config_path: PathBuf::from("config/erk.toml"),
            config,
        }
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Configuration> {
        let mut config: Configuration = toml::from_str(content)?;
        config.normalize();
        Ok(config)
    }
}
