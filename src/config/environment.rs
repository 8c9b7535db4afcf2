//! Environment variable loading and management.
//!
//! Only host-level overrides live here. Provider credentials are read by the
//! provider bindings themselves.

use std::env;
use std::path::Path;

use super::config::Configuration;

/// Backend selected for new runs
pub const ENV_BACKEND: &str = "ERK_BACKEND";
/// Model used in new run settings
pub const ENV_MODEL: &str = "ERK_MODEL";
/// Log level passed to the tracing subscriber
pub const ENV_LOG_LEVEL: &str = "ERK_LOG_LEVEL";

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to a .env file. Nothing is loaded when None.
    pub fn new(env_file: Option<&Path>) -> Self {
        // Only an explicit .env is loaded, so tests never pick up a stray one
        if let Some(path) = env_file.filter(|p| p.exists()) {
            if let Err(e) = dotenv::from_path(path) {
                tracing::warn!("Failed to load .env file {}: {}", path.display(), e);
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    pub fn backend(&self) -> Option<String> {
        non_empty_var(ENV_BACKEND)
    }

    pub fn model(&self) -> Option<String> {
        non_empty_var(ENV_MODEL)
    }

    pub fn log_level(&self) -> Option<String> {
        non_empty_var(ENV_LOG_LEVEL)
    }

    /// Apply the environment overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut Configuration) {
        if let Some(backend) = self.backend() {
            config.runtime.default_backend = backend;
        }
        if let Some(model) = self.model() {
            config.runtime.default_model = model;
        }
        if let Some(level) = self.log_level() {
            config.logging.log_level = level;
        }
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test touches the process environment so the cases cannot race
    #[test]
    fn test_overrides_from_env_file() {
        env::remove_var(ENV_BACKEND);
        env::remove_var(ENV_MODEL);
        env::remove_var(ENV_LOG_LEVEL);

        let env_loader = EnvironmentLoader::default();
        assert!(env_loader.env_file().is_none());
        assert_eq!(env_loader.backend(), None);

        let dir = tempfile::TempDir::new().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(&env_path, "ERK_BACKEND=other-cli\nERK_MODEL=big-model\n").unwrap();

        let env_loader = EnvironmentLoader::new(Some(&env_path));
        let mut config = Configuration::default();
        env_loader.apply_overrides(&mut config);
        assert_eq!(config.runtime.default_backend, "other-cli");
        assert_eq!(config.runtime.default_model, "big-model");
        assert_eq!(config.logging.log_level, "info");

        env::remove_var(ENV_BACKEND);
        env::remove_var(ENV_MODEL);
    }
}
