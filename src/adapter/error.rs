//! Error types for runtime adapters.

use serde::Serialize;
use thiserror::Error;

use crate::checkpoint::StorageError;
use crate::orchestration::RuntimeError;

/// Why a backend cannot run on this machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrerequisiteKind {
    CliNotFound,
    AuthMissing,
    VersionMismatch,
}

impl std::fmt::Display for PrerequisiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PrerequisiteKind::CliNotFound => "cli-not-found",
            PrerequisiteKind::AuthMissing => "auth-missing",
            PrerequisiteKind::VersionMismatch => "version-mismatch",
        };
        write!(f, "{}", s)
    }
}

/// A failed prerequisite check. Fatal for that backend only.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct PrerequisiteError {
    #[serde(rename = "type")]
    pub kind: PrerequisiteKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
}

impl PrerequisiteError {
    pub fn new(kind: PrerequisiteKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            help_url: None,
        }
    }

    pub fn cli_not_found(message: impl Into<String>) -> Self {
        Self::new(PrerequisiteKind::CliNotFound, message)
    }

    pub fn auth_missing(message: impl Into<String>) -> Self {
        Self::new(PrerequisiteKind::AuthMissing, message)
    }

    pub fn version_mismatch(message: impl Into<String>) -> Self {
        Self::new(PrerequisiteKind::VersionMismatch, message)
    }

    pub fn with_help_url(mut self, help_url: Option<String>) -> Self {
        self.help_url = help_url;
        self
    }
}

/// Errors from the adapter registry and adapters
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Unknown backend '{name}'. Available backends: {}", .available.join(", "))]
    UnknownBackend { name: String, available: Vec<String> },

    #[error("Backend '{0}' is already registered")]
    DuplicateBackend(String),

    #[error("Prerequisite check failed: {0}")]
    Prerequisite(#[from] PrerequisiteError),

    #[error("Backend '{backend}' failed: {message}")]
    Execution { backend: String, message: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AdapterError {
    pub fn execution(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend_names_available() {
        let err = AdapterError::UnknownBackend {
            name: "ghost".to_string(),
            available: vec!["native".to_string(), "other-cli".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("ghost"));
        assert!(msg.contains("native, other-cli"));
    }

    #[test]
    fn test_prerequisite_wire_shape() {
        let err = PrerequisiteError::auth_missing("OTHER_TOKEN is not set")
            .with_help_url(Some("https://example.com/auth".to_string()));
        assert_eq!(err.to_string(), "auth-missing: OTHER_TOKEN is not set");

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["type"], "auth-missing");
        assert_eq!(value["helpUrl"], "https://example.com/auth");
    }
}
