//! Runtime adapter contract.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::error::{AdapterResult, PrerequisiteError};
use crate::model::Expert;
use crate::orchestration::{RunOutput, RunParams};

/// A backend able to run experts
///
/// The native state machine and external agent CLIs satisfy the same
/// contract, so callers pick a backend by name and run it the same way.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Backend name used for registry lookup
    fn name(&self) -> &str;

    /// Check that the backend can run here, before any run is attempted
    async fn check_prerequisites(&self) -> Result<(), PrerequisiteError>;

    /// Backend-specific representation of an expert
    fn convert_expert(&self, expert: &Expert) -> AdapterResult<Value>;

    /// Run until the run completes or stops
    async fn run(&self, params: RunParams) -> AdapterResult<RunOutput>;
}

/// Produces an adapter for a registered backend
pub type AdapterFactory = Arc<dyn Fn() -> Arc<dyn RuntimeAdapter> + Send + Sync>;
