//! Native backend: the in-process state machine.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::{AdapterError, AdapterResult, PrerequisiteError};
use super::registry::AdapterRegistry;
use super::traits::RuntimeAdapter;
use crate::model::Expert;
use crate::orchestration::{ExpertRuntime, RunOutput, RunParams};

/// Registry name of the native backend
pub const NATIVE_BACKEND: &str = "native";

/// Runs experts on [`ExpertRuntime`]
#[derive(Clone)]
pub struct NativeAdapter {
    runtime: Arc<ExpertRuntime>,
}

impl NativeAdapter {
    pub fn new(runtime: Arc<ExpertRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &ExpertRuntime {
        &self.runtime
    }
}

#[async_trait]
impl RuntimeAdapter for NativeAdapter {
    fn name(&self) -> &str {
        NATIVE_BACKEND
    }

    async fn check_prerequisites(&self) -> Result<(), PrerequisiteError> {
        Ok(())
    }

    fn convert_expert(&self, expert: &Expert) -> AdapterResult<Value> {
        let tools = serde_json::to_value(self.runtime.tool_definitions(expert))
            .map_err(|e| AdapterError::execution(NATIVE_BACKEND, e.to_string()))?;
        Ok(json!({
            "key": expert.key,
            "name": expert.name,
            "version": expert.version,
            "instruction": expert.instruction,
            "delegates": expert.delegates,
            "tools": tools,
        }))
    }

    async fn run(&self, params: RunParams) -> AdapterResult<RunOutput> {
        Ok(self.runtime.run(params).await?)
    }
}

/// Register the native backend
pub fn register(registry: &mut AdapterRegistry, runtime: Arc<ExpertRuntime>) -> AdapterResult<()> {
    registry.register(NATIVE_BACKEND, move || {
        Arc::new(NativeAdapter::new(runtime.clone())) as Arc<dyn RuntimeAdapter>
    })
}
