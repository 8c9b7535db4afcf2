//! Skill managers: the runtime-side handles that execute a skill's tools.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::SkillError;
use crate::model::{ContentPart, ToolCall, ToolDefinition};

/// Executes the tools of one skill
#[async_trait]
pub trait SkillManager: Send + Sync {
    /// Skill name this manager serves
    fn name(&self) -> &str;

    /// Tools the manager exposes, used when the expert declares none
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn call_tool(&self, call: &ToolCall) -> Result<Vec<ContentPart>, SkillError>;
}

/// Skill managers addressable by skill name
#[derive(Clone, Default)]
pub struct SkillManagers {
    managers: BTreeMap<String, Arc<dyn SkillManager>>,
}

impl SkillManagers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manager under its own name, replacing any previous one
    pub fn register(&mut self, manager: Arc<dyn SkillManager>) {
        self.managers.insert(manager.name().to_string(), manager);
    }

    pub fn with(mut self, manager: Arc<dyn SkillManager>) -> Self {
        self.register(manager);
        self
    }

    pub fn get(&self, skill_name: &str) -> Option<&Arc<dyn SkillManager>> {
        self.managers.get(skill_name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.managers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

impl std::fmt::Debug for SkillManagers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.managers.keys()).finish()
    }
}
