//! Expert definitions and the catalog the runtime resolves them from.

use super::tool::{default_input_schema, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// How the tools of a skill are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SkillKind {
    /// Executed by a skill manager (MCP server, in-process tool, ...)
    #[default]
    Remote,
    /// Requires input from outside the runtime, halting the run
    Interactive,
}

/// Tool entry inside a skill definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: Value,
}

/// A named bundle of tools bound to an expert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: SkillKind,
    #[serde(default)]
    pub tools: Vec<SkillTool>,
}

impl Skill {
    pub fn remote(name: impl Into<String>, tools: Vec<SkillTool>) -> Self {
        Self {
            name: name.into(),
            kind: SkillKind::Remote,
            tools,
        }
    }

    pub fn interactive(name: impl Into<String>, tools: Vec<SkillTool>) -> Self {
        Self {
            name: name.into(),
            kind: SkillKind::Interactive,
            tools,
        }
    }
}

impl SkillTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: default_input_schema(),
        }
    }
}

/// An agent definition: instruction plus bound skills and delegates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expert {
    #[serde(default)]
    pub key: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub instruction: String,
    #[serde(default)]
    pub skills: BTreeMap<String, Skill>,
    /// Keys of experts this expert may delegate to
    #[serde(default)]
    pub delegates: Vec<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl Expert {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            version: default_version(),
            description: String::new(),
            instruction: instruction.into(),
            skills: BTreeMap::new(),
            delegates: Vec::new(),
        }
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.insert(skill.name.clone(), skill);
        self
    }

    pub fn with_delegate(mut self, expert_key: impl Into<String>) -> Self {
        self.delegates.push(expert_key.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_delegate(&self, skill_name: &str) -> bool {
        self.delegates.iter().any(|d| d == skill_name)
    }

    pub fn skill(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    /// Tool definitions of the expert's own skills
    pub fn skill_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.skills
            .values()
            .flat_map(|skill| {
                skill.tools.iter().map(move |tool| {
                    ToolDefinition::new(
                        skill.name.clone(),
                        tool.name.clone(),
                        tool.description.clone(),
                        tool.input_schema.clone(),
                    )
                })
            })
            .collect()
    }
}

/// Experts addressable by key
#[derive(Debug, Clone, Default)]
pub struct ExpertCatalog {
    experts: BTreeMap<String, Expert>,
}

impl ExpertCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an expert, replacing any previous one with the same key
    pub fn insert(&mut self, expert: Expert) -> Option<Expert> {
        self.experts.insert(expert.key.clone(), expert)
    }

    pub fn get(&self, key: &str) -> Option<&Expert> {
        self.experts.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.experts.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }

    /// Everything `expert` can call: its skills' tools plus one tool per delegate.
    pub fn tool_definitions_for(&self, expert: &Expert) -> Vec<ToolDefinition> {
        let mut tools = expert.skill_tool_definitions();
        for key in &expert.delegates {
            let description = self
                .get(key)
                .map(|d| d.description.clone())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| format!("Delegate a task to the {} expert", key));
            tools.push(ToolDefinition::new(
                key.clone(),
                key.clone(),
                description,
                json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Task for the delegate" }
                    },
                    "required": ["query"]
                }),
            ));
        }
        tools
    }
}

impl FromIterator<Expert> for ExpertCatalog {
    fn from_iter<T: IntoIterator<Item = Expert>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for expert in iter {
            catalog.insert(expert);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> Expert {
        Expert::new("coordinator", "Coordinator", "Coordinate work")
            .with_skill(Skill::remote("fs", vec![SkillTool::new("read", "Read a file")]))
            .with_skill(Skill::interactive("ask", vec![SkillTool::new("confirm", "Ask the user")]))
            .with_delegate("researcher")
    }

    #[test]
    fn test_delegate_lookup() {
        let expert = coordinator();
        assert!(expert.is_delegate("researcher"));
        assert!(!expert.is_delegate("fs"));
        assert_eq!(expert.skill("ask").map(|s| s.kind), Some(SkillKind::Interactive));
    }

    #[test]
    fn test_tool_definitions_include_delegates() {
        let catalog: ExpertCatalog = vec![
            coordinator(),
            Expert::new("researcher", "Researcher", "Research").with_description("Finds facts"),
        ]
        .into_iter()
        .collect();

        let expert = catalog.get("coordinator").unwrap();
        let tools = catalog.tool_definitions_for(expert);
        assert_eq!(tools.len(), 3);

        let delegate = tools.iter().find(|t| t.skill_name == "researcher").unwrap();
        assert_eq!(delegate.description, "Finds facts");
        assert_eq!(delegate.input_schema["required"][0], "query");
    }

    #[test]
    fn test_expert_from_toml() {
        let expert: Expert = toml::from_str(
            r#"
name = "Writer"
instruction = "Write things"
delegates = ["editor"]

[skills.fs]
kind = "remote"
tools = [{ name = "write", description = "Write a file" }]
"#,
        )
        .unwrap();
        assert_eq!(expert.version, "0.1.0");
        assert_eq!(expert.skills["fs"].tools[0].name, "write");
        assert_eq!(expert.skills["fs"].tools[0].input_schema["type"], "object");
        assert!(expert.is_delegate("editor"));
    }
}
