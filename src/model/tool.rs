//! Tool calls issued by a model and the results fed back to it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub skill_name: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    /// Create a tool call from a JSON object of arguments.
    ///
    /// Non-object argument values are wrapped under an `input` key so that
    /// the argument mapping is always an object.
    pub fn new(
        id: impl Into<String>,
        skill_name: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
    ) -> Self {
        let args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("input".to_string(), other);
                map
            }
        };
        Self {
            id: id.into(),
            skill_name: skill_name.into(),
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Look up a string argument
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}

/// One part of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentPart {
    Text { text: String },
    Failure { message: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Text carried by this part, whichever kind it is
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Failure { message } => message,
        }
    }
}

/// The outcome of a tool call, correlated to it by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub id: String,
    pub skill_name: String,
    pub tool_name: String,
    pub parts: Vec<ContentPart>,
}

impl ToolResult {
    /// Result for `call` carrying the given parts
    pub fn for_call(call: &ToolCall, parts: Vec<ContentPart>) -> Self {
        Self {
            id: call.id.clone(),
            skill_name: call.skill_name.clone(),
            tool_name: call.tool_name.clone(),
            parts,
        }
    }

    /// Successful single-text result for `call`
    pub fn text(call: &ToolCall, text: impl Into<String>) -> Self {
        Self::for_call(call, vec![ContentPart::text(text)])
    }

    /// Failure result for `call`
    pub fn failure(call: &ToolCall, message: impl Into<String>) -> Self {
        Self::for_call(call, vec![ContentPart::failure(message)])
    }

    /// Whether any part of the result is a failure payload
    pub fn is_failure(&self) -> bool {
        self.parts.iter().any(ContentPart::is_failure)
    }

    /// All parts joined as plain text
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tool schema advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub skill_name: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: Value,
}

pub(crate) fn default_input_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDefinition {
    pub fn new(
        skill_name: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            skill_name: skill_name.into(),
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}
