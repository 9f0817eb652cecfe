//! Tool call, declaration, and schema types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Reserved invocation field that turns a call into a watch (re-run until changed).
pub const WATCH_FIELD: &str = "watch";

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Invocation id assigned by the model provider.
    pub id: String,
    /// Registered tool name.
    pub name: String,
    /// JSON argument object.
    pub arguments: Value,
}

impl ToolCall {
    /// Creates a tool call with a fresh random id.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }

    /// Creates a tool call with an explicit id.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Type constraint for one declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    /// String restricted to the listed values.
    Enum(Vec<String>),
    Array,
    Object,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            ParamKind::String | ParamKind::Enum(_) => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Enum(allowed) => value
                .as_str()
                .is_some_and(|v| allowed.iter().any(|a| a == v)),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

/// Declarative parameter schema for a tool.
///
/// Built with chained [`required`](Self::required)/[`optional`](Self::optional)
/// calls and rendered to JSON Schema for the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSchema {
    params: Vec<ParamSpec>,
}

impl ToolSchema {
    /// Creates a schema with no parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required parameter.
    pub fn required(mut self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
        });
        self
    }

    /// Adds an optional parameter.
    pub fn optional(mut self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
        });
        self
    }

    /// Declared parameters in declaration order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Renders the schema as a JSON-Schema object, or `None` when there are no parameters.
    pub fn to_json_schema(&self) -> Option<Value> {
        if self.params.is_empty() {
            return None;
        }

        let mut properties = Map::new();
        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::from(param.kind.json_type()));
            prop.insert("description".into(), Value::from(param.description.clone()));
            if let ParamKind::Enum(values) = &param.kind {
                prop.insert("enum".into(), Value::from(values.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }
        properties.insert(
            WATCH_FIELD.into(),
            serde_json::json!({
                "type": "number",
                "description": "Optional. Re-run this tool every N seconds until its result changes"
            }),
        );

        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::from(p.name.clone()))
            .collect();

        Some(serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        }))
    }

    /// Checks a JSON argument object against the declared parameters.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let empty = Map::new();
        let object = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => return Err(format!("expected an object, got {other}")),
        };

        for key in object.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                return Err(format!("unknown field '{key}'"));
            }
        }

        for param in &self.params {
            match object.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(format!("missing required field '{}'", param.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.kind.accepts(value) => {
                    return Err(match &param.kind {
                        ParamKind::Enum(values) => format!(
                            "field '{}' must be one of [{}]",
                            param.name,
                            values.join(", ")
                        ),
                        kind => format!("field '{}' must be of type {}", param.name, kind.json_type()),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Tool declaration exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-Schema parameters; omitted entirely for parameterless tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    /// Creates a definition from a declarative schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: &ToolSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: schema.to_json_schema(),
        }
    }
}

/// Outcome of one tool invocation, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful result.
    pub fn success(call_id: &str, tool_name: &str, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            output: output.into(),
            is_error: false,
        }
    }

    /// Creates an error result; the output reads `Error: <message>`.
    pub fn error(call_id: &str, tool_name: &str, message: impl std::fmt::Display) -> Self {
        Self {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            output: format!("Error: {message}"),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_schema() -> ToolSchema {
        ToolSchema::new()
            .required("id", ParamKind::Integer, "Element id")
            .optional("button", ParamKind::Enum(vec!["left".into(), "right".into()]), "Mouse button")
    }

    #[test]
    fn empty_schema_renders_as_none() {
        assert_eq!(ToolSchema::new().to_json_schema(), None);
        let def = ToolDefinition::new("browser.scroll", "Scroll", &ToolSchema::new());
        let value = serde_json::to_value(&def).expect("serialize");
        assert!(value.get("parameters").is_none());
    }

    #[test]
    fn rendered_schema_lists_required_fields_and_watch() {
        let schema = click_schema().to_json_schema().expect("schema");
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["id"]));
        assert_eq!(schema["properties"]["id"]["type"], "integer");
        assert_eq!(schema["properties"]["button"]["enum"][1], "right");
        assert_eq!(schema["properties"][WATCH_FIELD]["type"], "number");
    }

    #[test]
    fn validate_accepts_matching_arguments() {
        let schema = click_schema();
        assert!(schema.validate(&serde_json::json!({"id": 3})).is_ok());
        assert!(schema.validate(&serde_json::json!({"id": 3, "button": "left"})).is_ok());
        assert!(schema.validate(&serde_json::json!({"id": 3, "button": null})).is_ok());
    }

    #[test]
    fn validate_rejects_mismatches() {
        let schema = click_schema();
        let missing = schema.validate(&serde_json::json!({})).expect_err("missing");
        assert!(missing.contains("missing required field 'id'"));

        let wrong_type = schema.validate(&serde_json::json!({"id": "3"})).expect_err("type");
        assert!(wrong_type.contains("must be of type integer"));

        let bad_enum = schema
            .validate(&serde_json::json!({"id": 1, "button": "middle"}))
            .expect_err("enum");
        assert!(bad_enum.contains("one of [left, right]"));

        let unknown = schema
            .validate(&serde_json::json!({"id": 1, "extra": true}))
            .expect_err("unknown");
        assert!(unknown.contains("unknown field 'extra'"));

        assert!(schema.validate(&serde_json::json!([1])).is_err());
    }

    #[test]
    fn parameterless_schema_accepts_null_and_empty_object() {
        let schema = ToolSchema::new();
        assert!(schema.validate(&Value::Null).is_ok());
        assert!(schema.validate(&serde_json::json!({})).is_ok());
    }

    #[test]
    fn error_result_prefixes_message() {
        let result = ToolResult::error("c1", "echo", "boom");
        assert!(result.is_error);
        assert_eq!(result.output, "Error: boom");
    }
}
