//! Tool trait and built-in tool implementations.
//!
//! The agent runtime uses this crate to expose executable capabilities:
//! human-in-the-loop prompts and the element-addressing browser navigator.

pub mod browser;
pub mod human;

pub use browser::{Navigator, NavigatorSettings, NavigatorTool, PageDriver};
pub use human::{AskHumanTool, ConfirmTool, TellTool};

use std::sync::Arc;

use async_trait::async_trait;
use proto::{ToolError, ToolSchema};
use serde::de::DeserializeOwned;
use session::Session;

/// Per-invocation context injected into every tool call.
#[derive(Clone)]
pub struct ToolContext {
    /// Session the invoking agent loop runs against.
    pub session: Arc<Session>,
    /// Invocation id the model assigned to this call.
    pub call_id: String,
}

impl ToolContext {
    pub fn new(session: Arc<Session>, call_id: impl Into<String>) -> Self {
        Self {
            session,
            call_id: call_id.into(),
        }
    }
}

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name exposed to the LLM.
    fn name(&self) -> &str;
    /// Human-readable description for tool selection.
    fn description(&self) -> &str;
    /// Declared parameters; arguments are validated against it before `execute`.
    fn schema(&self) -> ToolSchema;
    /// Executes the tool with validated JSON args and returns its textual result.
    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> Result<String, ToolError>;
    /// Releases resources held by the tool. Called once the owning task ends.
    async fn close(&self) {}
}

/// Deserializes validated tool arguments into a typed struct.
pub fn parse_args<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs(e.to_string()))
}
