//! Composes an agent into another agent's tool set.

use std::sync::Arc;

use async_trait::async_trait;
use proto::{ParamKind, ToolError, ToolSchema};
use serde::Deserialize;
use tools::{Tool, ToolContext, parse_args};
use tracing::info;

use crate::runtime::Agent;

/// Runs a child agent's loop on the caller's session and returns its final text.
pub struct AgentTool {
    agent: Arc<Agent>,
}

#[derive(Debug, Deserialize)]
struct TaskArgs {
    task: String,
}

impl AgentTool {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        self.agent.name()
    }

    fn description(&self) -> &str {
        self.agent.description()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().required(
            "task",
            ParamKind::String,
            "Self-contained instruction for the delegated agent",
        )
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> Result<String, ToolError> {
        let parsed: TaskArgs = parse_args(args)?;
        info!(session_id = %ctx.session.id(), agent = %self.agent.name(), "Delegating to sub-agent");
        self.agent
            .run(&parsed.task, &ctx.session)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }

    async fn close(&self) {
        self.agent.registry().close_all().await;
    }
}
