//! Tool registry used by the runtime to list and execute tools.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use proto::{ToolCall, ToolDefinition, ToolError, ToolResult, ToolSchema};
use serde_json::Value;
use tools::{Tool, ToolContext};
use tracing::{debug, warn};

use crate::watch::{split_watch, watch_until_changed};

type Handler = dyn Fn(ToolContext, Value) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync;

/// Closure-backed tool created by [`ToolRegistry::register_fn`].
struct FnTool {
    name: String,
    description: String,
    schema: ToolSchema,
    handler: Arc<Handler>,
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        (self.handler)(ctx.clone(), args).await
    }
}

/// Registry of available tools, kept in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), ToolError> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        debug!("Registering tool: {name}");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Register a closure as a tool.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ToolSchema,
        handler: F,
    ) -> Result<(), ToolError>
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        let handler: Arc<Handler> = Arc::new(move |ctx, args| Box::pin(handler(ctx, args)));
        self.register(FnTool {
            name: name.into(),
            description: description.into(),
            schema,
            handler,
        })
    }

    /// Get tool definitions for the LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition::new(t.name(), t.description(), &t.schema()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Returns the list of registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call. Failures come back as error results, never as `Err`.
    pub async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResult {
        match self.try_execute(ctx, call).await {
            Ok(output) => ToolResult::success(&call.id, &call.name, output),
            Err(err) => {
                warn!(tool = %call.name, call_id = %call.id, error = %err, "Tool call failed");
                ToolResult::error(&call.id, &call.name, err)
            }
        }
    }

    async fn try_execute(&self, ctx: &ToolContext, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let (args, watch) = split_watch(call.arguments.clone())?;
        tool.schema().validate(&args).map_err(ToolError::InvalidArgs)?;

        debug!("Executing tool: {} (call_id: {})", call.name, call.id);
        match watch {
            Some(interval) => {
                debug!(tool = %call.name, interval_ms = %interval.as_millis(), "Watching tool result");
                watch_until_changed(interval, || tool.execute(ctx, args.clone())).await
            }
            None => tool.execute(ctx, args).await,
        }
    }

    /// Releases resources of every registered tool.
    pub async fn close_all(&self) {
        for tool in &self.tools {
            tool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proto::ParamKind;
    use session::Session;

    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::new().required("value", ParamKind::String, "Text to echo")
        }

        async fn execute(&self, _ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
            Ok(args["value"].as_str().unwrap_or_default().to_string())
        }
    }

    struct ClosingTool {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for ClosingTool {
        fn name(&self) -> &str {
            "closing"
        }

        fn description(&self) -> &str {
            "Counts close calls"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::new()
        }

        async fn execute(&self, _ctx: &ToolContext, _args: Value) -> Result<String, ToolError> {
            Ok(String::new())
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(Session::new("task"), "c1")
    }

    #[tokio::test]
    async fn register_and_execute_known_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).expect("register");

        let call = ToolCall::with_id("c1", "echo", serde_json::json!({"value":"hello"}));
        let result = registry.execute(&ctx(), &call).await;
        assert!(!result.is_error);
        assert_eq!(result.output, "hello");
        assert_eq!(result.tool_name, "echo");
        assert_eq!(result.call_id, "c1");
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).expect("first");
        let err = registry.register(EchoTool).expect_err("duplicate");
        assert!(matches!(err, ToolError::Duplicate(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_error() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("missing", serde_json::json!({}));
        let result = registry.execute(&ctx(), &call).await;
        assert!(result.is_error);
        assert!(result.output.starts_with("Error: Tool not found: missing"));
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).expect("register");
        let call = ToolCall::new("echo", serde_json::json!({"value": 3}));
        let result = registry.execute(&ctx(), &call).await;
        assert!(result.is_error);
        assert!(result.output.contains("Invalid arguments"));
        assert!(result.output.contains("must be of type string"));
    }

    #[tokio::test]
    async fn watch_field_is_stripped_before_validation() {
        let mut registry = ToolRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry
            .register_fn("counter", "Counts", ToolSchema::new(), move |_ctx, args| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert!(args.get("watch").is_none());
                    Ok(format!("{n}"))
                }
            })
            .expect("register");

        let call = ToolCall::new("counter", serde_json::json!({"watch": 0.01}));
        let result = registry.execute(&ctx(), &call).await;
        assert!(!result.is_error, "{}", result.output);
        let diff: Value = serde_json::from_str(&result.output).expect("diff json");
        assert_eq!(diff, serde_json::json!({"previous": 0, "current": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn definitions_follow_registration_order() {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn("zeta", "Last letter", ToolSchema::new(), |_ctx, _args| async {
                Ok(String::new())
            })
            .expect("register zeta");
        registry.register(EchoTool).expect("register echo");

        assert_eq!(registry.tool_names(), vec!["zeta", "echo"]);
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert!(defs[0].parameters.is_none());
        let params = defs[1].parameters.as_ref().expect("echo parameters");
        assert_eq!(params["required"][0], "value");
    }

    #[tokio::test]
    async fn close_all_closes_every_tool() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(ClosingTool {
                closed: Arc::clone(&closed),
            })
            .expect("register");
        registry.register(EchoTool).expect("register");
        registry.close_all().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
