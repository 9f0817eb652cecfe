//! Agent runtime, tool registry, and LLM adapter interfaces.

pub mod agent_tool;
pub mod llm;
pub mod runtime;
pub mod tool_registry;
pub mod watch;

/// Sub-agent composed as a single tool.
pub use agent_tool::AgentTool;
/// Chat request/response models and provider interfaces.
pub use llm::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, OpenAiProvider, TokenUsage, ToolChoice};
/// Tool-calling agent loop.
pub use runtime::Agent;
/// Runtime tool registry.
pub use tool_registry::ToolRegistry;
