//! Shared protocol types for the dispatch service, sessions, agent loop, and tools.
//!
//! This crate defines serializable message/notification/tool structures and
//! strongly-typed error enums shared across the workspace.

pub mod error;
pub mod message;
pub mod notification;
pub mod tool;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of conversation/message identity types.
pub use message::{AgentMessage, CallbackId, Role, SessionId, ThreadId};
/// Re-export of outbound notification types.
pub use notification::{CallbackKind, Notification};
/// Re-export of tool call declaration, schema, and result types.
pub use tool::{ParamKind, ParamSpec, ToolCall, ToolDefinition, ToolResult, ToolSchema, WATCH_FIELD};
