use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Dispatch/transport error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool registration/execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Session/callback state error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// Dispatch service errors, returned synchronously to the RPC caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Session lookup failure (never existed or already released).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Callback lookup failure within an existing session.
    #[error("Callback not found: {0}")]
    CallbackNotFound(String),

    /// The callback was answered before.
    #[error("Callback already resolved: {0}")]
    AlreadyResolved(String),

    /// No task kind with this name is registered.
    #[error("Unsupported task kind: {0}")]
    UnsupportedTaskKind(String),

    /// A credential the task kind needs is absent.
    #[error("Unauthorized: missing credential '{0}'")]
    Unauthorized(String),

    /// Malformed request or an operation the session cannot serve.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Network/connection-level failure.
    #[error("Connection error: {0}")]
    Connection(String),
}

/// LLM provider errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// Remote API failure.
    #[error("{0}")]
    Api(String),

    /// Provider throttled the request.
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Provider response schema/content was invalid.
    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),

    /// Runtime exceeded configured tool-call rounds.
    #[error("Max tool rounds exceeded")]
    MaxToolRoundsExceeded,

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Tool registration/execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Requested tool is unknown.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// A tool with this name is registered already.
    #[error("Duplicate tool: {0}")]
    Duplicate(String),

    /// Tool call arguments do not match the declared schema.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// An element id that does not belong to the current page-load epoch.
    #[error("Stale element id {id}: not part of page epoch {epoch}")]
    StaleElementId { id: u32, epoch: u64 },

    /// Tool process or operation failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Tool exceeded allowed execution time.
    #[error("Timeout after {0}s")]
    Timeout(u64),

    /// Filesystem/process IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session and callback state errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// No open callback with this id exists in the session.
    #[error("Callback not found: {0}")]
    CallbackNotFound(String),

    /// The callback was answered before.
    #[error("Callback already resolved: {0}")]
    AlreadyResolved(String),

    /// The responder side went away before an answer arrived.
    #[error("Callback abandoned before it was answered: {0}")]
    Abandoned(String),

    /// The session reached FINISHED or FAILED already.
    #[error("Session already terminal: {0}")]
    AlreadyTerminal(String),

    /// The agent loop stopped because the session failed.
    #[error("Session aborted: {0}")]
    Aborted(String),
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::CallbackNotFound(id) => GatewayError::CallbackNotFound(id),
            SessionError::AlreadyResolved(id) => GatewayError::AlreadyResolved(id),
            other => GatewayError::BadRequest(other.to_string()),
        }
    }
}
