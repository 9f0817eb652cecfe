//! LLM provider abstraction and OpenAI-compatible implementation.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
        ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequestArgs,
        FunctionCall, FunctionObjectArgs,
    },
};
use async_trait::async_trait;
use proto::{AgentMessage, LlmError, ToolCall, ToolDefinition};
use serde_json::Value;
use tracing::debug;

/// Represents a message in a chat history
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Semantic role of this message.
    pub role: proto::Role,
    /// Human-readable text content.
    pub content: String,
    /// Tool call id when this is a tool result.
    pub tool_call_id: Option<String>,
    /// Tool name when this is a tool result.
    pub tool_name: Option<String>,
    /// Tool calls requested by assistant messages.
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    fn plain(role: proto::Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(proto::Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(proto::Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(proto::Role::Assistant, content)
    }

    /// Creates a tool-result message linked to the call that produced it.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::plain(proto::Role::Tool, content)
        }
    }

    /// Builds the OpenAI request message for this turn.
    fn to_openai(&self) -> Result<ChatCompletionRequestMessage, LlmError> {
        let content = self.content.clone();
        let message: ChatCompletionRequestMessage = match self.role {
            proto::Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map_err(serialization)?
                .into(),
            proto::Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(serialization)?
                .into(),
            proto::Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(content);
                if let Some(calls) = self.tool_calls.as_deref().filter(|c| !c.is_empty()) {
                    builder.tool_calls(calls.iter().map(openai_tool_call).collect::<Vec<_>>());
                }
                builder.build().map_err(serialization)?.into()
            }
            proto::Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(self.tool_call_id.clone().unwrap_or_default())
                .content(content)
                .build()
                .map_err(serialization)?
                .into(),
        };
        Ok(message)
    }
}

impl From<&AgentMessage> for ChatMessage {
    fn from(msg: &AgentMessage) -> Self {
        Self {
            role: msg.role.clone(),
            content: msg.content.clone(),
            tool_call_id: msg.tool_call_id.clone(),
            tool_name: msg.tool_name.clone(),
            tool_calls: msg.tool_calls.clone(),
        }
    }
}

/// How the model may use the declared tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides between text and tool calls.
    #[default]
    Auto,
    /// The model must call at least one tool.
    Required,
    /// Tools are declared but must not be called.
    None,
}

/// Request to the LLM
#[derive(Debug)]
pub struct ChatRequest {
    /// Full chat history including system/user/assistant/tool messages.
    pub messages: Vec<ChatMessage>,
    /// Available tools schema.
    pub tools: Vec<ToolDefinition>,
    /// Target model id.
    pub model: String,
    pub tool_choice: ToolChoice,
}

/// Token usage reported by the LLM for a single call.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Number of tokens in the prompt / input.
    pub prompt_tokens: u32,
    /// Number of tokens in the generated output.
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Accumulates another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Response from the LLM. Content and tool calls may both be present.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Free-text assistant content.
    pub content: Option<String>,
    /// Tool invocations in the order the model listed them.
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
}

impl ChatResponse {
    /// A content-only response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A response requesting tool calls without content.
    pub fn tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }
}

/// LLM provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a chat request to the provider and returns content and/or tool calls.
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// OpenAI-compatible provider (works with OpenAI, together.ai, Ollama, etc.)
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates an OpenAI provider using the default API base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        Self { client }
    }

    /// Creates an OpenAI provider with a custom API base URL.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        let client = Client::with_config(config);
        Self { client }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let messages = req
            .messages
            .iter()
            .map(ChatMessage::to_openai)
            .collect::<Result<Vec<_>, _>>()?;
        let tools = req
            .tools
            .iter()
            .map(openai_tool)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&req.model).messages(messages);
        if !tools.is_empty() {
            builder.tools(tools).tool_choice(openai_tool_choice(req.tool_choice));
        }
        let request = builder.build().map_err(serialization)?;

        debug!(
            model = %req.model,
            messages = req.messages.len(),
            tools = req.tools.len(),
            "Chat completion request"
        );

        let response = self.client.chat().create(request).await.map_err(|e| {
            let err = classify_api_error(&e.to_string());
            debug!(error = %err, "Chat completion failed");
            err
        })?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let Some(choice) = response.choices.into_iter().next() else {
            return Err(LlmError::InvalidResponse("response had no choices".into()));
        };

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: parse_tool_arguments(&call.function.arguments),
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            usage,
        })
    }
}

fn serialization(err: impl std::fmt::Display) -> LlmError {
    LlmError::Serialization(err.to_string())
}

/// Maps provider error text onto `RateLimit`, or an `Api` error with a config hint.
fn classify_api_error(message: &str) -> LlmError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("rate_limit") {
        return LlmError::RateLimit;
    }
    let hint = if lower.contains("does not exist") || lower.contains("model_not_found") {
        " Check [agent].model or STEWARD_MODEL."
    } else if lower.contains("billing") || lower.contains("quota") {
        " Check the billing status of your API account."
    } else if lower.contains("incorrect api key") || lower.contains("invalid_api_key") {
        " Check [agent].api_key or STEWARD_API_KEY."
    } else {
        ""
    };
    LlmError::Api(format!("{message}{hint}"))
}

fn openai_tool_choice(choice: ToolChoice) -> ChatCompletionToolChoiceOption {
    match choice {
        ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
        ToolChoice::Required => ChatCompletionToolChoiceOption::Required,
        ToolChoice::None => ChatCompletionToolChoiceOption::None,
    }
}

fn openai_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.to_string(),
        },
    }
}

/// Parameterless tools are declared without a `parameters` object.
fn openai_tool(def: &ToolDefinition) -> Result<ChatCompletionTool, LlmError> {
    let mut function = FunctionObjectArgs::default();
    function.name(def.name.clone()).description(def.description.clone());
    if let Some(parameters) = &def.parameters {
        function.parameters(parameters.clone());
    }
    Ok(ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: function.build().map_err(serialization)?,
    })
}

/// Malformed argument JSON becomes an empty object; schema validation reports it.
fn parse_tool_arguments(arguments: &str) -> Value {
    serde_json::from_str(arguments).unwrap_or_else(|_| Value::Object(Default::default()))
}
