//! Tool-calling agent loop driven against a session.

use std::sync::Arc;

use proto::{LlmError, Notification, Role, SessionError};
use serde_json::Value;
use session::Session;
use tools::ToolContext;
use tracing::{debug, info, warn};

use crate::{
    agent_tool::AgentTool,
    llm::{ChatMessage, ChatRequest, LlmProvider, TokenUsage, ToolChoice},
    tool_registry::ToolRegistry,
};

const DEFAULT_MAX_TOOL_ROUNDS: usize = 30;
const MAX_TOOL_RESULT_CHARS: usize = 16_000;

/// Maximum total character size of conversation context sent to the LLM.
/// Roughly 150K tokens (1 token ≈ 4 chars), leaving room for the response.
const MAX_CONTEXT_CHARS: usize = 600_000;

/// A model plus the tools it may call.
///
/// `run` is re-entrant: the same agent can serve many sessions concurrently
/// and can be nested inside another agent through [`Agent::into_tool`].
pub struct Agent {
    name: String,
    description: String,
    system_prompt: Option<String>,
    registry: Arc<ToolRegistry>,
    llm: Arc<dyn LlmProvider>,
    model: String,
    tool_choice: ToolChoice,
    max_tool_rounds: usize,
}

impl Agent {
    /// Creates an agent with no tools and no system prompt.
    pub fn new(name: impl Into<String>, llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("Delegate a task to the {name} agent"),
            name,
            system_prompt: None,
            registry: Arc::new(ToolRegistry::new()),
            llm,
            model: model.into(),
            tool_choice: ToolChoice::Auto,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Wraps this agent as a tool with a single `task` parameter.
    pub fn into_tool(self: Arc<Self>) -> AgentTool {
        AgentTool::new(self)
    }

    /// Drives the model to a final answer for `task` on `session`.
    ///
    /// Tool failures are reported to the model and never end the loop.
    /// Errors returned here are machinery failures the caller is expected
    /// to turn into a failed session.
    pub async fn run(&self, task: &str, session: &Arc<Session>) -> Result<String, proto::Error> {
        let mut thread = session.fork(task);
        if let Some(prompt) = &self.system_prompt {
            thread.push_system(prompt.clone());
        }
        thread.push_user(task);
        let mut messages: Vec<ChatMessage> = thread.turns().iter().map(ChatMessage::from).collect();

        let tool_defs = self.registry.definitions();
        let mut round = 0;
        let mut total_usage = TokenUsage::default();

        loop {
            if session.is_failed() {
                info!(session_id = %session.id(), agent = %self.name, "Session failed; stopping agent loop");
                return Err(SessionError::Aborted(session.id().to_string()).into());
            }
            if round >= self.max_tool_rounds {
                warn!(
                    session_id = %session.id(),
                    "Max tool rounds ({}) reached for agent {}",
                    self.max_tool_rounds, self.name
                );
                return Err(LlmError::MaxToolRoundsExceeded.into());
            }

            truncate_messages_to_fit(&mut messages);
            let req = ChatRequest {
                messages: messages.clone(),
                tools: tool_defs.clone(),
                model: self.model.clone(),
                tool_choice: self.tool_choice,
            };
            debug!(session_id = %session.id(), agent = %self.name, round, "LLM call");
            let t0 = std::time::Instant::now();
            let response = self.llm.chat(req).await?;
            debug!(elapsed_ms = %t0.elapsed().as_millis(), round = %round, "LLM response received");
            total_usage.add(&response.usage);

            let content = response.content.unwrap_or_default();
            let tool_calls = response.tool_calls;
            thread.push_assistant(content.clone(), tool_calls.clone());
            messages.extend(thread.turns().last().map(ChatMessage::from));

            if !content.is_empty() {
                session.notify(Notification::message(content.clone()));
            }

            if tool_calls.is_empty() {
                info!(
                    session_id = %session.id(),
                    agent = %self.name,
                    prompt_tokens = total_usage.prompt_tokens,
                    completion_tokens = total_usage.completion_tokens,
                    "Agent final response: {content:.50}"
                );
                return Ok(content);
            }

            debug!(
                "Tool calls requested: {:?}",
                tool_calls.iter().map(|tc| &tc.name).collect::<Vec<_>>()
            );
            for tc in &tool_calls {
                let ctx = ToolContext::new(Arc::clone(session), tc.id.clone());
                let result = self.registry.execute(&ctx, tc).await;
                if result.is_error {
                    let reason = result.output.strip_prefix("Error: ").unwrap_or(&result.output);
                    session.notify(Notification::message(format!(
                        "Tool '{}' failed: {reason}",
                        tc.name
                    )));
                }

                thread.push_tool_result(&tc.id, &tc.name, &result.output);
                let llm_output = truncate_tool_result(
                    &sanitize_tool_output_for_llm(&result.output),
                    MAX_TOOL_RESULT_CHARS,
                );
                messages.extend(thread.turns().last().map(|turn| ChatMessage {
                    content: llm_output,
                    ..ChatMessage::from(turn)
                }));
            }
            round += 1;
        }
    }
}

/// Replaces inline base64 image payloads with a short note, at any depth.
fn strip_image_data(value: &mut Value) -> bool {
    match value {
        Value::Object(obj) => {
            let is_image = obj.contains_key("data_b64")
                && obj
                    .get("mime")
                    .and_then(|m| m.as_str())
                    .is_some_and(|m| m.starts_with("image/"));
            if is_image {
                obj.remove("data_b64");
                obj.insert(
                    "note".to_string(),
                    Value::String(
                        "Image data captured successfully. Base64 data omitted from context.".to_string(),
                    ),
                );
                return true;
            }
            let mut stripped = false;
            for child in obj.values_mut() {
                stripped |= strip_image_data(child);
            }
            stripped
        }
        Value::Array(items) => {
            let mut stripped = false;
            for item in items {
                stripped |= strip_image_data(item);
            }
            stripped
        }
        _ => false,
    }
}

/// Strips large base64 image payloads from tool output before sending to the LLM.
/// The full output stays in the session history; this only affects what the LLM sees.
fn sanitize_tool_output_for_llm(output: &str) -> String {
    if let Ok(mut val) = serde_json::from_str::<Value>(output)
        && strip_image_data(&mut val)
        && let Ok(s) = serde_json::to_string(&val)
    {
        return s;
    }
    output.to_string()
}

/// Truncates a tool result to at most `max_chars` characters.
/// If the result is longer, it appends a note with how many characters were cut.
fn truncate_tool_result(output: &str, max_chars: usize) -> String {
    let total_chars = output.chars().count();
    if total_chars <= max_chars {
        return output.to_string();
    }

    let kept = output.chars().take(max_chars).collect::<String>();
    let cut = total_chars - max_chars;
    format!("{kept}\n...[output truncated: {cut} chars omitted]")
}

/// Estimates the character count of a single [`ChatMessage`] for context
/// size budgeting. Counts `content` plus serialized tool call arguments.
fn estimate_message_chars(msg: &ChatMessage) -> usize {
    let mut chars = msg.content.len();
    if let Some(calls) = &msg.tool_calls {
        for tc in calls {
            chars += tc.name.len();
            chars += tc.arguments.to_string().len();
        }
    }
    chars
}

/// Truncates conversation messages so total context stays within
/// [`MAX_CONTEXT_CHARS`]. The leading system/user seed and the most recent
/// messages are always preserved; the oldest middle messages are dropped
/// when the budget is exceeded, never leaving a tool result without the
/// assistant turn that requested it.
fn truncate_messages_to_fit(messages: &mut Vec<ChatMessage>) {
    let total: usize = messages.iter().map(estimate_message_chars).sum();
    if total <= MAX_CONTEXT_CHARS {
        return;
    }

    const MIN_KEEP_TAIL: usize = 4;
    let keep_head = messages
        .iter()
        .take_while(|m| m.role != Role::Assistant)
        .count();
    let keep_tail = MIN_KEEP_TAIL.min(messages.len().saturating_sub(keep_head));

    if messages.len() <= keep_head + keep_tail {
        return;
    }

    let head_chars: usize = messages[..keep_head]
        .iter()
        .map(estimate_message_chars)
        .sum();
    let tail_chars: usize = messages[messages.len() - keep_tail..]
        .iter()
        .map(estimate_message_chars)
        .sum();

    let remaining_budget = MAX_CONTEXT_CHARS.saturating_sub(head_chars + tail_chars);

    let middle_end = messages.len() - keep_tail;
    let middle = &messages[keep_head..middle_end];
    let mut keep_from_middle: usize = 0;
    let mut middle_chars: usize = 0;

    for msg in middle.iter().rev() {
        let c = estimate_message_chars(msg);
        if middle_chars + c > remaining_budget {
            break;
        }
        middle_chars += c;
        keep_from_middle += 1;
    }

    let mut drop_count = middle.len() - keep_from_middle;
    while keep_head + drop_count < middle_end && messages[keep_head + drop_count].role == Role::Tool {
        drop_count += 1;
    }
    if drop_count > 0 {
        warn!(
            "Conversation context too large ({total} chars > {MAX_CONTEXT_CHARS}); \
             dropping {drop_count} oldest messages to fit"
        );
        messages.drain(keep_head..keep_head + drop_count);
    }
}
