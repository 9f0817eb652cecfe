//! Human-in-the-loop tools: ask, confirm, and tell.

use async_trait::async_trait;
use proto::{CallbackKind, Notification, ParamKind, ToolError, ToolSchema};
use serde::Deserialize;
use tracing::debug;

use crate::{Tool, ToolContext, parse_args};

/// Asks the human a free-form question and returns the answer.
pub struct AskHumanTool;
/// Asks the human to confirm an action before it happens.
pub struct ConfirmTool;
/// Tells the human something without waiting for an answer.
pub struct TellTool;

#[derive(Debug, Deserialize)]
struct AskArgs {
    question: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmArgs {
    action: String,
}

#[derive(Debug, Deserialize)]
struct TellArgs {
    message: String,
}

const AFFIRMATIVE: &[&str] = &["y", "yes", "ok", "confirm", "true"];

/// Returns `true` when a human reply counts as a confirmation.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    AFFIRMATIVE.contains(&answer.as_str())
}

#[async_trait]
impl Tool for AskHumanTool {
    fn name(&self) -> &str {
        "human.ask"
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for their answer"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().required("question", ParamKind::String, "The question to ask")
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> Result<String, ToolError> {
        let parsed: AskArgs = parse_args(args)?;
        let callback = ctx
            .session
            .open_callback(CallbackKind::InformationRequest, parsed.question)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let answer = callback
            .wait()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        debug!(call_id = %ctx.call_id, "Human answered question");
        Ok(answer)
    }
}

#[async_trait]
impl Tool for ConfirmTool {
    fn name(&self) -> &str {
        "human.confirm"
    }

    fn description(&self) -> &str {
        "Ask the user to confirm an action; returns 'confirmed' or 'declined'"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().required(
            "action",
            ParamKind::String,
            "Description of the action that needs confirmation",
        )
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> Result<String, ToolError> {
        let parsed: ConfirmArgs = parse_args(args)?;
        let callback = ctx
            .session
            .open_callback(CallbackKind::ConfirmationRequest, parsed.action)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let answer = callback
            .wait()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(if is_affirmative(&answer) {
            "confirmed".to_string()
        } else {
            "declined".to_string()
        })
    }
}

#[async_trait]
impl Tool for TellTool {
    fn name(&self) -> &str {
        "human.tell"
    }

    fn description(&self) -> &str {
        "Send the user an informational message without waiting"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().required("message", ParamKind::String, "Message text")
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> Result<String, ToolError> {
        let parsed: TellArgs = parse_args(args)?;
        ctx.session.notify(Notification::message(parsed.message));
        Ok("sent".to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use session::Session;

    use super::*;

    fn context() -> ToolContext {
        ToolContext::new(Session::new("task"), "call-1")
    }

    async fn answer_next_callback(session: &Arc<Session>, answer: &str) {
        loop {
            if let Some(Notification::ActionRequired { callback_id, .. }) = session.poll().await {
                session.resolve(&callback_id, answer).expect("resolve");
                return;
            }
        }
    }

    #[test]
    fn affirmative_answers_are_case_insensitive() {
        assert!(is_affirmative("Yes"));
        assert!(is_affirmative(" OK "));
        assert!(!is_affirmative("nope"));
        assert!(!is_affirmative(""));
    }

    #[tokio::test]
    async fn ask_returns_human_answer() {
        let ctx = context();
        let session = Arc::clone(&ctx.session);
        let responder = tokio::spawn(async move { answer_next_callback(&session, "blue").await });

        let answer = AskHumanTool
            .execute(&ctx, serde_json::json!({"question": "favourite colour?"}))
            .await
            .expect("answer");
        responder.await.expect("responder");
        assert_eq!(answer, "blue");
    }

    #[tokio::test]
    async fn confirm_maps_answers() {
        let ctx = context();
        let session = Arc::clone(&ctx.session);
        let responder = tokio::spawn(async move { answer_next_callback(&session, "no").await });

        let result = ConfirmTool
            .execute(&ctx, serde_json::json!({"action": "delete repo"}))
            .await
            .expect("decision");
        responder.await.expect("responder");
        assert_eq!(result, "declined");
    }

    #[tokio::test]
    async fn tell_emits_message_notification() {
        let ctx = context();
        TellTool
            .execute(&ctx, serde_json::json!({"message": "heads up"}))
            .await
            .expect("tell");
        assert_eq!(ctx.session.try_poll(), Some(Notification::message("heads up")));
    }

    #[tokio::test]
    async fn ask_on_terminal_session_fails() {
        let ctx = context();
        ctx.session.finish("done").expect("finish");
        let err = AskHumanTool
            .execute(&ctx, serde_json::json!({"question": "?"}))
            .await
            .expect_err("terminal");
        assert!(err.to_string().contains("already terminal"));
    }
}
