//! Outbound notifications delivered to whoever polls a session.

use serde::{Deserialize, Serialize};

use crate::message::CallbackId;

/// What a pending callback asks of the human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackKind {
    /// Informational message that still waits for an acknowledgement.
    Message,
    /// Free-form answer requested.
    InformationRequest,
    /// Yes/no confirmation requested.
    ConfirmationRequest,
}

/// One unit of outbound information about a task's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    /// Informational, non-fatal text.
    Message { text: String },
    /// The agent is paused on a callback and waits for `SubmitAnswer`.
    ActionRequired {
        kind: CallbackKind,
        prompt: serde_json::Value,
        #[serde(rename = "callbackId")]
        callback_id: CallbackId,
    },
    /// Terminal success carrying the final answer (possibly empty).
    Finished { result: String },
    /// Terminal failure carrying a human-readable reason.
    Failed { message: String },
}

impl Notification {
    /// Creates a plain text notification.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { text: text.into() }
    }

    /// Returns `true` for `Finished` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }
}
