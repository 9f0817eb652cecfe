//! Single-use, asynchronously resolvable human answer handles.

use proto::{CallbackId, CallbackKind, SessionError};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

/// The waiting side of a paused human interaction.
///
/// Consumed by [`wait`](Self::wait), so an answer is observed exactly once.
#[derive(Debug)]
pub struct Callback {
    id: CallbackId,
    kind: CallbackKind,
    prompt: Value,
    rx: oneshot::Receiver<String>,
}

/// The responder side kept by the owning session.
#[derive(Debug)]
pub struct CallbackSlot {
    id: CallbackId,
    kind: CallbackKind,
    state: SlotState,
}

#[derive(Debug)]
enum SlotState {
    Open(oneshot::Sender<String>),
    Resolved,
    Abandoned,
}

impl Callback {
    /// Creates a callback and the slot that resolves it.
    pub fn new(kind: CallbackKind, prompt: impl Into<Value>) -> (Self, CallbackSlot) {
        let id = CallbackId::new();
        let (tx, rx) = oneshot::channel();
        let callback = Self {
            id: id.clone(),
            kind,
            prompt: prompt.into(),
            rx,
        };
        let slot = CallbackSlot {
            id,
            kind,
            state: SlotState::Open(tx),
        };
        (callback, slot)
    }

    pub fn id(&self) -> &CallbackId {
        &self.id
    }

    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    pub fn prompt(&self) -> &Value {
        &self.prompt
    }

    /// Suspends until the slot is resolved and returns the answer.
    ///
    /// No timeout is applied here; wrap in `tokio::time::timeout` when a
    /// bounded wait is needed.
    pub async fn wait(self) -> Result<String, SessionError> {
        debug!(callback_id = %self.id, "Waiting for callback answer");
        self.rx
            .await
            .map_err(|_| SessionError::Abandoned(self.id.to_string()))
    }
}

impl CallbackSlot {
    pub fn id(&self) -> &CallbackId {
        &self.id
    }

    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// Delivers the answer. A second call fails with `AlreadyResolved`.
    pub fn resolve(&mut self, answer: impl Into<String>) -> Result<(), SessionError> {
        match std::mem::replace(&mut self.state, SlotState::Resolved) {
            SlotState::Open(tx) => {
                if tx.send(answer.into()).is_err() {
                    debug!(callback_id = %self.id, "Callback waiter dropped before answer");
                }
                Ok(())
            }
            SlotState::Resolved => Err(SessionError::AlreadyResolved(self.id.to_string())),
            SlotState::Abandoned => {
                self.state = SlotState::Abandoned;
                Err(SessionError::Abandoned(self.id.to_string()))
            }
        }
    }

    /// Drops the responder so a pending `wait` returns `Abandoned`.
    pub fn abandon(&mut self) {
        if matches!(self.state, SlotState::Open(_)) {
            self.state = SlotState::Abandoned;
        }
    }

    /// Returns `true` while no answer has been delivered.
    pub fn is_open(&self) -> bool {
        matches!(self.state, SlotState::Open(_))
    }
}
