//! Server-side state for one running task.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use proto::{
    AgentMessage, CallbackId, CallbackKind, Notification, Role, SessionError, SessionId, ThreadId,
    ToolCall, ToolError,
};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::callback::{Callback, CallbackSlot};

/// Lifecycle state of a session. Terminal states are entered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Finished(String),
    Failed(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Running)
    }
}

/// A stateful tool instance the session can reach for auxiliary operations.
///
/// The session only holds a [`Weak`] reference; the tool stays owned by
/// whoever constructed it.
#[async_trait]
pub trait ActiveTool: Send + Sync {
    /// Short label for logs ("browser", ...).
    fn label(&self) -> &str;
    /// Captures the tool's current visual state as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, ToolError>;
}

struct SessionInner {
    history: Vec<AgentMessage>,
    outbox: VecDeque<Notification>,
    callbacks: HashMap<CallbackId, CallbackSlot>,
    state: SessionState,
}

/// One task's conversation history, outbox, open callbacks, and terminal state.
pub struct Session {
    id: SessionId,
    instruction: String,
    inner: Mutex<SessionInner>,
    changed: Notify,
    active_tool: Mutex<Option<Weak<dyn ActiveTool>>>,
}

impl Session {
    /// Creates a running session for the given instruction.
    pub fn new(instruction: impl Into<String>) -> Arc<Self> {
        let session = Arc::new(Self {
            id: SessionId::new(),
            instruction: instruction.into(),
            inner: Mutex::new(SessionInner {
                history: Vec::new(),
                outbox: VecDeque::new(),
                callbacks: HashMap::new(),
                state: SessionState::Running,
            }),
            changed: Notify::new(),
            active_tool: Mutex::new(None),
        });
        debug!(session_id = %session.id, "Session created");
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Starts a fresh turn sequence scoped to one agent invocation.
    pub fn fork(self: &Arc<Self>, task: impl Into<String>) -> Thread {
        let thread = Thread {
            id: ThreadId::new(),
            task: task.into(),
            session: Arc::clone(self),
            turns: Vec::new(),
        };
        debug!(session_id = %self.id, thread_id = %thread.id, "Forked turn sequence");
        thread
    }

    /// Snapshot of every turn recorded across all forked sequences, in append order.
    pub fn history(&self) -> Vec<AgentMessage> {
        self.inner.lock().history.clone()
    }

    fn record(&self, msg: AgentMessage) {
        self.inner.lock().history.push(msg);
    }

    /// Appends a notification to the outbox. Dropped with a warning once terminal.
    pub fn notify(&self, notification: Notification) {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                warn!(session_id = %self.id, "Dropping notification for terminal session");
                return;
            }
            inner.outbox.push_back(notification);
        }
        self.changed.notify_one();
    }

    /// Creates a callback, registers its slot, and publishes an `ActionRequired`.
    pub fn open_callback(
        &self,
        kind: CallbackKind,
        prompt: impl Into<Value>,
    ) -> Result<Callback, SessionError> {
        let (callback, slot) = Callback::new(kind, prompt);
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(SessionError::AlreadyTerminal(self.id.to_string()));
            }
            inner.callbacks.insert(callback.id().clone(), slot);
            inner.outbox.push_back(Notification::ActionRequired {
                kind,
                prompt: callback.prompt().clone(),
                callback_id: callback.id().clone(),
            });
        }
        self.changed.notify_one();
        info!(session_id = %self.id, callback_id = %callback.id(), ?kind, "Callback opened");
        Ok(callback)
    }

    /// Delivers an out-of-band answer to an open callback.
    pub fn resolve(&self, callback_id: &CallbackId, answer: impl Into<String>) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        // Terminal sessions have abandoned every slot, so no answer gets through.
        let slot = inner
            .callbacks
            .get_mut(callback_id)
            .ok_or_else(|| SessionError::CallbackNotFound(callback_id.to_string()))?;
        slot.resolve(answer)?;
        info!(session_id = %self.id, callback_id = %callback_id, "Callback resolved");
        Ok(())
    }

    /// Ids of callbacks that still wait for an answer.
    pub fn open_callbacks(&self) -> Vec<CallbackId> {
        self.inner
            .lock()
            .callbacks
            .values()
            .filter(|slot| slot.is_open())
            .map(|slot| slot.id().clone())
            .collect()
    }

    /// Removes and returns the oldest unread notification without waiting.
    pub fn try_poll(&self) -> Option<Notification> {
        self.inner.lock().outbox.pop_front()
    }

    /// Returns the oldest unread notification, waiting while the session runs.
    ///
    /// Once terminal and drained, returns `None`: nothing more will arrive.
    /// The terminal notification is always the last one returned.
    pub async fn poll(&self) -> Option<Notification> {
        loop {
            let notified = self.changed.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(notification) = inner.outbox.pop_front() {
                    return Some(notification);
                }
                if inner.state.is_terminal() {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Transitions to `Finished`. Fails with `AlreadyTerminal` when repeated.
    pub fn finish(&self, result: impl Into<String>) -> Result<(), SessionError> {
        let result = result.into();
        self.terminate(
            SessionState::Finished(result.clone()),
            Notification::Finished { result },
        )
    }

    /// Transitions to `Failed`. Fails with `AlreadyTerminal` when repeated.
    pub fn fail(&self, message: impl Into<String>) -> Result<(), SessionError> {
        let message = message.into();
        self.terminate(
            SessionState::Failed(message.clone()),
            Notification::Failed { message },
        )
    }

    fn terminate(&self, state: SessionState, last: Notification) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(SessionError::AlreadyTerminal(self.id.to_string()));
            }
            info!(session_id = %self.id, state = ?state, "Session terminated");
            inner.state = state;
            inner.outbox.push_back(last);
            for slot in inner.callbacks.values_mut() {
                slot.abandon();
            }
        }
        self.changed.notify_waiters();
        self.changed.notify_one();
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.inner.lock().state.is_terminal()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.inner.lock().state, SessionState::Failed(_))
    }

    /// Points the session at the currently active stateful tool.
    pub fn set_active_tool(&self, tool: Weak<dyn ActiveTool>) {
        *self.active_tool.lock() = Some(tool);
    }

    /// Returns the active tool if it is still alive.
    pub fn active_tool(&self) -> Option<Arc<dyn ActiveTool>> {
        self.active_tool.lock().as_ref().and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// A turn sequence forked from a session for one agent invocation.
///
/// Every push is mirrored into the owning session's history.
pub struct Thread {
    id: ThreadId,
    task: String,
    session: Arc<Session>,
    turns: Vec<AgentMessage>,
}

impl Thread {
    pub fn id(&self) -> &ThreadId {
        &self.id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Turns recorded in this sequence, oldest first.
    pub fn turns(&self) -> &[AgentMessage] {
        &self.turns
    }

    fn push(&mut self, msg: AgentMessage) {
        self.session.record(msg.clone());
        self.turns.push(msg);
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        let msg = AgentMessage::new(self.session.id.clone(), self.id.clone(), Role::System, content);
        self.push(msg);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        let msg = AgentMessage::new(self.session.id.clone(), self.id.clone(), Role::User, content);
        self.push(msg);
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) {
        let msg = AgentMessage::assistant(self.session.id.clone(), self.id.clone(), content, tool_calls);
        self.push(msg);
    }

    pub fn push_tool_result(
        &mut self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) {
        let msg = AgentMessage::tool_result(
            self.session.id.clone(),
            self.id.clone(),
            call_id,
            tool_name,
            content,
        );
        self.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn poll_returns_notifications_in_order_then_terminal_then_none() {
        let session = Session::new("task");
        session.notify(Notification::message("n1"));
        session.notify(Notification::message("n2"));
        session.notify(Notification::message("n3"));
        session.finish("done").expect("finish");

        assert_eq!(session.poll().await, Some(Notification::message("n1")));
        assert_eq!(session.poll().await, Some(Notification::message("n2")));
        assert_eq!(session.poll().await, Some(Notification::message("n3")));
        assert_eq!(
            session.poll().await,
            Some(Notification::Finished { result: "done".into() })
        );
        assert_eq!(session.poll().await, None);
        assert_eq!(session.poll().await, None);
    }

    #[tokio::test]
    async fn poll_waits_for_a_later_notification() {
        let session = Session::new("task");
        let poller = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.poll().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!poller.is_finished());

        session.notify(Notification::message("late"));
        let got = tokio::time::timeout(Duration::from_secs(1), poller)
            .await
            .expect("poll should wake")
            .expect("join");
        assert_eq!(got, Some(Notification::message("late")));
    }

    #[tokio::test]
    async fn poll_wakes_on_failure() {
        let session = Session::new("task");
        let poller = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.poll().await })
        };
        tokio::task::yield_now().await;
        session.fail("model unreachable").expect("fail");

        let got = tokio::time::timeout(Duration::from_secs(1), poller)
            .await
            .expect("poll should wake")
            .expect("join");
        assert_eq!(
            got,
            Some(Notification::Failed { message: "model unreachable".into() })
        );
    }

    #[test]
    fn terminal_transition_happens_once() {
        let session = Session::new("task");
        session.finish("a").expect("first finish");
        assert!(matches!(session.finish("b"), Err(SessionError::AlreadyTerminal(_))));
        assert!(matches!(session.fail("c"), Err(SessionError::AlreadyTerminal(_))));
        assert_eq!(session.state(), SessionState::Finished("a".into()));
    }

    #[test]
    fn notify_after_terminal_is_dropped() {
        let session = Session::new("task");
        session.fail("boom").expect("fail");
        session.notify(Notification::message("ignored"));
        assert!(matches!(session.try_poll(), Some(Notification::Failed { .. })));
        assert_eq!(session.try_poll(), None);
    }

    #[tokio::test]
    async fn open_callback_publishes_action_required_and_resolves() {
        let session = Session::new("task");
        let callback = session
            .open_callback(CallbackKind::ConfirmationRequest, "proceed?")
            .expect("open");
        let id = callback.id().clone();

        match session.try_poll() {
            Some(Notification::ActionRequired { kind, prompt, callback_id }) => {
                assert_eq!(kind, CallbackKind::ConfirmationRequest);
                assert_eq!(prompt, "proceed?");
                assert_eq!(callback_id, id);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
        assert_eq!(session.open_callbacks(), vec![id.clone()]);

        session.resolve(&id, "yes").expect("resolve");
        assert_eq!(callback.wait().await.expect("answer"), "yes");
        assert!(session.open_callbacks().is_empty());

        let err = session.resolve(&id, "again").expect_err("second resolve");
        assert!(matches!(err, SessionError::AlreadyResolved(_)));
    }

    #[test]
    fn resolve_unknown_callback_fails_with_not_found() {
        let session = Session::new("task");
        let err = session
            .resolve(&CallbackId::from("missing"), "x")
            .expect_err("unknown");
        assert!(matches!(err, SessionError::CallbackNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn failing_session_abandons_pending_callbacks() {
        let session = Session::new("task");
        let callback = session
            .open_callback(CallbackKind::InformationRequest, "name?")
            .expect("open");
        session.fail("stopped").expect("fail");
        assert!(matches!(callback.wait().await, Err(SessionError::Abandoned(_))));
        assert!(matches!(
            session.open_callback(CallbackKind::Message, "x"),
            Err(SessionError::AlreadyTerminal(_))
        ));
    }

    #[test]
    fn forked_threads_record_into_shared_history() {
        let session = Session::new("task");
        let mut parent = session.fork("parent task");
        parent.push_user("parent task");
        let mut child = session.fork("child task");
        child.push_user("child task");
        child.push_assistant("child done", Vec::new());
        parent.push_tool_result("call-1", "child", "child done");

        assert_eq!(parent.turns().len(), 2);
        assert_eq!(child.turns().len(), 2);
        assert_ne!(parent.id(), child.id());

        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].thread_id, *parent.id());
        assert_eq!(history[1].thread_id, *child.id());
        assert_eq!(history[3].role, Role::Tool);
    }

    struct Camera;

    #[async_trait]
    impl ActiveTool for Camera {
        fn label(&self) -> &str {
            "camera"
        }

        async fn screenshot(&self) -> Result<Vec<u8>, ToolError> {
            Ok(vec![1, 2, 3])
        }
    }

    #[tokio::test]
    async fn active_tool_is_a_weak_reference() {
        let session = Session::new("task");
        assert!(session.active_tool().is_none());

        let camera: Arc<dyn ActiveTool> = Arc::new(Camera);
        session.set_active_tool(Arc::downgrade(&camera));
        let tool = session.active_tool().expect("alive");
        assert_eq!(tool.screenshot().await.expect("shot"), vec![1, 2, 3]);
        drop(tool);

        drop(camera);
        assert!(session.active_tool().is_none());
    }
}
