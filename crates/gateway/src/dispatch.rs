//! Dispatch service: starts tasks, relays notifications, and routes answers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use agent::Agent;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::FutureExt;
use proto::{CallbackId, GatewayError, Notification, SessionId};
use serde::Serialize;
use session::Session;
use tracing::{debug, error, info, warn};

use crate::catalog::TaskCatalog;

/// Liveness payload returned by [`DispatchService::ping`].
#[derive(Debug, Clone, Serialize)]
pub struct PingStatus {
    pub status: &'static str,
    pub active_sessions: usize,
    pub timestamp: DateTime<Utc>,
}

/// Owns the session registry and runs one agent loop per started task.
pub struct DispatchService {
    catalog: TaskCatalog,
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl DispatchService {
    pub fn new(catalog: TaskCatalog) -> Self {
        Self {
            catalog,
            sessions: DashMap::new(),
        }
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// Builds the agent for `kind`, registers a session, and spawns its loop.
    ///
    /// Must be called inside a tokio runtime. The loop is never awaited here.
    pub fn start_task(&self, kind: &str, instruction: &str) -> Result<SessionId, GatewayError> {
        let agent = self.catalog.build(kind)?;
        let session = Session::new(instruction);
        let id = session.id().clone();
        self.sessions.insert(id.clone(), Arc::clone(&session));
        info!(session_id = %id, kind = %kind, "Task started");

        tokio::spawn(drive(agent, session));
        Ok(id)
    }

    /// Returns the next notification, waiting while the session runs.
    ///
    /// The session is released once its terminal notification has been
    /// delivered; every later call fails with `SessionNotFound`.
    pub async fn fetch(&self, id: &SessionId) -> Result<Notification, GatewayError> {
        let session = self.lookup(id)?;
        match session.poll().await {
            Some(notification) => {
                if notification.is_terminal() {
                    self.release(id);
                }
                Ok(notification)
            }
            None => {
                self.release(id);
                Err(GatewayError::SessionNotFound(id.to_string()))
            }
        }
    }

    /// Resolves an open callback of a live session.
    pub fn submit_answer(
        &self,
        id: &SessionId,
        callback_id: &CallbackId,
        answer: &str,
    ) -> Result<(), GatewayError> {
        let session = self.lookup(id)?;
        session.resolve(callback_id, answer)?;
        Ok(())
    }

    /// Captures the session's active stateful tool as PNG bytes.
    pub async fn screenshot(&self, id: &SessionId) -> Result<Vec<u8>, GatewayError> {
        let session = self.lookup(id)?;
        let tool = session.active_tool().ok_or_else(|| {
            GatewayError::BadRequest(format!("session {id} has no active stateful tool"))
        })?;
        debug!(session_id = %id, tool = %tool.label(), "Capturing screenshot");
        tool.screenshot()
            .await
            .map_err(|e| GatewayError::Connection(format!("{} screenshot failed: {e}", tool.label())))
    }

    pub fn ping(&self) -> PingStatus {
        PingStatus {
            status: "ok",
            active_sessions: self.sessions.len(),
            timestamp: Utc::now(),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn lookup(&self, id: &SessionId) -> Result<Arc<Session>, GatewayError> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GatewayError::SessionNotFound(id.to_string()))
    }

    fn release(&self, id: &SessionId) {
        if self.sessions.remove(id).is_some() {
            debug!(session_id = %id, "Session released");
        }
    }
}

/// Runs the agent loop to completion, then releases tool resources and
/// publishes the terminal notification.
async fn drive(agent: Agent, session: Arc<Session>) {
    let started = Instant::now();
    let outcome = AssertUnwindSafe(agent.run(session.instruction(), &session))
        .catch_unwind()
        .await;

    agent.registry().close_all().await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let terminal = match outcome {
        Ok(Ok(result)) => {
            info!(session_id = %session.id(), elapsed_ms, "Task finished");
            session.finish(result)
        }
        Ok(Err(e)) => {
            warn!(session_id = %session.id(), elapsed_ms, error = %e, "Task failed");
            session.fail(e.to_string())
        }
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            error!(session_id = %session.id(), elapsed_ms, reason = %reason, "Agent loop panicked");
            session.fail(format!("Agent loop panicked: {reason}"))
        }
    };
    if let Err(e) = terminal {
        debug!(session_id = %session.id(), error = %e, "Session was already terminal");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
