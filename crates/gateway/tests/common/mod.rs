#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agent::{Agent, ChatMessage, ChatRequest, ChatResponse, LlmProvider, ToolRegistry};
use async_trait::async_trait;
use gateway::{Credentials, DispatchService, TaskCatalog};
use proto::{LlmError, Notification, SessionId};
use tokio::time::{Duration, timeout};

/// Replays canned responses and records every request's messages.
pub struct ScriptedLlm {
    queue: Mutex<VecDeque<ChatResponse>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::from(responses)),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().expect("lock seen").clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.seen.lock().expect("lock seen").push(req.messages);
        self.queue
            .lock()
            .expect("lock queue")
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string()))
    }
}

/// A catalog with one kind whose agent uses `llm` and the tools built by `tools`.
pub fn single_kind_service<F>(kind: &str, llm: Arc<ScriptedLlm>, tools: F) -> Arc<DispatchService>
where
    F: Fn() -> ToolRegistry + Send + Sync + 'static,
{
    let mut catalog = TaskCatalog::new(Credentials::new());
    let name = kind.to_string();
    catalog.register(kind, &[], move |_| {
        Ok(Agent::new(name.clone(), llm.clone(), "test-model").with_tools(tools()))
    });
    Arc::new(DispatchService::new(catalog))
}

pub async fn next(service: &DispatchService, id: &SessionId) -> Notification {
    timeout(Duration::from_secs(5), service.fetch(id))
        .await
        .expect("timed out waiting for notification")
        .expect("fetch should succeed")
}
