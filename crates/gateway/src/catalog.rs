//! Task kinds, their credential requirements and the agents they build.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use agent::Agent;
use proto::GatewayError;
use tracing::debug;

/// Named secrets handed to task factories at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the credential when present and non-empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

type AgentFactory = dyn Fn(&Credentials) -> Result<Agent, GatewayError> + Send + Sync;

struct TaskKind {
    factory: Arc<AgentFactory>,
    required: Vec<String>,
}

/// Registry of startable task kinds.
///
/// Each start builds a fresh agent so stateful tools are never shared
/// between sessions.
pub struct TaskCatalog {
    kinds: HashMap<String, TaskKind>,
    credentials: Credentials,
}

impl TaskCatalog {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            kinds: HashMap::new(),
            credentials,
        }
    }

    /// Declares a task kind. A later registration under the same name replaces it.
    pub fn register<F>(&mut self, kind: impl Into<String>, required: &[&str], factory: F)
    where
        F: Fn(&Credentials) -> Result<Agent, GatewayError> + Send + Sync + 'static,
    {
        let kind = kind.into();
        debug!(kind = %kind, ?required, "Registering task kind");
        self.kinds.insert(
            kind,
            TaskKind {
                factory: Arc::new(factory),
                required: required.iter().map(|s| s.to_string()).collect(),
            },
        );
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds the agent for `kind`, checking its required credentials first.
    pub fn build(&self, kind: &str) -> Result<Agent, GatewayError> {
        let entry = self
            .kinds
            .get(kind)
            .ok_or_else(|| GatewayError::UnsupportedTaskKind(kind.to_string()))?;
        if let Some(missing) = entry
            .required
            .iter()
            .find(|name| !self.credentials.contains(name))
        {
            return Err(GatewayError::Unauthorized(missing.clone()));
        }
        (entry.factory)(&self.credentials)
    }
}
