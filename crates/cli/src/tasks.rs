//! Built-in task kinds registered with the dispatch service.

use std::sync::Arc;

use agent::{Agent, LlmProvider, OpenAiProvider, ToolRegistry};
use gateway::{Credentials, TaskCatalog};
use proto::GatewayError;
use tools::{AskHumanTool, ConfirmTool, Navigator, NavigatorSettings, TellTool};
use tracing::debug;

use crate::config::Config;

/// Credential name the model API key is stored under.
pub const API_KEY_CREDENTIAL: &str = "openai_api_key";

const ECHO_PROMPT: &str = "Answer the instruction directly and concisely. You have no tools.";

const BROWSER_PROMPT: &str = "You operate a web browser through element ids. \
Call browser.open to load a page; every browser tool returns a snapshot with the page title, \
url, epoch, and a table of interactive elements keyed by integer id. Act on elements only by \
those ids (browser.click, browser.fill, browser.select, browser.enter), always passing the \
epoch of the snapshot the id came from. Ids are only valid for the epoch they were issued in; \
after a navigation use the ids from the new snapshot. Use browser.scroll to reveal more of the page and \
browser.collect to read repeated items such as search results in batches. \
Reply with a plain-text summary of what you found or did.";

const ASSISTANT_PROMPT: &str = "You are a careful assistant acting on the user's behalf. \
Delegate anything that needs a website to browser_agent with a self-contained task. \
Use human.ask when information is missing and human.confirm before any action that \
spends money, submits a form, or cannot be undone. Use human.tell for progress updates. \
Finish with a short answer for the user.";

#[derive(Clone)]
struct ModelSettings {
    model: String,
    base_url: Option<String>,
    max_tool_rounds: usize,
    system_prompt: Option<String>,
}

impl ModelSettings {
    fn provider(&self, credentials: &Credentials) -> Arc<dyn LlmProvider> {
        let api_key = credentials.get(API_KEY_CREDENTIAL).unwrap_or_default();
        match &self.base_url {
            Some(url) => Arc::new(OpenAiProvider::with_base_url(api_key, url.clone())),
            None => Arc::new(OpenAiProvider::new(api_key)),
        }
    }

    fn agent(&self, name: &str, credentials: &Credentials, default_prompt: &str) -> Agent {
        let prompt = self.system_prompt.as_deref().unwrap_or(default_prompt);
        Agent::new(name, self.provider(credentials), self.model.clone())
            .with_system_prompt(prompt)
            .with_max_tool_rounds(self.max_tool_rounds)
    }
}

fn setup_failed(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::BadRequest(format!("task setup failed: {err}"))
}

fn browser_agent(
    name: &str,
    model: &ModelSettings,
    credentials: &Credentials,
    settings: NavigatorSettings,
) -> Result<Agent, GatewayError> {
    let navigator = Navigator::new(settings);
    let mut registry = ToolRegistry::new();
    for tool in navigator.tools() {
        registry.register(tool).map_err(setup_failed)?;
    }
    Ok(model
        .agent(name, credentials, BROWSER_PROMPT)
        .with_description(
            "Drives a web browser to complete a self-contained task and reports what it found",
        )
        .with_tools(registry))
}

/// Builds the catalog with the `echo`, `browser`, and `assistant` kinds.
///
/// Every kind needs the model API key unless a custom base URL is configured,
/// since local OpenAI-compatible servers usually accept any key.
pub fn build_catalog(config: &Config) -> TaskCatalog {
    let mut credentials = config.credentials();
    let api_key = config.resolve_api_key();
    if !api_key.is_empty() {
        credentials.insert(API_KEY_CREDENTIAL, api_key);
    }
    let required: &[&str] = if config.agent.effective_base_url().is_some() {
        &[]
    } else {
        &[API_KEY_CREDENTIAL]
    };

    let model = ModelSettings {
        model: config.agent.model.clone(),
        base_url: config.agent.effective_base_url().map(str::to_string),
        max_tool_rounds: config.agent.max_tool_rounds,
        system_prompt: config.agent.system_prompt.clone(),
    };
    let navigator_settings = config.browser.navigator_settings();

    let mut catalog = TaskCatalog::new(credentials);

    let echo_model = model.clone();
    catalog.register("echo", required, move |creds| {
        Ok(echo_model.agent("echo", creds, ECHO_PROMPT))
    });

    let browser_model = model.clone();
    let browser_settings = navigator_settings.clone();
    catalog.register("browser", required, move |creds| {
        browser_agent("browser", &browser_model, creds, browser_settings.clone())
    });

    catalog.register("assistant", required, move |creds| {
        // The prompt override targets the top-level agent only.
        let delegate_model = ModelSettings {
            system_prompt: None,
            ..model.clone()
        };
        let delegate = browser_agent(
            "browser_agent",
            &delegate_model,
            creds,
            navigator_settings.clone(),
        )?;
        let mut registry = ToolRegistry::new();
        registry.register(AskHumanTool).map_err(setup_failed)?;
        registry.register(ConfirmTool).map_err(setup_failed)?;
        registry.register(TellTool).map_err(setup_failed)?;
        registry
            .register(Arc::new(delegate).into_tool())
            .map_err(setup_failed)?;
        debug!(tools = ?registry.tool_names(), "Assistant tool set built");
        Ok(model
            .agent("assistant", creds, ASSISTANT_PROMPT)
            .with_tools(registry))
    });

    catalog
}
