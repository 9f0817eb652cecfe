//! Configuration loading: TOML file discovery plus `STEWARD_*` environment overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gateway::Credentials;
use proto::ConfigError;
use serde::{Deserialize, Serialize};
use tools::NavigatorSettings;
use tracing::debug;

const CONFIG_FILE_NAME: &str = "steward.toml";
const CREDENTIAL_ENV_PREFIX: &str = "STEWARD_CREDENTIAL_";

/// Top-level steward configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model provider settings shared by every task kind.
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP transport bind address.
    #[serde(default)]
    pub server: ServerConfig,

    /// Navigator (Chromium) settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Named secrets handed to task construction.
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

const DEFAULT_MAX_TOOL_ROUNDS: usize = 30;

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

/// Agent model/provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// API key (env overrides applied at load time; see `Config::load`).
    #[serde(default)]
    pub api_key: String,
    /// Model ID sent with every chat request.
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible API base URL. `None` uses api.openai.com.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Maximum tool-call rounds per agent invocation before bailing out.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Replaces the built-in system prompt of the top-level agents.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: None,
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    /// Returns the base URL when one is configured and non-empty.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url.as_deref().filter(|url| !url.is_empty())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7410
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_quiescence_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run Chromium without a visible window.
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Per-action timeout; clamped to 1..=60 when the navigator is built.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How long the DOM must stay unmutated before an action counts as settled.
    #[serde(default = "default_quiescence_ms")]
    pub quiescence_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout_secs: default_timeout_secs(),
            quiescence_ms: default_quiescence_ms(),
        }
    }
}

impl BrowserConfig {
    pub fn navigator_settings(&self) -> NavigatorSettings {
        NavigatorSettings::new(self.headless, self.timeout_secs, self.quiescence_ms)
    }
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(Path::to_path_buf).or_else(|| {
            let cwd = std::env::current_dir().ok()?.join(CONFIG_FILE_NAME);
            if cwd.exists() {
                return Some(cwd);
            }
            let home_config = Self::home_dir()?.join("config.toml");
            home_config.exists().then_some(home_config)
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        config.apply_env(std::env::vars())?;
        config.validate()?;

        debug!(
            model = %config.agent.model,
            base_url = ?config.agent.effective_base_url(),
            port = config.server.port,
            credentials = config.credentials.len(),
            "Config loaded"
        );
        Ok(config)
    }

    /// `~/.steward`, when `HOME` is set.
    pub fn home_dir() -> Option<PathBuf> {
        let home = std::env::var("HOME").ok()?;
        Some(PathBuf::from(home).join(".steward"))
    }

    fn apply_env(&mut self, vars: impl Iterator<Item = (String, String)>) -> Result<(), ConfigError> {
        for (key, value) in vars {
            match key.as_str() {
                "STEWARD_API_KEY" => self.agent.api_key = value,
                "STEWARD_MODEL" => self.agent.model = value,
                "STEWARD_BASE_URL" => self.agent.base_url = Some(value),
                "STEWARD_PORT" => {
                    self.server.port = value.parse().map_err(|_| ConfigError::InvalidValue {
                        field: "STEWARD_PORT".to_string(),
                        reason: format!("'{value}' is not a port number"),
                    })?;
                }
                "STEWARD_HEADLESS" => {
                    self.browser.headless =
                        !matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "no");
                }
                _ => {
                    if let Some(name) = key.strip_prefix(CREDENTIAL_ENV_PREFIX)
                        && !name.is_empty()
                    {
                        self.credentials.insert(name.to_lowercase(), value);
                    }
                }
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.model.trim().is_empty() {
            return Err(ConfigError::MissingField("agent.model".to_string()));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agent.max_tool_rounds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the API key: `agent.api_key` (or `STEWARD_API_KEY`), then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> String {
        if !self.agent.api_key.is_empty() {
            debug!(source = "config", "API key resolved");
            return self.agent.api_key.clone();
        }
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => {
                debug!(source = "OPENAI_API_KEY", "API key resolved");
                key
            }
            _ => String::new(),
        }
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{remove_env_var, set_env_var, with_locked_env};

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, content).expect("write config");
    }

    fn env(pairs: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.model, "gpt-4o");
        assert_eq!(cfg.agent.max_tool_rounds, 30);
        assert_eq!(cfg.agent.effective_base_url(), None);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 7410);
        assert!(cfg.browser.headless);
        assert_eq!(cfg.browser.timeout_secs, 15);
        assert_eq!(cfg.browser.quiescence_ms, 500);
        assert!(cfg.credentials.is_empty());
    }

    #[test]
    fn load_reads_explicit_file_path() {
        with_locked_env(|| {
            let tmp = tempfile::tempdir().expect("tempdir");
            let config_path = tmp.path().join("custom.toml");
            write_file(
                &config_path,
                r#"
[agent]
model = "gpt-4.1-mini"
api_key = "from_file"
max_tool_rounds = 7
base_url = "https://example.com/v1"

[server]
host = "0.0.0.0"
port = 9000

[browser]
headless = false
timeout_secs = 90

[credentials]
mail_token = "secret"
"#,
            );
            let cfg = Config::load(Some(&config_path)).expect("config should parse");
            assert_eq!(cfg.agent.model, "gpt-4.1-mini");
            assert_eq!(cfg.agent.max_tool_rounds, 7);
            assert_eq!(cfg.agent.effective_base_url(), Some("https://example.com/v1"));
            assert_eq!(cfg.server.host, "0.0.0.0");
            assert_eq!(cfg.server.port, 9000);
            assert!(!cfg.browser.headless);
            assert_eq!(cfg.browser.navigator_settings().timeout.as_secs(), 60);
            assert_eq!(cfg.credentials().get("mail_token"), Some("secret"));
        });
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("STEWARD_API_KEY", "env-key"),
            ("STEWARD_MODEL", "gpt-4.1"),
            ("STEWARD_BASE_URL", "http://localhost:11434/v1"),
            ("STEWARD_PORT", "8088"),
            ("STEWARD_HEADLESS", "false"),
            ("STEWARD_CREDENTIAL_MAIL_TOKEN", "abc"),
            ("UNRELATED", "ignored"),
        ]))
        .expect("apply env");
        assert_eq!(cfg.agent.api_key, "env-key");
        assert_eq!(cfg.agent.model, "gpt-4.1");
        assert_eq!(cfg.agent.effective_base_url(), Some("http://localhost:11434/v1"));
        assert_eq!(cfg.server.port, 8088);
        assert!(!cfg.browser.headless);
        assert_eq!(cfg.credentials.get("mail_token").map(String::as_str), Some("abc"));
        assert_eq!(cfg.credentials.len(), 1);
    }

    #[test]
    fn invalid_port_env_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env(env(&[("STEWARD_PORT", "eighty")]))
            .expect_err("bad port must fail");
        assert!(err.to_string().contains("STEWARD_PORT"));
    }

    #[test]
    fn load_falls_back_to_home_config() {
        with_locked_env(|| {
            let tmp = tempfile::tempdir().expect("tempdir");
            let original_home = std::env::var("HOME").ok();
            set_env_var("HOME", tmp.path().to_string_lossy().as_ref());
            write_file(
                &tmp.path().join(".steward").join("config.toml"),
                "[server]\nport = 7999\n",
            );

            let cfg = Config::load(None).expect("home config should load");
            assert_eq!(cfg.server.port, 7999);

            match original_home {
                Some(home) => set_env_var("HOME", &home),
                None => remove_env_var("HOME"),
            }
        });
    }

    #[test]
    fn load_returns_toml_error_for_invalid_content() {
        with_locked_env(|| {
            let tmp = tempfile::tempdir().expect("tempdir");
            let config_path = tmp.path().join("steward.toml");
            write_file(&config_path, "[agent\nmodel = \"broken\"");
            let err = Config::load(Some(&config_path)).expect_err("invalid toml must fail");
            assert!(err.to_string().contains("TOML parse error"));
        });
    }

    #[test]
    fn load_rejects_zero_tool_rounds() {
        with_locked_env(|| {
            let tmp = tempfile::tempdir().expect("tempdir");
            let config_path = tmp.path().join("steward.toml");
            write_file(&config_path, "[agent]\nmax_tool_rounds = 0\n");
            let err = Config::load(Some(&config_path)).expect_err("zero rounds must fail");
            assert!(err.to_string().contains("max_tool_rounds"));
        });
    }
}
