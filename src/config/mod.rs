//! Configuration system (layered: code > env > config file).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::TERMINATION_SENTINEL;
use crate::error::{OctoragError, Result};

pub const DEFAULT_MODEL: &str = "anthropic:claude-3-7-sonnet-latest";
pub const DEFAULT_STEP_LIMIT: usize = 100;
pub const DEFAULT_THREAD_ID: &str = "1";
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;

/// Per-session knobs for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Model in `provider:model` form.
    pub model: String,
    /// Maximum agent invocations per run.
    pub step_limit: usize,
    pub thread_id: String,
    pub termination_sentinel: String,
    pub tool_timeout_secs: u64,
    /// Refuse tool calls outside the issuing agent's allow-list.
    pub enforce_allow_list: bool,
    /// Retry transient provider failures this many extra times.
    pub model_retries: u32,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Persist checkpoints here instead of keeping them in memory.
    pub checkpoint_dir: Option<PathBuf>,
    /// Streamable-HTTP MCP endpoint, e.g. `http://localhost:8000/mcp`. When
    /// set, the agents' tools are taken from this server.
    pub mcp_url: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            step_limit: DEFAULT_STEP_LIMIT,
            thread_id: DEFAULT_THREAD_ID.to_string(),
            termination_sentinel: TERMINATION_SENTINEL.to_string(),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            enforce_allow_list: false,
            model_retries: 0,
            max_tokens: None,
            temperature: None,
            checkpoint_dir: None,
            mcp_url: None,
        }
    }
}

impl SessionSettings {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    session: SessionSettings,
    #[serde(default)]
    api_keys: HashMap<String, String>,
    #[serde(default)]
    base_urls: HashMap<String, String>,
}

/// Layered configuration for OctoRAG.
///
/// Credentials and base URLs are shared behind `Arc<RwLock<..>>` so a clone
/// handed to a provider sees later `set_*` calls.
#[derive(Debug, Clone, Default)]
pub struct OctoragConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    pub session: SessionSettings,
}

impl OctoragConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the default config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = default_config_path();
        let mut config = if path.exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::new()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Environment only (after loading `.env` if present).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        let config = Self {
            session: file.session,
            ..Self::new()
        };
        for (provider, key) in file.api_keys {
            config.set_api_key(&provider, key);
        }
        for (provider, url) in file.base_urls {
            config.set_base_url(&provider, url);
        }
        Ok(config)
    }

    /// Overlay environment variables onto this config.
    pub fn apply_env(&mut self) -> Result<()> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let key_mappings = [
            ("ANTHROPIC_API_KEY", "anthropic"),
            ("GITHUB_TOKEN", "github"),
            ("GH_ACCESS_TOKEN", "github"),
        ];
        for (env_var, provider) in &key_mappings {
            if let Ok(key) = std::env::var(env_var) {
                if !key.is_empty() {
                    self.set_api_key(provider, key);
                }
            }
        }

        let url_mappings = [
            ("ANTHROPIC_BASE_URL", "anthropic"),
            ("GITHUB_API_BASE_URL", "github"),
        ];
        for (env_var, provider) in &url_mappings {
            if let Ok(url) = std::env::var(env_var) {
                self.set_base_url(provider, url);
            }
        }

        if let Ok(model) = std::env::var("OCTORAG_MODEL") {
            self.session.model = model;
        }
        if let Ok(thread_id) = std::env::var("OCTORAG_THREAD_ID") {
            self.session.thread_id = thread_id;
        }
        if let Ok(dir) = std::env::var("OCTORAG_CHECKPOINT_DIR") {
            self.session.checkpoint_dir = Some(PathBuf::from(dir));
        }
        if let Ok(url) = std::env::var("OCTORAG_MCP_URL") {
            self.session.mcp_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Ok(limit) = std::env::var("OCTORAG_STEP_LIMIT") {
            self.session.step_limit = limit.parse().map_err(|_| {
                OctoragError::Configuration(format!("OCTORAG_STEP_LIMIT is not a number: {limit}"))
            })?;
        }
        Ok(())
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        self.api_keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(provider.to_string(), key);
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.read().ok()?.get(provider).cloned()
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        self.base_urls
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(provider.to_string(), url);
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.read().ok()?.get(provider).cloned()
    }

    pub fn has_credentials(&self, provider: &str) -> bool {
        self.get_api_key(provider).is_some()
    }

    /// Reject settings that would make every run abort immediately.
    pub fn validate(&self) -> Result<()> {
        if self.session.step_limit == 0 {
            return Err(OctoragError::Configuration(
                "step_limit must be at least 1".into(),
            ));
        }
        if self.session.termination_sentinel.trim().is_empty() {
            return Err(OctoragError::Configuration(
                "termination_sentinel must not be empty".into(),
            ));
        }
        if self.session.thread_id.is_empty() {
            return Err(OctoragError::Configuration("thread_id must not be empty".into()));
        }
        Ok(())
    }
}

/// `~/.octorag`, or `.octorag` when no home directory is known.
pub fn default_octorag_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".octorag"))
        .unwrap_or_else(|| PathBuf::from(".octorag"))
}

pub fn default_config_path() -> PathBuf {
    default_octorag_dir().join("config.toml")
}
