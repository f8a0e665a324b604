//! Configuration management for Conductor
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (CONDUCTOR_*)
//! 3. Config file (~/.config/conductor/config.toml)
//! 4. Default values
//!
//! API keys never come from here; see [`crate::secrets`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Settings for the claude backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClaudeConfig {
    /// Path to the claude executable
    pub path: String,
    /// Model passed as `--model`
    pub model: Option<String>,
    /// Value for `CLAUDE_CONFIG_DIR`
    pub config_dir: Option<PathBuf>,
    /// Value for `ANTHROPIC_API_KEY`, filled from the secrets file
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            path: "claude".to_string(),
            model: None,
            config_dir: None,
            api_key: None,
        }
    }
}

/// Settings for the codex backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CodexConfig {
    pub path: String,
    /// Model passed as `-m`
    pub model: Option<String>,
    /// Value for `CODEX_HOME`
    pub config_dir: Option<PathBuf>,
    /// Value for `OPENAI_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for CodexConfig {
    fn default() -> Self {
        Self {
            path: "codex".to_string(),
            model: None,
            config_dir: None,
            api_key: None,
        }
    }
}

/// Settings for the pi backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PiConfig {
    pub path: String,
    /// Provider passed as `--provider`; also selects the API key variable
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Value for `PI_CODING_AGENT_DIR`
    pub config_dir: Option<PathBuf>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for PiConfig {
    fn default() -> Self {
        Self {
            path: "pi".to_string(),
            provider: None,
            model: None,
            config_dir: None,
            api_key: None,
        }
    }
}

/// Settings for the opencode backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenCodeConfig {
    pub path: String,
    /// `provider/model`; the provider prefix selects the API key variable
    pub model: Option<String>,
    /// Value for `OPENCODE_CONFIG_DIR`
    pub config_dir: Option<PathBuf>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OpenCodeConfig {
    fn default() -> Self {
        Self {
            path: "opencode".to_string(),
            model: None,
            config_dir: None,
            api_key: None,
        }
    }
}

/// Which executor to run and how
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Backend name; empty selects claude
    pub name: String,

    /// Deadline per invocation, e.g. "20m"
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Flags appended to every invocation
    pub extra_flags: Vec<String>,

    pub claude: ClaudeConfig,
    pub codex: CodexConfig,
    pub pi: PiConfig,
    pub opencode: OpenCodeConfig,
}

impl ExecutorConfig {
    /// Model configured for the named backend
    pub fn model(&self) -> Option<&str> {
        match self.name.as_str() {
            "codex" => self.codex.model.as_deref(),
            "pi" => self.pi.model.as_deref(),
            "opencode" => self.opencode.model.as_deref(),
            _ => self.claude.model.as_deref(),
        }
    }

    /// Set the model on the selected backend
    pub fn set_model(&mut self, model: String) {
        let slot = match self.name.as_str() {
            "codex" => &mut self.codex.model,
            "pi" => &mut self.pi.model,
            "opencode" => &mut self.opencode.model,
            _ => &mut self.claude.model,
        };
        *slot = Some(model);
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Executor configuration
    pub executor: ExecutorConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/conductor/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("conductor").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - CONDUCTOR_EXECUTOR: Backend name
    /// - CONDUCTOR_MODEL: Model for the selected backend
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(executor) = var("CONDUCTOR_EXECUTOR").filter(|v| !v.is_empty()) {
            self.executor.name = executor;
        }

        if let Some(model) = var("CONDUCTOR_MODEL").filter(|v| !v.is_empty()) {
            self.executor.set_model(model);
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, executor: Option<String>, model: Option<String>) -> Self {
        if let Some(name) = executor {
            self.executor.name = name;
        }

        if let Some(m) = model {
            self.executor.set_model(m);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(executor: Option<String>, model: Option<String>) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(executor, model))
    }
}
