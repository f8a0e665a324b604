//! Secrets management for Conductor
//!
//! Provider API keys are stored separately from configuration to avoid
//! accidental sharing. The secrets file is located at
//! `~/.config/conductor/secrets.toml` and must have restrictive permissions
//! (0600 on Unix).
//!
//! Keys are never taken from the process environment: an agent only receives
//! a key that was written here for its backend.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use crate::{Error, Result};

/// Secrets structure, one table per backend
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    pub claude: BackendSecrets,
    pub codex: BackendSecrets,
    pub pi: BackendSecrets,
    pub opencode: BackendSecrets,
}

/// Credentials for one backend
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendSecrets {
    /// Provider API key handed to the agent process
    pub api_key: Option<String>,
}

impl BackendSecrets {
    fn key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        let secrets_path = Self::default_secrets_path();

        if let Some(path) = secrets_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        // Check file permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = std::fs::metadata(path)?;
            let mode = metadata.permissions().mode();

            // Readable by group or others
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }

            debug!(path = %path.display(), mode = format!("{:o}", mode & 0o777), "Secrets file permissions OK");
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/conductor/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("conductor").join("secrets.toml"))
    }

    /// Copy each backend's key into its executor settings
    ///
    /// Whitespace is trimmed and empty keys count as unset.
    pub fn apply_to(&self, executor: &mut ExecutorConfig) {
        executor.claude.api_key = self.claude.key();
        executor.codex.api_key = self.codex.key();
        executor.pi.api_key = self.pi.key();
        executor.opencode.api_key = self.opencode.key();
    }

    /// Create a template secrets file at the default location
    ///
    /// Creates parent directories if needed and sets secure permissions
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;
        Self::create_template_at(&path)?;
        Ok(path)
    }

    /// Create a template secrets file at `path`
    pub fn create_template_at(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Don't overwrite existing file
        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        let template = r#"# Conductor Secrets
# This file contains sensitive credentials - do not share or commit to version control
#
# IMPORTANT: This file must have restrictive permissions (chmod 600)
#
# Each agent only ever sees the key in its own table. Keys in your shell
# environment are not passed through.

[claude]
# Sent as ANTHROPIC_API_KEY
api_key = ""

[codex]
# Sent as OPENAI_API_KEY
api_key = ""

[pi]
# Sent as the variable matching [executor.pi] provider
api_key = ""

[opencode]
# Sent as the variable matching the provider prefix of [executor.opencode] model
api_key = ""
"#;

        std::fs::write(path, template)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        warn!(path = %path.display(), "Created secrets template - please edit and add your keys");

        Ok(())
    }
}
