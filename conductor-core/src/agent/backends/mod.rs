//! Backend abstraction for AI coding agents

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::ExecutorConfig;
use crate::{Error, Result};

use super::output::{InvokeHandler, InvokeOptions, InvokeResult};

mod claude;
mod codex;
mod opencode;
mod pi;

pub use claude::ClaudeInvoker;
pub use codex::CodexInvoker;
pub use opencode::OpenCodeInvoker;
pub use pi::PiInvoker;

/// Backend names accepted by [`new_invoker`]
pub const SUPPORTED_BACKENDS: [&str; 4] = ["claude", "codex", "pi", "opencode"];

/// Trait for AI coding agent backends
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &'static str;

    /// Executable this backend runs
    fn program(&self) -> &str;

    /// Build the fully configured command: argv, environment, working directory
    fn build_command(&self, prompt: &str, opts: &InvokeOptions) -> Command;

    /// Run the agent on `prompt`, reporting progress to `handler`
    async fn invoke(
        &self,
        prompt: &str,
        opts: &InvokeOptions,
        handler: &mut dyn InvokeHandler,
    ) -> Result<InvokeResult>;

    /// Check if this backend is available on the system
    fn is_available(&self) -> bool {
        which::which(self.program()).is_ok()
    }
}

/// The supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    #[default]
    Claude,
    Codex,
    Pi,
    OpenCode,
}

impl BackendKind {
    /// Get all backend kinds
    pub fn all() -> &'static [BackendKind] {
        &[
            BackendKind::Claude,
            BackendKind::Codex,
            BackendKind::Pi,
            BackendKind::OpenCode,
        ]
    }

    /// Get the name used in configuration
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Claude => "claude",
            BackendKind::Codex => "codex",
            BackendKind::Pi => "pi",
            BackendKind::OpenCode => "opencode",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    /// Empty selects claude
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "claude" => Ok(BackendKind::Claude),
            "codex" => Ok(BackendKind::Codex),
            "pi" => Ok(BackendKind::Pi),
            "opencode" => Ok(BackendKind::OpenCode),
            other => Err(Error::Config(format!(
                "unknown executor: {:?} (supported: {})",
                other,
                SUPPORTED_BACKENDS.join(", ")
            ))),
        }
    }
}

fn invoker_for(kind: BackendKind, config: &ExecutorConfig) -> Box<dyn Invoker> {
    match kind {
        BackendKind::Claude => Box::new(ClaudeInvoker::new(config.claude.clone())),
        BackendKind::Codex => Box::new(CodexInvoker::new(config.codex.clone())),
        BackendKind::Pi => Box::new(PiInvoker::new(config.pi.clone())),
        BackendKind::OpenCode => Box::new(OpenCodeInvoker::new(config.opencode.clone())),
    }
}

/// Create the invoker named by `config.name`
pub fn new_invoker(config: &ExecutorConfig) -> Result<Box<dyn Invoker>> {
    let kind: BackendKind = config.name.parse()?;
    Ok(invoker_for(kind, config))
}

/// Registry of configured backends
pub struct InvokerRegistry {
    invokers: BTreeMap<String, Box<dyn Invoker>>,
}

impl InvokerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            invokers: BTreeMap::new(),
        }
    }

    /// Create a registry holding every backend, configured from `config`
    pub fn from_config(config: &ExecutorConfig) -> Self {
        let mut registry = Self::new();
        for kind in BackendKind::all() {
            registry.register(invoker_for(*kind, config));
        }
        registry
    }

    /// Register an invoker, replacing any with the same name
    pub fn register(&mut self, invoker: Box<dyn Invoker>) {
        self.invokers.insert(invoker.name().to_string(), invoker);
    }

    /// Get an invoker by name
    pub fn get(&self, name: &str) -> Option<&dyn Invoker> {
        self.invokers.get(name).map(|b| b.as_ref())
    }

    /// Get an invoker by kind
    pub fn get_by_kind(&self, kind: BackendKind) -> Option<&dyn Invoker> {
        self.get(kind.name())
    }

    /// List all available backends (executables found on PATH)
    pub fn list_available(&self) -> Vec<&str> {
        self.invokers
            .values()
            .filter(|b| b.is_available())
            .map(|b| b.name())
            .collect()
    }

    /// List all registered backends (whether available or not)
    pub fn list_registered(&self) -> Vec<&str> {
        self.invokers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for InvokerRegistry {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

/// Argument vector of a built command, for tests
#[cfg(test)]
pub(crate) fn argv(cmd: &Command) -> Vec<String> {
    cmd.as_std()
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

/// Environment a built command will pass to its child, for tests
///
/// Only meaningful for commands built with `env_clear`.
#[cfg(test)]
pub(crate) fn env_of(cmd: &Command, name: &str) -> Option<String> {
    cmd.as_std()
        .get_envs()
        .find(|(k, _)| *k == name)
        .and_then(|(_, v)| v)
        .map(|v| v.to_string_lossy().into_owned())
}
