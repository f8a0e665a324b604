//! Conductor Core - invocation layer for command-line AI coding agents
//!
//! This crate launches an agent CLI (Claude Code, Codex, pi or OpenCode) on a
//! prompt, streams its structured output into one uniform event vocabulary,
//! and returns the final text.

pub mod agent;
pub mod config;
pub mod error;
pub mod protocol;
pub mod secrets;

pub use agent::{new_invoker, InvokeHandler, InvokeOptions, InvokeResult, Invoker};
pub use config::{Config, ExecutorConfig};
pub use error::{Error, Result};
pub use secrets::Secrets;
