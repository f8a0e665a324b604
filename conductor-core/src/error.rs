//! Error types for Conductor

use std::process::ExitStatus;

use thiserror::Error;

/// Result type alias for Conductor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Conductor operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Agent process could not be started or wired up
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Agent process ran but exited unsuccessfully
    #[error("{backend} exited: {status}{}", stderr_section(.stderr))]
    Exited {
        backend: String,
        status: ExitStatus,
        /// Captured stderr, trimmed; `None` when the process wrote nothing
        stderr: Option<String>,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

fn stderr_section(stderr: &Option<String>) -> String {
    match stderr {
        Some(text) => format!("\nstderr: {}", text),
        None => String::new(),
    }
}
