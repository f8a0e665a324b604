//! CLI command implementations

pub mod backends;
pub mod config;
pub mod invoke;

pub use backends::BackendsArgs;
pub use config::ConfigArgs;
pub use invoke::InvokeArgs;
