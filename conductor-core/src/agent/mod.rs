//! Agent module for launching coding-agent CLIs and normalizing their output

pub mod backends;
pub mod env;
pub mod hooks;
pub mod output;
mod spawn;
mod stream;
pub mod usage;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::{
    new_invoker, BackendKind, ClaudeInvoker, CodexInvoker, Invoker, InvokerRegistry,
    OpenCodeInvoker, PiInvoker, SUPPORTED_BACKENDS,
};
pub use env::{build_env, EnvSpec};
pub use hooks::{build_hook_settings, HookConfig};
pub use output::{InvokeHandler, InvokeOptions, InvokeResult, PrintHandler};
pub use usage::{TokenUsage, UsageLedger};
