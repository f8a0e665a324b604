//! Backends command - List backends and their availability

use clap::Args;
use conductor_core::agent::{BackendKind, InvokerRegistry};
use conductor_core::Config;

/// Arguments for the backends command
#[derive(Args, Debug)]
pub struct BackendsArgs {
    /// Only list backends whose executable is on PATH
    #[arg(long)]
    pub available: bool,
}

impl BackendsArgs {
    /// Execute the backends command
    pub fn execute(&self, config: &Config) {
        let registry = InvokerRegistry::from_config(&config.executor);

        if self.available {
            for name in registry.list_available() {
                println!("{}", name);
            }
            return;
        }

        let selected = config.executor.name.parse::<BackendKind>().ok();
        for name in registry.list_registered() {
            let Some(invoker) = registry.get(name) else {
                continue;
            };
            let marker = if selected.map(|k| k.name()) == Some(name) {
                "*"
            } else {
                " "
            };
            let status = if invoker.is_available() {
                "installed"
            } else {
                "not found"
            };
            println!("{} {:<10} {:<10} {}", marker, name, status, invoker.program());
        }
    }
}
