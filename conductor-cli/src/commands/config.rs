//! Config command - Show the effective configuration

use clap::Args;
use conductor_core::{Config, Secrets};

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Create a secrets file template (mode 0600) if none exists
    #[arg(long)]
    pub init_secrets: bool,
}

fn or_default(value: Option<&str>) -> &str {
    value.unwrap_or("(default)")
}

fn key_status(key: &Option<String>) -> &'static str {
    if key.is_some() {
        "set"
    } else {
        "unset"
    }
}

impl ConfigArgs {
    /// Execute the config command
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if self.init_secrets {
            let path = Secrets::create_template()?;
            println!("Created secrets template: {}", path.display());
            println!();
        }

        let mut executor = config.executor.clone();
        Secrets::load()?.apply_to(&mut executor);

        let name = if executor.name.is_empty() {
            "claude"
        } else {
            executor.name.as_str()
        };

        println!("Conductor Configuration");
        println!("=======================");
        println!();
        println!("Executor: {}", name);
        match executor.timeout {
            Some(timeout) => println!("  timeout: {:?}", timeout),
            None => println!("  timeout: (none)"),
        }
        println!("  extra_flags: {:?}", executor.extra_flags);
        println!();

        println!("claude:");
        println!("  path: {}", executor.claude.path);
        println!("  model: {}", or_default(executor.claude.model.as_deref()));
        println!("  api_key: {}", key_status(&executor.claude.api_key));
        println!("codex:");
        println!("  path: {}", executor.codex.path);
        println!("  model: {}", or_default(executor.codex.model.as_deref()));
        println!("  api_key: {}", key_status(&executor.codex.api_key));
        println!("pi:");
        println!("  path: {}", executor.pi.path);
        println!("  provider: {}", or_default(executor.pi.provider.as_deref()));
        println!("  model: {}", or_default(executor.pi.model.as_deref()));
        println!("  api_key: {}", key_status(&executor.pi.api_key));
        println!("opencode:");
        println!("  path: {}", executor.opencode.path);
        println!("  model: {}", or_default(executor.opencode.model.as_deref()));
        println!("  api_key: {}", key_status(&executor.opencode.api_key));
        println!();

        for (label, path) in [
            ("Config file", Config::default_config_path()),
            ("Secrets file", Secrets::default_secrets_path()),
        ] {
            if let Some(path) = path {
                println!("{}: {}", label, path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }

        Ok(())
    }
}
