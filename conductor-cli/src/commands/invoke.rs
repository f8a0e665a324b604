//! Invoke command - Run an agent on a prompt

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use conductor_core::agent::{build_hook_settings, HookConfig, PrintHandler};
use conductor_core::{new_invoker, Config, InvokeOptions, Secrets};
use tokio::io::AsyncReadExt;

/// Arguments for the invoke command
#[derive(Args, Debug)]
pub struct InvokeArgs {
    /// The task prompt (read from stdin when omitted)
    pub prompt: Option<String>,

    /// Working directory for the agent (defaults to current directory)
    #[arg(short = 'd', long)]
    pub workdir: Option<PathBuf>,

    /// Use the backend's structured streaming protocol
    #[arg(long)]
    pub stream: bool,

    /// Give up after this many seconds (overrides config)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Extra flag passed verbatim to the agent CLI (repeatable)
    #[arg(long = "flag", allow_hyphen_values = true)]
    pub flags: Vec<String>,

    /// Settings JSON passed to claude's --settings
    #[arg(long, conflicts_with_all = ["guard", "permission_socket"])]
    pub settings: Option<String>,

    /// Route Bash tool calls through the dcg guard (claude only)
    #[arg(long)]
    pub guard: bool,

    /// Gate every tool call through the permission server at this socket (claude only)
    #[arg(long)]
    pub permission_socket: Option<PathBuf>,
}

impl InvokeArgs {
    /// Execute the invoke command
    pub async fn execute(&self, verbose: bool, mut config: Config) -> anyhow::Result<()> {
        let prompt = match self.prompt {
            Some(ref prompt) => prompt.clone(),
            None => read_stdin().await?,
        };
        anyhow::ensure!(!prompt.trim().is_empty(), "prompt is empty");

        Secrets::load()?.apply_to(&mut config.executor);
        let invoker = new_invoker(&config.executor)?;

        let opts = self.options(&config)?;

        tracing::info!(
            backend = invoker.name(),
            model = ?config.executor.model(),
            streaming = opts.streaming,
            timeout = ?opts.timeout,
            "Invoking agent"
        );

        let mut handler = PrintHandler::new(verbose);
        let result = invoker
            .invoke(&prompt, &opts, &mut handler)
            .await
            .with_context(|| format!("{} invocation failed", invoker.name()))?;

        if result.timed_out {
            println!("{}", result.text);
            eprintln!("{} timed out", invoker.name());
        }

        Ok(())
    }

    fn options(&self, config: &Config) -> anyhow::Result<InvokeOptions> {
        let workdir = match self.workdir {
            Some(ref dir) if dir.is_absolute() => dir.clone(),
            Some(ref dir) => std::env::current_dir()?.join(dir),
            None => std::env::current_dir()?,
        };

        let mut flags = config.executor.extra_flags.clone();
        flags.extend(self.flags.iter().cloned());

        let mut opts = InvokeOptions::new()
            .streaming(self.stream)
            .with_working_dir(workdir)
            .with_extra_flags(flags);

        let timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .or(config.executor.timeout);
        if let Some(timeout) = timeout {
            opts = opts.with_timeout(timeout);
        }

        let hooks = HookConfig {
            permission_socket: self.permission_socket.clone(),
            guard_mode: self.guard,
        };
        if let Some(settings) = self.settings.clone().or_else(|| build_hook_settings(&hooks)) {
            opts = opts.with_settings(settings);
        }

        Ok(opts)
    }
}

async fn read_stdin() -> anyhow::Result<String> {
    let mut prompt = String::new();
    tokio::io::stdin()
        .read_to_string(&mut prompt)
        .await
        .context("failed to read prompt from stdin")?;
    Ok(prompt)
}
