//! Conductor CLI - Command line interface for the agent invocation layer
//!
//! Runs Claude Code, Codex, pi or OpenCode on a prompt and prints what the
//! agent does as it happens.

mod commands;

use clap::{Parser, Subcommand};
use conductor_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{BackendsArgs, ConfigArgs, InvokeArgs};

/// Conductor: one invocation layer for command-line coding agents
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend to use (overrides config and env)
    #[arg(long, global = true, env = "CONDUCTOR_EXECUTOR")]
    executor: Option<String>,

    /// Model to use (overrides config and env)
    #[arg(long, global = true, env = "CONDUCTOR_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Run an agent on a prompt
    #[command(visible_alias = "i")]
    Invoke(InvokeArgs),

    /// List backends and whether their executables are installed
    Backends(BackendsArgs),

    /// Show current configuration
    Config(ConfigArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("conductor_core=debug,conductor=debug")
    } else {
        EnvFilter::from_default_env()
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.executor.clone(), cli.model.clone())?;

    tracing::debug!(
        executor = %config.executor.name,
        model = ?config.executor.model(),
        "Configuration loaded"
    );

    match cli.command {
        Some(Commands::Version) => {
            println!("conductor {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Invoke(args)) => {
            args.execute(cli.verbose, config).await?;
        }
        Some(Commands::Backends(args)) => {
            args.execute(&config);
        }
        Some(Commands::Config(args)) => {
            args.execute(&config)?;
        }
        None => {
            println!("Conductor - invocation layer for command-line coding agents");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
