//! pi coding agent backend implementation

use async_trait::async_trait;
use tokio::process::Command;

use crate::agent::env::{build_env, provider_api_key_var, EnvSpec};
use crate::agent::output::{InvokeHandler, InvokeOptions, InvokeResult};
use crate::agent::spawn::Invocation;
use crate::agent::stream::PiStream;
use crate::config::PiConfig;
use crate::Result;

use super::Invoker;

/// pi backend: explicit `--provider`/`--model`
///
/// Text mode reads the prompt from stdin under `--print`. JSON mode has no
/// stdin path, so the prompt follows `--mode json` as an argument.
#[derive(Debug, Clone, Default)]
pub struct PiInvoker {
    config: PiConfig,
}

impl PiInvoker {
    pub fn new(config: PiConfig) -> Self {
        Self { config }
    }

    /// Environment requirements for the child process
    ///
    /// The key variable follows the configured provider.
    pub fn env_spec(&self) -> EnvSpec {
        let provider = self.config.provider.as_deref().unwrap_or_default();
        EnvSpec::new("PI_CODING_AGENT_DIR", provider_api_key_var(provider))
            .with_config_dir(self.config.config_dir.clone())
            .with_api_key(self.config.api_key.clone())
    }
}

/// pi has no `--` terminator and drops any argument that starts with `-`
/// from the message list, so such a prompt gets a leading space.
fn positional_prompt(prompt: &str) -> String {
    if prompt.starts_with('-') {
        format!(" {}", prompt)
    } else {
        prompt.to_string()
    }
}

#[async_trait]
impl Invoker for PiInvoker {
    fn name(&self) -> &'static str {
        "pi"
    }

    fn program(&self) -> &str {
        &self.config.path
    }

    fn build_command(&self, prompt: &str, opts: &InvokeOptions) -> Command {
        let mut cmd = Command::new(&self.config.path);

        if let Some(ref provider) = self.config.provider {
            cmd.arg("--provider").arg(provider);
        }
        if let Some(ref model) = self.config.model {
            cmd.arg("--model").arg(model);
        }

        cmd.args(&opts.extra_flags);

        if opts.streaming {
            cmd.arg("--mode").arg("json").arg(positional_prompt(prompt));
        } else {
            cmd.arg("--print");
        }

        if let Some(ref dir) = opts.working_dir {
            cmd.current_dir(dir);
        }

        if opts.settings.is_some() {
            tracing::debug!(backend = self.name(), "settings payload ignored");
        }

        cmd.env_clear().envs(build_env(&self.env_spec()));
        cmd
    }

    async fn invoke(
        &self,
        prompt: &str,
        opts: &InvokeOptions,
        handler: &mut dyn InvokeHandler,
    ) -> Result<InvokeResult> {
        let mut invocation = Invocation::new(self.name(), self.build_command(prompt, opts))
            .with_timeout(opts.deadline());
        if !opts.streaming {
            invocation = invocation.with_stdin_prompt(prompt);
        }

        let model = self.config.model.as_deref();
        invocation
            .run(opts.streaming.then(|| PiStream::new(model)), handler)
            .await
    }
}
