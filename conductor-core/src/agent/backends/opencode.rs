//! OpenCode backend implementation

use async_trait::async_trait;
use tokio::process::Command;

use crate::agent::env::{build_env, provider_api_key_var, provider_from_model, EnvSpec};
use crate::agent::output::{InvokeHandler, InvokeOptions, InvokeResult};
use crate::agent::spawn::Invocation;
use crate::agent::stream::OpenCodeStream;
use crate::config::OpenCodeConfig;
use crate::Result;

use super::Invoker;

/// OpenCode backend: quiet `run` with the prompt as the last argument
#[derive(Debug, Clone, Default)]
pub struct OpenCodeInvoker {
    config: OpenCodeConfig,
}

impl OpenCodeInvoker {
    pub fn new(config: OpenCodeConfig) -> Self {
        Self { config }
    }

    /// Environment requirements for the child process
    ///
    /// The key variable follows the provider prefix of the `provider/model`
    /// setting.
    pub fn env_spec(&self) -> EnvSpec {
        let provider = provider_from_model(self.config.model.as_deref().unwrap_or_default());
        EnvSpec::new("OPENCODE_CONFIG_DIR", provider_api_key_var(provider))
            .with_config_dir(self.config.config_dir.clone())
            .with_api_key(self.config.api_key.clone())
    }
}

#[async_trait]
impl Invoker for OpenCodeInvoker {
    fn name(&self) -> &'static str {
        "opencode"
    }

    fn program(&self) -> &str {
        &self.config.path
    }

    fn build_command(&self, prompt: &str, opts: &InvokeOptions) -> Command {
        let mut cmd = Command::new(&self.config.path);
        cmd.arg("run");

        if let Some(ref model) = self.config.model {
            cmd.arg("--model").arg(model);
        }

        cmd.args(&opts.extra_flags);

        if opts.streaming {
            cmd.arg("--format").arg("json");
        }
        cmd.arg("-q");

        if let Some(ref dir) = opts.working_dir {
            cmd.arg("--dir").arg(dir);
        }

        if opts.settings.is_some() {
            tracing::debug!(backend = self.name(), "settings payload ignored");
        }

        cmd.arg("--").arg(prompt);
        cmd.env_clear().envs(build_env(&self.env_spec()));
        cmd
    }

    async fn invoke(
        &self,
        prompt: &str,
        opts: &InvokeOptions,
        handler: &mut dyn InvokeHandler,
    ) -> Result<InvokeResult> {
        let model = self.config.model.as_deref();
        Invocation::new(self.name(), self.build_command(prompt, opts))
            .with_timeout(opts.deadline())
            .with_launch_model(model)
            .run(opts.streaming.then(|| OpenCodeStream::new(model)), handler)
            .await
    }
}


#[cfg(all(test, unix))]
mod process_tests {
    use super::*;
    use crate::agent::testing::{echo_lines, fake_cli, Event, RecordingHandler};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_streaming_invocation() {
        let dir = TempDir::new().unwrap();
        let script = echo_lines(&[
            r#"{"type":"text","part":{"type":"text","text":"Done"}}"#,
            r#"{"type":"step_finish","part":{"type":"step-finish","tokens":{"input":20,"output":4,"cache":{"read":5,"write":3}}}}"#,
            r#"{"type":"step_finish","part":{"type":"step-finish","tokens":{"input":40,"output":6,"cache":{"read":8,"write":2}}}}"#,
        ]);
        let path = fake_cli(dir.path(), "opencode", &script);
        let invoker = OpenCodeInvoker::new(OpenCodeConfig {
            path: path.to_string_lossy().into_owned(),
            model: Some("anthropic/claude-sonnet-4-5".to_string()),
            ..Default::default()
        });

        let mut handler = RecordingHandler::default();
        let result = invoker
            .invoke("p", &InvokeOptions::new().streaming(true), &mut handler)
            .await
            .unwrap();

        assert_eq!(result.text, "Done");
        assert_eq!(
            handler.events[1],
            Event::SystemInit("anthropic/claude-sonnet-4-5".to_string())
        );
        assert_eq!(
            handler.final_tokens(),
            vec![("anthropic/claude-sonnet-4-5", 78, 10)]
        );
    }

    #[tokio::test]
    async fn test_stdin_is_closed() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(dir.path(), "opencode", "cat; echo finished");
        let invoker = OpenCodeInvoker::new(OpenCodeConfig {
            path: path.to_string_lossy().into_owned(),
            ..Default::default()
        });

        let result = invoker
            .invoke("p", &InvokeOptions::new(), &mut ())
            .await
            .unwrap();
        assert_eq!(result.text, "finished\n");
    }
}
