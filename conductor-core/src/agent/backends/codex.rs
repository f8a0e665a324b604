//! Codex backend implementation

use async_trait::async_trait;
use tokio::process::Command;

use crate::agent::env::{build_env, EnvSpec};
use crate::agent::output::{InvokeHandler, InvokeOptions, InvokeResult};
use crate::agent::spawn::Invocation;
use crate::agent::stream::CodexStream;
use crate::config::CodexConfig;
use crate::Result;

use super::Invoker;

/// Codex backend: `exec` subcommand with the prompt as the last argument
#[derive(Debug, Clone, Default)]
pub struct CodexInvoker {
    config: CodexConfig,
}

impl CodexInvoker {
    pub fn new(config: CodexConfig) -> Self {
        Self { config }
    }

    /// Environment requirements for the child process
    pub fn env_spec(&self) -> EnvSpec {
        EnvSpec::new("CODEX_HOME", "OPENAI_API_KEY")
            .with_config_dir(self.config.config_dir.clone())
            .with_api_key(self.config.api_key.clone())
    }
}

#[async_trait]
impl Invoker for CodexInvoker {
    fn name(&self) -> &'static str {
        "codex"
    }

    fn program(&self) -> &str {
        &self.config.path
    }

    fn build_command(&self, prompt: &str, opts: &InvokeOptions) -> Command {
        let mut cmd = Command::new(&self.config.path);
        cmd.arg("exec");

        if let Some(ref model) = self.config.model {
            cmd.arg("-m").arg(model);
        }

        cmd.args(&opts.extra_flags);

        if opts.streaming {
            cmd.arg("--json");
        }

        if let Some(ref dir) = opts.working_dir {
            cmd.arg("--cd").arg(dir);
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
            .run(opts.streaming.then(|| CodexStream::new(model)), handler)
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
            r#"{"type":"thread.started","thread_id":"t"}"#,
            r#"{"type":"item.completed","item":{"id":"i1","type":"command_execution","command":"go test ./...","aggregated_output":"ok","exit_code":0}}"#,
            r#"{"type":"item.completed","item":{"id":"i2","type":"agent_message","text":"Tests pass."}}"#,
            r#"{"type":"turn.completed","usage":{"input_tokens":100,"cached_input_tokens":50,"output_tokens":10}}"#,
        ]);
        let path = fake_cli(dir.path(), "codex", &script);
        let invoker = CodexInvoker::new(CodexConfig {
            path: path.to_string_lossy().into_owned(),
            model: Some("o3".to_string()),
            ..Default::default()
        });

        let mut handler = RecordingHandler::default();
        let opts = InvokeOptions::new().streaming(true);
        let result = invoker.invoke("run tests", &opts, &mut handler).await.unwrap();

        assert_eq!(result.text, "Tests pass.");
        assert_eq!(handler.output(), result.text);
        assert_eq!(
            &handler.events[..2],
            &[Event::ProcessStart, Event::SystemInit("o3".to_string())]
        );
        assert_eq!(handler.tool_uses(), vec!["go test ./..."]);
        assert_eq!(handler.final_tokens(), vec![("o3", 150, 10)]);
        assert_eq!(handler.events.last(), Some(&Event::ProcessEnd));
    }

    #[tokio::test]
    async fn test_prompt_is_last_argument() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(dir.path(), "codex", r#"for a in "$@"; do printf '[%s]' "$a"; done; echo"#);
        let invoker = CodexInvoker::new(CodexConfig {
            path: path.to_string_lossy().into_owned(),
            ..Default::default()
        });

        let result = invoker
            .invoke("two words", &InvokeOptions::new(), &mut ())
            .await
            .unwrap();
        assert_eq!(result.text, "[exec][--][two words]\n");
    }
}
