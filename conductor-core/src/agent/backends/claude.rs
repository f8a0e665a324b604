//! Claude Code backend implementation

use async_trait::async_trait;
use tokio::process::Command;

use crate::agent::env::{build_env, EnvSpec};
use crate::agent::output::{InvokeHandler, InvokeOptions, InvokeResult};
use crate::agent::spawn::Invocation;
use crate::agent::stream::ClaudeStream;
use crate::config::ClaudeConfig;
use crate::Result;

use super::Invoker;

/// Claude Code backend: prompt on stdin, `--print` mode
#[derive(Debug, Clone, Default)]
pub struct ClaudeInvoker {
    config: ClaudeConfig,
}

impl ClaudeInvoker {
    pub fn new(config: ClaudeConfig) -> Self {
        Self { config }
    }

    /// Environment requirements for the child process
    pub fn env_spec(&self) -> EnvSpec {
        EnvSpec::new("CLAUDE_CONFIG_DIR", "ANTHROPIC_API_KEY")
            .with_config_dir(self.config.config_dir.clone())
            .with_api_key(self.config.api_key.clone())
    }
}

#[async_trait]
impl Invoker for ClaudeInvoker {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn program(&self) -> &str {
        &self.config.path
    }

    fn build_command(&self, _prompt: &str, opts: &InvokeOptions) -> Command {
        let mut cmd = Command::new(&self.config.path);
        cmd.arg("--print");

        if let Some(ref model) = self.config.model {
            cmd.arg("--model").arg(model);
        }

        cmd.args(&opts.extra_flags);

        if opts.streaming {
            cmd.arg("--output-format").arg("stream-json").arg("--verbose");
        }

        if let Some(ref settings) = opts.settings {
            cmd.arg("--settings").arg(settings);
        }

        if let Some(ref dir) = opts.working_dir {
            cmd.current_dir(dir);
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
        Invocation::new(self.name(), self.build_command(prompt, opts))
            .with_stdin_prompt(prompt)
            .with_timeout(opts.deadline())
            .run(opts.streaming.then(ClaudeStream::new), handler)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::backends::{argv, env_of};
    use std::path::PathBuf;

    fn invoker(model: Option<&str>) -> ClaudeInvoker {
        ClaudeInvoker::new(ClaudeConfig {
            model: model.map(str::to_string),
            ..Default::default()
        })
    }

    #[test]
    fn test_claude_invoker_name() {
        let invoker = ClaudeInvoker::default();
        assert_eq!(invoker.name(), "claude");
        assert_eq!(invoker.program(), "claude");
    }

    #[test]
    fn test_text_mode_args() {
        let cmd = invoker(None).build_command("prompt", &InvokeOptions::new());
        assert_eq!(argv(&cmd), vec!["--print"]);
    }

    #[test]
    fn test_streaming_args_with_model_and_flags() {
        let opts = InvokeOptions::new()
            .streaming(true)
            .with_extra_flags(vec!["--dangerously-skip-permissions".to_string()]);
        let cmd = invoker(Some("opus")).build_command("prompt", &opts);

        assert_eq!(
            argv(&cmd),
            vec![
                "--print",
                "--model",
                "opus",
                "--dangerously-skip-permissions",
                "--output-format",
                "stream-json",
                "--verbose",
            ]
        );
    }

    #[test]
    fn test_prompt_not_in_argv() {
        let cmd = invoker(None).build_command("secret prompt", &InvokeOptions::new());
        assert!(!argv(&cmd).iter().any(|a| a.contains("secret prompt")));
    }

    #[test]
    fn test_settings_appended() {
        let opts = InvokeOptions::new().with_settings(r#"{"hooks":{}}"#);
        let cmd = invoker(None).build_command("p", &opts);
        assert_eq!(argv(&cmd), vec!["--print", "--settings", r#"{"hooks":{}}"#]);
    }

    #[test]
    fn test_working_dir_is_cwd() {
        let opts = InvokeOptions::new().with_working_dir("/tmp/work");
        let cmd = invoker(None).build_command("p", &opts);
        assert_eq!(
            cmd.as_std().get_current_dir(),
            Some(PathBuf::from("/tmp/work").as_path())
        );
        assert!(!argv(&cmd).contains(&"/tmp/work".to_string()));
    }

    #[test]
    fn test_env_from_config() {
        let invoker = ClaudeInvoker::new(ClaudeConfig {
            config_dir: Some(PathBuf::from("/home/dev/.claude-work")),
            api_key: Some("sk-ant-explicit".to_string()),
            ..Default::default()
        });
        let cmd = invoker.build_command("p", &InvokeOptions::new());

        assert_eq!(
            env_of(&cmd, "CLAUDE_CONFIG_DIR").as_deref(),
            Some("/home/dev/.claude-work")
        );
        assert_eq!(
            env_of(&cmd, "ANTHROPIC_API_KEY").as_deref(),
            Some("sk-ant-explicit")
        );
    }
}
