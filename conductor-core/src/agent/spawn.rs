//! Agent subprocess lifecycle: spawn, feed, drain, and reap

use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::output::{read_text, InvokeHandler, InvokeResult};
use super::stream::{normalize, StreamParser};
use crate::{Error, Result};

/// Time between SIGTERM and SIGKILL when a deadline passes
const GRACEFUL_SHUTDOWN_DELAY: Duration = Duration::from_millis(100);

/// One prepared agent run
///
/// Backends build the command (argv, environment, working directory); this
/// type owns everything after that.
pub(crate) struct Invocation {
    backend: &'static str,
    command: Command,
    stdin_prompt: Option<String>,
    timeout: Option<Duration>,
    launch_model: Option<String>,
}

impl Invocation {
    pub(crate) fn new(backend: &'static str, command: Command) -> Self {
        Self {
            backend,
            command,
            stdin_prompt: None,
            timeout: None,
            launch_model: None,
        }
    }

    /// Deliver the prompt on stdin instead of leaving stdin closed
    pub(crate) fn with_stdin_prompt(mut self, prompt: &str) -> Self {
        self.stdin_prompt = Some(prompt.to_string());
        self
    }

    /// Deadline for draining and reaping the process
    pub(crate) fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model to announce right after spawn, for streams that never name one
    pub(crate) fn with_launch_model(mut self, model: Option<&str>) -> Self {
        self.launch_model = model.filter(|m| !m.is_empty()).map(str::to_string);
        self
    }

    /// Run the process to completion
    ///
    /// stdout goes through `parser` when one is given, otherwise through the
    /// plain-text reader.
    pub(crate) async fn run<P: StreamParser>(
        mut self,
        parser: Option<P>,
        handler: &mut dyn InvokeHandler,
    ) -> Result<InvokeResult> {
        let backend = self.backend;
        let program = self
            .command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        let stdin = if self.stdin_prompt.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        self.command
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        self.command.process_group(0);

        let mut child = self.command.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::Agent(format!(
                    "{} executable not found at '{}'. Is it installed?",
                    backend, program
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let mut group = GroupGuard::new(child.id());
        let pid = child.id().unwrap_or_default();
        debug!(backend, pid, program = %program, "agent process started");
        handler.on_process_start(pid);
        if let Some(ref model) = self.launch_model {
            handler.on_system_init(model);
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Agent("stdout pipe was not available".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Agent("stderr pipe was not available".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut buf).await {
                debug!(error = %e, "stderr read failed");
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let writer = match (child.stdin.take(), self.stdin_prompt) {
            (Some(mut pipe), Some(prompt)) => Some(tokio::spawn(async move {
                if let Err(e) = pipe.write_all(prompt.as_bytes()).await {
                    debug!(backend, error = %e, "failed to write prompt to stdin");
                }
                // Dropping the pipe closes stdin
            })),
            _ => None,
        };

        let drain = async {
            let text = match parser {
                Some(parser) => normalize(stdout, parser, handler).await,
                None => read_text(stdout, handler).await,
            };
            let status = child.wait().await;
            (text, status)
        };

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, drain).await.ok(),
            None => Some(drain.await),
        };

        let Some((text, status)) = outcome else {
            warn!(backend, pid, timeout = ?self.timeout, "agent invocation timed out");
            terminate(&mut child).await;
            group.disarm();
            stderr_task.abort();
            if let Some(writer) = writer {
                writer.abort();
            }
            handler.on_process_end();
            return Ok(InvokeResult::timed_out());
        };
        group.disarm();

        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                debug!(backend, error = %e, "stdin writer task failed");
            }
        }
        let stderr = stderr_task.await.unwrap_or_default();
        handler.on_process_end();

        let status = status?;
        debug!(backend, pid, status = %status, "agent process exited");

        if !status.success() {
            let stderr = stderr.trim();
            return Err(Error::Exited {
                backend: backend.to_string(),
                status,
                stderr: (!stderr.is_empty()).then(|| stderr.to_string()),
            });
        }

        Ok(InvokeResult::new(text))
    }
}

/// Kills the agent's process group if the invocation is dropped before the
/// child is reaped
#[cfg_attr(not(unix), allow(dead_code))]
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    /// The child has been reaped; its group id may be reused from here on
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid.take() {
            debug!(pid, "invocation dropped, killing agent process group");
            signal_process_group(pid, libc::SIGKILL);
        }
    }
}

/// Stop a timed-out agent and everything it started, then reap it
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        signal_process_group(pid, libc::SIGTERM);
        tokio::time::sleep(GRACEFUL_SHUTDOWN_DELAY).await;
        signal_process_group(pid, libc::SIGKILL);
    }

    if let Err(e) = child.kill().await {
        debug!(error = %e, "failed to kill agent process");
    }
}

/// The child leads its own process group, so its pid is the group id
#[cfg(unix)]
#[allow(unsafe_code)]
fn signal_process_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };

    // SAFETY: killpg takes plain integers and has no memory preconditions.
    let result = unsafe { libc::killpg(pgid, signal) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            debug!(pgid, signal, error = %err, "failed to signal process group");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::agent::output::InvokeOptions;
    use crate::agent::stream::ClaudeStream;
    use crate::agent::testing::{Event, RecordingHandler};
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    async fn run_text(invocation: Invocation, handler: &mut RecordingHandler) -> Result<InvokeResult> {
        invocation.run(None::<ClaudeStream>, handler).await
    }

    #[tokio::test]
    async fn test_prompt_delivered_on_stdin() {
        let mut handler = RecordingHandler::default();
        let invocation = Invocation::new("test", sh("cat")).with_stdin_prompt("hello\nworld");
        let result = run_text(invocation, &mut handler).await.unwrap();

        assert_eq!(result.text, "hello\nworld\n");
        assert!(!result.timed_out);
        assert_eq!(handler.events.first(), Some(&Event::ProcessStart));
        assert_eq!(handler.events.last(), Some(&Event::ProcessEnd));
        assert_eq!(handler.count(&Event::ProcessEnd), 1);
    }

    #[tokio::test]
    async fn test_stdin_closed_without_prompt() {
        let mut handler = RecordingHandler::default();
        let result = run_text(Invocation::new("test", sh("cat; echo eof")), &mut handler)
            .await
            .unwrap();
        assert_eq!(result.text, "eof\n");
    }

    #[tokio::test]
    async fn test_writer_failure_is_not_surfaced() {
        let mut handler = RecordingHandler::default();
        let big = "x".repeat(1 << 20);
        let invocation = Invocation::new("test", sh("echo early")).with_stdin_prompt(&big);
        let result = run_text(invocation, &mut handler).await.unwrap();
        assert_eq!(result.text, "early\n");
    }

    #[tokio::test]
    async fn test_exit_with_stderr() {
        let mut handler = RecordingHandler::default();
        let invocation = Invocation::new("claude", sh("echo 'some error' >&2; exit 1"));
        let err = run_text(invocation, &mut handler).await.unwrap_err();

        match &err {
            Error::Exited {
                backend,
                stderr,
                status,
            } => {
                assert_eq!(backend, "claude");
                assert_eq!(stderr.as_deref(), Some("some error"));
                assert_eq!(status.code(), Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("claude exited: "));
        assert!(err.to_string().ends_with("\nstderr: some error"));
        assert_eq!(handler.count(&Event::ProcessEnd), 1);
    }

    #[tokio::test]
    async fn test_exit_without_stderr() {
        let mut handler = RecordingHandler::default();
        let err = run_text(Invocation::new("codex", sh("exit 3")), &mut handler)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("codex exited: "));
        assert!(!msg.contains("stderr"));
    }

    #[tokio::test]
    async fn test_timeout_returns_blocked_status() {
        let mut handler = RecordingHandler::default();
        let invocation = Invocation::new("test", sh("echo started; sleep 10"))
            .with_timeout(Some(Duration::from_millis(300)));

        let start = Instant::now();
        let result = run_text(invocation, &mut handler).await.unwrap();

        assert!(result.timed_out);
        assert!(result.text.contains("CONDUCTOR_STATUS"));
        assert!(result.text.contains("BLOCKED"));
        assert!(result.text.contains("Timeout"));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(handler.events.last(), Some(&Event::ProcessEnd));
    }

    #[tokio::test]
    async fn test_timeout_escalates_past_ignored_sigterm() {
        let mut handler = RecordingHandler::default();
        let invocation = Invocation::new("test", sh("trap '' TERM; sleep 10"))
            .with_timeout(Some(Duration::from_millis(200)));

        let start = Instant::now();
        let result = run_text(invocation, &mut handler).await.unwrap();
        assert!(result.timed_out);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_zero_timeout_means_no_deadline() {
        let mut handler = RecordingHandler::default();
        let opts = InvokeOptions::new().with_timeout(Duration::ZERO);
        let invocation = Invocation::new("test", sh("sleep 0.2; echo done"))
            .with_timeout(opts.deadline());
        let result = run_text(invocation, &mut handler).await.unwrap();
        assert_eq!(result.text, "done\n");
    }

    /// Whether `pid` is gone or a zombie, polling for up to two seconds
    #[cfg(target_os = "linux")]
    async fn process_exited(pid: &str) -> bool {
        for _ in 0..40 {
            match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
                Err(_) => return true,
                Ok(stat) => {
                    let state = stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next());
                    if state == Some("Z") {
                        return true;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_invocation_kills_process_group() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

        let mut handler = RecordingHandler::default();
        let invocation = Invocation::new("test", sh(&script));
        let cancelled = tokio::time::timeout(
            Duration::from_millis(500),
            run_text(invocation, &mut handler),
        )
        .await;
        assert!(cancelled.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        assert!(process_exited(pid).await, "background process {} survived", pid);
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let mut handler = RecordingHandler::default();
        let invocation = Invocation::new("pi", Command::new("/nonexistent/pi-binary-12345"));
        let err = run_text(invocation, &mut handler).await.unwrap_err();

        assert!(matches!(err, Error::Agent(_)));
        assert!(err.to_string().contains("/nonexistent/pi-binary-12345"));
        assert!(handler.events.is_empty());
    }

    #[tokio::test]
    async fn test_launch_model_announced_after_start() {
        let mut handler = RecordingHandler::default();
        let invocation = Invocation::new("codex", sh("true")).with_launch_model(Some("o3"));
        run_text(invocation, &mut handler).await.unwrap();

        assert_eq!(
            handler.events,
            vec![
                Event::ProcessStart,
                Event::SystemInit("o3".to_string()),
                Event::ProcessEnd,
            ]
        );
    }
}
