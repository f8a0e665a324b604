//! Invocation options, result, callbacks, and plain-text output reading

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

use crate::protocol;

/// Options for a single agent invocation
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Working directory for the agent
    pub working_dir: Option<PathBuf>,

    /// Request the backend's JSON stream instead of plain text
    pub streaming: bool,

    /// Additional CLI flags, appended verbatim
    pub extra_flags: Vec<String>,

    /// Settings payload (hook configuration) for backends that accept one
    pub settings: Option<String>,

    /// Deadline for the whole invocation; `None` or zero means no deadline
    pub timeout: Option<Duration>,
}

impl InvokeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_extra_flags(mut self, flags: Vec<String>) -> Self {
        self.extra_flags = flags;
        self
    }

    pub fn with_settings(mut self, settings: impl Into<String>) -> Self {
        self.settings = Some(settings.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The timeout, if one is actually in effect
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }
}

/// Output of a completed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResult {
    /// Accumulated agent output, or the blocked status on timeout
    pub text: String,
    /// Whether the invocation ran past its deadline
    pub timed_out: bool,
}

impl InvokeResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timed_out: false,
        }
    }

    /// Result standing in for an invocation that missed its deadline
    pub fn timed_out() -> Self {
        Self {
            text: protocol::timeout_blocked_status(),
            timed_out: true,
        }
    }
}

/// Observer for everything an invocation reports while it runs
///
/// Every method defaults to a no-op, so handlers implement only what they
/// care about. Calls arrive in stream order on the invoking task.
pub trait InvokeHandler: Send {
    /// A text fragment (streaming) or one line including its newline (text mode)
    fn on_output(&mut self, _text: &str) {}

    /// The agent invoked a tool
    fn on_tool_use(&mut self, _name: &str, _input: &serde_json::Value) {}

    /// A tool returned, flattened to readable text
    fn on_tool_result(&mut self, _name: &str, _result: &str) {}

    /// The model serving this invocation became known
    fn on_system_init(&mut self, _model: &str) {}

    /// Token counts for one turn or message
    fn on_tokens(&mut self, _input: u64, _output: u64) {}

    /// Aggregate token counts for one model, after the stream ends
    fn on_final_tokens(&mut self, _model: &str, _input: u64, _output: u64) {}

    /// The agent process was spawned
    fn on_process_start(&mut self, _pid: u32) {}

    /// The agent process was reaped
    fn on_process_end(&mut self) {}
}

impl InvokeHandler for () {}

/// Handler that prints agent output to stdout and details to stderr
pub struct PrintHandler {
    /// Whether to show tool, token, and process information
    verbose: bool,
}

impl PrintHandler {
    /// Create a new print handler
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl InvokeHandler for PrintHandler {
    fn on_output(&mut self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }

    fn on_tool_use(&mut self, name: &str, input: &serde_json::Value) {
        if self.verbose {
            eprintln!("\n[tool: {} with input: {}]", name, input);
        }
    }

    fn on_tool_result(&mut self, name: &str, result: &str) {
        if self.verbose {
            eprintln!("[result from {}: {}]", name, truncate(result, 200));
        }
    }

    fn on_system_init(&mut self, model: &str) {
        if self.verbose {
            eprintln!("[model: {}]", model);
        }
    }

    fn on_final_tokens(&mut self, model: &str, input: u64, output: u64) {
        if self.verbose {
            eprintln!("[tokens ({}): {} in, {} out]", model, input, output);
        }
    }

    fn on_process_start(&mut self, pid: u32) {
        if self.verbose {
            eprintln!("[process started: pid {}]", pid);
        }
    }

    fn on_process_end(&mut self) {
        println!(); // Ensure final newline
    }
}

/// Shorten long text for display, keeping char boundaries intact
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... ({} chars)", &text[..cut], text.chars().count()),
        None => text.to_string(),
    }
}

/// Line reader over a child pipe
///
/// Lines are decoded lossily and returned without their terminator. A read
/// error ends the stream after being logged.
pub(crate) struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    pub(crate) async fn next_line(&mut self) -> Option<String> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf).await {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(String::from_utf8_lossy(&self.buf).into_owned())
            }
            Err(e) => {
                debug!(error = %e, "output read failed, ending stream");
                None
            }
        }
    }
}

/// Read plain-text output, reporting each line through `on_output`
///
/// Used by every backend when streaming was not requested.
pub async fn read_text<R>(reader: R, handler: &mut dyn InvokeHandler) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineReader::new(reader);
    let mut output = String::new();

    while let Some(mut line) = lines.next_line().await {
        line.push('\n');
        output.push_str(&line);
        handler.on_output(&line);
    }

    output
}
