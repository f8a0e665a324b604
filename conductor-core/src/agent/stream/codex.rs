//! Codex `exec --json` events

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{StreamParser, Transcript};
use crate::agent::output::InvokeHandler;
use crate::agent::usage::{model_or, TokenUsage, UsageLedger};

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum CodexEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted {
        #[serde(default)]
        thread_id: Option<String>,
    },
    #[serde(rename = "turn.started")]
    TurnStarted,
    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: Option<CodexUsage>,
    },
    #[serde(rename = "turn.failed")]
    TurnFailed {
        #[serde(default)]
        error: Option<CodexError>,
    },
    #[serde(rename = "item.started")]
    ItemStarted,
    #[serde(rename = "item.updated")]
    ItemUpdated,
    #[serde(rename = "item.completed")]
    ItemCompleted {
        #[serde(default)]
        item: Value,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CodexUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    cached_input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CodexError {
    #[serde(default)]
    message: String,
}

/// Payload of an `item.completed` event
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Item {
    AgentMessage {
        #[serde(default)]
        text: String,
    },
    Reasoning,
    CommandExecution {
        #[serde(default)]
        command: String,
        #[serde(default)]
        aggregated_output: String,
        #[serde(default)]
        exit_code: Option<i64>,
    },
    McpToolCall {
        #[serde(default)]
        server: String,
        #[serde(default)]
        tool: String,
    },
    FileChange,
    #[serde(other)]
    Unknown,
}

/// Normalizer for the codex stream
///
/// Codex never names its model in the stream, so usage is attributed to the
/// configured model.
#[derive(Debug)]
pub(crate) struct CodexStream {
    model: String,
    transcript: Transcript,
    ledger: UsageLedger,
}

impl CodexStream {
    pub(crate) fn new(model: Option<&str>) -> Self {
        Self {
            model: model_or(&[model], Self::NAME).to_string(),
            transcript: Transcript::default(),
            ledger: UsageLedger::new(),
        }
    }

    fn handle_item(&mut self, raw: Value, handler: &mut dyn InvokeHandler) {
        if raw.is_null() {
            return;
        }

        let id = raw.get("id").and_then(Value::as_str).map(str::to_string);
        let item = match serde_json::from_value::<Item>(raw) {
            Ok(item) => item,
            Err(e) => {
                debug!(backend = Self::NAME, error = %e, "skipping unparseable item");
                return;
            }
        };

        // Only items that parsed count as seen
        if !self.transcript.first_sighting(id.as_deref()) {
            debug!(backend = Self::NAME, id = ?id, "duplicate item skipped");
            return;
        }

        match item {
            Item::AgentMessage { text } => self.transcript.push_text(&text, handler),
            Item::CommandExecution {
                command,
                aggregated_output,
                exit_code,
            } => {
                debug!(backend = Self::NAME, command = %command, exit_code = ?exit_code, "command finished");
                handler.on_tool_use(&command, &Value::String(command.clone()));
                handler.on_tool_result(&command, &aggregated_output);
            }
            Item::McpToolCall { server, tool } => {
                let name = if server.is_empty() {
                    tool
                } else {
                    format!("{}/{}", server, tool)
                };
                handler.on_tool_use(&name, &Value::String(name.clone()));
            }
            Item::FileChange => {
                handler.on_tool_use("file_change", &Value::String("file_change".to_string()));
            }
            Item::Reasoning => {}
            Item::Unknown => debug!(backend = Self::NAME, "unhandled item type"),
        }
    }
}

impl StreamParser for CodexStream {
    type Event = CodexEvent;
    const NAME: &'static str = "codex";

    fn handle(&mut self, event: CodexEvent, handler: &mut dyn InvokeHandler) {
        match event {
            CodexEvent::ItemCompleted { item } => self.handle_item(item, handler),
            CodexEvent::TurnCompleted { usage: Some(usage) } => {
                let usage = TokenUsage::new(
                    usage.input_tokens + usage.cached_input_tokens,
                    usage.output_tokens,
                );
                if !usage.is_zero() {
                    handler.on_tokens(usage.input, usage.output);
                    self.ledger.record(&self.model, usage);
                }
            }
            CodexEvent::TurnFailed { error } => {
                let message = error.map(|e| e.message).unwrap_or_default();
                warn!(backend = Self::NAME, error = %message, "turn failed");
            }
            CodexEvent::Error { message } => {
                warn!(backend = Self::NAME, error = %message, "error event");
            }
            CodexEvent::ThreadStarted { thread_id } => {
                debug!(backend = Self::NAME, thread_id = ?thread_id, "thread started");
            }
            CodexEvent::TurnCompleted { usage: None }
            | CodexEvent::TurnStarted
            | CodexEvent::ItemStarted
            | CodexEvent::ItemUpdated => {}
            CodexEvent::Unknown => debug!(backend = Self::NAME, "unhandled event type"),
        }
    }

    fn finish(self, handler: &mut dyn InvokeHandler) -> String {
        self.ledger.report(handler);
        self.transcript.into_text()
    }
}
