//! OpenCode `run --format json` events

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{tool_result_text, StreamParser, Transcript};
use crate::agent::output::InvokeHandler;
use crate::agent::usage::{model_or, TokenUsage, UsageLedger};

/// Top-level event; the payload lives in `part`
#[derive(Debug, Deserialize)]
pub(crate) struct OpenCodeEvent {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    part: Option<Part>,
    #[serde(default)]
    error: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Part {
    Text {
        #[serde(default)]
        text: String,
    },
    Tool {
        #[serde(default)]
        tool: String,
        #[serde(default, rename = "callID")]
        call_id: Option<String>,
        #[serde(default)]
        state: Option<ToolState>,
    },
    StepStart,
    StepFinish {
        #[serde(default)]
        tokens: Option<StepTokens>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ToolState {
    #[serde(default)]
    input: Value,
    #[serde(default)]
    output: Value,
}

#[derive(Debug, Default, Deserialize)]
struct StepTokens {
    #[serde(default)]
    input: u64,
    #[serde(default)]
    output: u64,
    #[serde(default)]
    reasoning: u64,
    #[serde(default)]
    cache: CacheTokens,
}

#[derive(Debug, Default, Deserialize)]
struct CacheTokens {
    #[serde(default)]
    read: u64,
    #[serde(default)]
    write: u64,
}

impl From<&StepTokens> for TokenUsage {
    fn from(t: &StepTokens) -> Self {
        TokenUsage::new(t.input + t.cache.read + t.cache.write, t.output)
    }
}

/// Normalizer for the opencode stream
#[derive(Debug)]
pub(crate) struct OpenCodeStream {
    model: String,
    transcript: Transcript,
    ledger: UsageLedger,
}

impl OpenCodeStream {
    pub(crate) fn new(model: Option<&str>) -> Self {
        Self {
            model: model_or(&[model], Self::NAME).to_string(),
            transcript: Transcript::default(),
            ledger: UsageLedger::new(),
        }
    }

    fn handle_part(&mut self, part: Part, handler: &mut dyn InvokeHandler) {
        match part {
            Part::Text { text } => self.transcript.push_text(&text, handler),
            Part::Tool {
                tool,
                call_id,
                state: Some(state),
            } if !tool.is_empty() => {
                if self
                    .transcript
                    .report_tool_use(call_id.as_deref(), &tool, &state.input, handler)
                {
                    handler.on_tool_result(&tool, &tool_result_text(&state.output));
                }
            }
            Part::StepFinish {
                tokens: Some(tokens),
            } => {
                debug!(backend = Self::NAME, reasoning = tokens.reasoning, "step finished");
                let usage = TokenUsage::from(&tokens);
                if !usage.is_zero() {
                    handler.on_tokens(usage.input, usage.output);
                    self.ledger.record(&self.model, usage);
                }
            }
            Part::Other => debug!(backend = Self::NAME, "unhandled part type"),
            _ => {}
        }
    }
}

impl StreamParser for OpenCodeStream {
    type Event = OpenCodeEvent;
    const NAME: &'static str = "opencode";

    fn handle(&mut self, event: OpenCodeEvent, handler: &mut dyn InvokeHandler) {
        if event.kind == "error" {
            warn!(backend = Self::NAME, error = %event.error, "error event");
        }

        match event.part {
            Some(part) => self.handle_part(part, handler),
            None => debug!(backend = Self::NAME, event = %event.kind, "event without part"),
        }
    }

    fn finish(self, handler: &mut dyn InvokeHandler) -> String {
        self.ledger.report(handler);
        self.transcript.into_text()
    }
}
