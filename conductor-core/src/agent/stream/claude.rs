//! Claude Code `--output-format stream-json` events

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::{lenient_vec, tool_result_text, StreamParser, Transcript};
use crate::agent::output::InvokeHandler;
use crate::agent::usage::{TokenUsage, UsageLedger};

/// A message from the Claude Code stream-json output
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClaudeEvent {
    /// System message at the start
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },

    /// Assistant text and tool calls
    Assistant {
        #[serde(default)]
        message: Message,
    },

    /// Tool results fed back to the assistant
    User {
        #[serde(default)]
        message: Message,
        #[serde(default)]
        tool_name: Option<String>,
        #[serde(default)]
        tool_result: Value,
    },

    /// Final result with per-model usage
    Result {
        #[serde(default)]
        result: Option<String>,
        #[serde(default, rename = "modelUsage")]
        model_usage: BTreeMap<String, ModelUsage>,
        #[serde(default)]
        is_error: bool,
    },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Message {
    #[serde(default, deserialize_with = "content_blocks")]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessageUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Value,
    },
    #[serde(other)]
    Other,
}

/// Message content is either a bare string or a list of blocks
fn content_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Content {
        Text(String),
        #[serde(deserialize_with = "lenient_vec")]
        Blocks(Vec<ContentBlock>),
    }

    Ok(match Content::deserialize(deserializer)? {
        Content::Text(text) => vec![ContentBlock::Text { text }],
        Content::Blocks(blocks) => blocks,
    })
}

#[derive(Debug, Default, Deserialize)]
struct MessageUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

impl From<MessageUsage> for TokenUsage {
    fn from(u: MessageUsage) -> Self {
        TokenUsage::new(
            u.input_tokens + u.cache_creation_input_tokens + u.cache_read_input_tokens,
            u.output_tokens,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModelUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

impl From<&ModelUsage> for TokenUsage {
    fn from(u: &ModelUsage) -> Self {
        TokenUsage::new(
            u.input_tokens + u.cache_creation_input_tokens + u.cache_read_input_tokens,
            u.output_tokens,
        )
    }
}

/// Normalizer for the claude stream
#[derive(Debug, Default)]
pub(crate) struct ClaudeStream {
    transcript: Transcript,
    /// Tool names by tool-use id, for resolving tool_result blocks
    tool_names: HashMap<String, String>,
    ledger: UsageLedger,
}

impl ClaudeStream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn handle_assistant(&mut self, message: Message, handler: &mut dyn InvokeHandler) {
        if let Some(usage) = message.usage {
            let usage = TokenUsage::from(usage);
            handler.on_tokens(usage.input, usage.output);
        }

        for block in message.content {
            match block {
                ContentBlock::Text { text } => self.transcript.push_text(&text, handler),
                ContentBlock::ToolUse { id, name, input } if !name.is_empty() => {
                    if let Some(ref id) = id {
                        self.tool_names.insert(id.clone(), name.clone());
                    }
                    self.transcript
                        .report_tool_use(id.as_deref(), &name, &input, handler);
                }
                _ => {}
            }
        }
    }

    fn handle_user(
        &mut self,
        message: Message,
        tool_name: Option<String>,
        tool_result: Value,
        handler: &mut dyn InvokeHandler,
    ) {
        if let Some(name) = tool_name.filter(|n| !n.is_empty()) {
            handler.on_tool_result(&name, &tool_result_text(&tool_result));
        }

        for block in message.content {
            if let ContentBlock::ToolResult {
                tool_use_id,
                content,
            } = block
            {
                let name = tool_use_id
                    .as_ref()
                    .and_then(|id| self.tool_names.get(id))
                    .map(String::as_str)
                    .unwrap_or("unknown");
                handler.on_tool_result(name, &tool_result_text(&content));
            }
        }
    }
}

impl StreamParser for ClaudeStream {
    type Event = ClaudeEvent;
    const NAME: &'static str = "claude";

    fn handle(&mut self, event: ClaudeEvent, handler: &mut dyn InvokeHandler) {
        match event {
            ClaudeEvent::System { subtype, model } => {
                debug!(backend = Self::NAME, event = "system", subtype = ?subtype, "stream event");
                if subtype.as_deref() == Some("init") {
                    if let Some(model) = model.filter(|m| !m.is_empty()) {
                        handler.on_system_init(&model);
                    }
                }
            }
            ClaudeEvent::Assistant { message } => {
                debug!(backend = Self::NAME, event = "assistant", "stream event");
                self.handle_assistant(message, handler);
            }
            ClaudeEvent::User {
                message,
                tool_name,
                tool_result,
            } => {
                debug!(backend = Self::NAME, event = "user", "stream event");
                self.handle_user(message, tool_name, tool_result, handler);
            }
            ClaudeEvent::Result {
                result,
                model_usage,
                is_error,
            } => {
                debug!(backend = Self::NAME, event = "result", is_error, "stream event");
                for (model, usage) in &model_usage {
                    self.ledger.record(model, usage.into());
                }
                if let Some(result) = result {
                    self.transcript.fallback(&result, handler);
                }
            }
            ClaudeEvent::Unknown => debug!(backend = Self::NAME, "unhandled event type"),
        }
    }

    fn finish(self, handler: &mut dyn InvokeHandler) -> String {
        self.ledger.report(handler);
        self.transcript.into_text()
    }
}
