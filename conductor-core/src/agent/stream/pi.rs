//! pi `--mode json` events

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{lenient_vec, tool_result_text, StreamParser, Transcript};
use crate::agent::output::InvokeHandler;
use crate::agent::usage::{model_or, TokenUsage, UsageLedger};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum PiEvent {
    Session,
    AgentStart,
    TurnStart,
    TurnEnd,
    MessageStart {
        #[serde(default)]
        message: Option<PiMessage>,
    },
    MessageUpdate {
        #[serde(default)]
        message: Option<PiMessage>,
        #[serde(default, rename = "assistantMessageEvent")]
        assistant_message_event: Option<AssistantMessageEvent>,
    },
    MessageEnd {
        #[serde(default)]
        message: Option<PiMessage>,
    },
    ToolExecutionStart,
    ToolExecutionEnd {
        #[serde(default, rename = "toolCallId")]
        tool_call_id: Option<String>,
        #[serde(default, rename = "toolName")]
        tool_name: String,
        #[serde(default)]
        result: Value,
        #[serde(default, rename = "isError")]
        is_error: bool,
    },
    AgentEnd {
        #[serde(default, deserialize_with = "lenient_vec")]
        messages: Vec<PiMessage>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PiMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    content: Vec<PiContent>,
    #[serde(default)]
    usage: Option<PiUsage>,
}

impl PiMessage {
    fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }

    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text.as_deref())
            .collect()
    }
}

/// A content block; text blocks carry `text`, tool calls carry the rest
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PiContent {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PiUsage {
    #[serde(default)]
    input: u64,
    #[serde(default)]
    output: u64,
    #[serde(default)]
    cache_read: u64,
    #[serde(default)]
    cache_write: u64,
}

impl From<&PiUsage> for TokenUsage {
    fn from(u: &PiUsage) -> Self {
        TokenUsage::new(u.input + u.cache_read + u.cache_write, u.output)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AssistantMessageEvent {
    TextDelta {
        #[serde(default)]
        delta: String,
    },
    ToolcallEnd {
        #[serde(default, rename = "contentIndex")]
        content_index: usize,
        #[serde(default, rename = "toolCall")]
        tool_call: Option<PiContent>,
    },
    #[serde(other)]
    Other,
}

/// Normalizer for the pi stream
#[derive(Debug)]
pub(crate) struct PiStream {
    configured_model: Option<String>,
    current_model: Option<String>,
    transcript: Transcript,
    ledger: UsageLedger,
}

impl PiStream {
    pub(crate) fn new(model: Option<&str>) -> Self {
        Self {
            configured_model: model.filter(|m| !m.is_empty()).map(str::to_string),
            current_model: None,
            transcript: Transcript::default(),
            ledger: UsageLedger::new(),
        }
    }

    fn handle_message_start(&mut self, message: Option<PiMessage>, handler: &mut dyn InvokeHandler) {
        let Some(model) = message
            .filter(PiMessage::is_assistant)
            .and_then(|m| m.model)
            .filter(|m| !m.is_empty())
        else {
            return;
        };

        if self.current_model.as_deref() != Some(model.as_str()) {
            handler.on_system_init(&model);
            self.current_model = Some(model);
        }
    }

    fn handle_update(
        &mut self,
        message: Option<PiMessage>,
        event: Option<AssistantMessageEvent>,
        handler: &mut dyn InvokeHandler,
    ) {
        match event {
            Some(AssistantMessageEvent::TextDelta { delta }) => {
                self.transcript.push_text(&delta, handler)
            }
            Some(AssistantMessageEvent::ToolcallEnd {
                content_index,
                tool_call,
            }) => {
                let call = tool_call.or_else(|| {
                    message.and_then(|m| m.content.into_iter().nth(content_index))
                });
                if let Some(call) = call.filter(|c| !c.name.is_empty()) {
                    self.transcript.report_tool_use(
                        call.id.as_deref(),
                        &call.name,
                        &call.arguments,
                        handler,
                    );
                }
            }
            Some(AssistantMessageEvent::Other) | None => {}
        }
    }

    fn handle_agent_end(&mut self, messages: Vec<PiMessage>, handler: &mut dyn InvokeHandler) {
        let assistant: Vec<&PiMessage> = messages.iter().filter(|m| m.is_assistant()).collect();

        for message in &assistant {
            if let Some(ref usage) = message.usage {
                let model = model_or(
                    &[message.model.as_deref(), self.configured_model.as_deref()],
                    Self::NAME,
                );
                self.ledger.record(model, usage.into());
            }
        }

        if let Some(last) = assistant.last() {
            self.transcript.fallback(&last.text(), handler);
        }
    }
}

impl StreamParser for PiStream {
    type Event = PiEvent;
    const NAME: &'static str = "pi";

    fn handle(&mut self, event: PiEvent, handler: &mut dyn InvokeHandler) {
        match event {
            PiEvent::MessageStart { message } => self.handle_message_start(message, handler),
            PiEvent::MessageUpdate {
                message,
                assistant_message_event,
            } => self.handle_update(message, assistant_message_event, handler),
            PiEvent::MessageEnd { message } => {
                if let Some(usage) = message.as_ref().and_then(|m| m.usage.as_ref()) {
                    let usage = TokenUsage::from(usage);
                    handler.on_tokens(usage.input, usage.output);
                }
            }
            PiEvent::ToolExecutionEnd {
                tool_call_id,
                tool_name,
                result,
                is_error,
            } => {
                debug!(backend = Self::NAME, id = ?tool_call_id, is_error, "tool finished");
                if !tool_name.is_empty() {
                    handler.on_tool_result(&tool_name, &tool_result_text(&result));
                }
            }
            PiEvent::AgentEnd { messages } => self.handle_agent_end(messages, handler),
            PiEvent::Session
            | PiEvent::AgentStart
            | PiEvent::TurnStart
            | PiEvent::TurnEnd
            | PiEvent::ToolExecutionStart => {}
            PiEvent::Unknown => debug!(backend = Self::NAME, "unhandled event type"),
        }
    }

    fn finish(self, handler: &mut dyn InvokeHandler) -> String {
        self.ledger.report(handler);
        self.transcript.into_text()
    }
}
