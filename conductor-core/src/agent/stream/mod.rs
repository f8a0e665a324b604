//! Normalizers for each backend's line-delimited JSON stream
//!
//! Each backend gets a closed serde event enum and a parser that maps those
//! events onto [`InvokeHandler`] callbacks. The shared driver reads stdout
//! line by line and skips anything that does not parse.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::io::AsyncRead;
use tracing::debug;

use super::output::{truncate, InvokeHandler, LineReader};

mod claude;
mod codex;
mod opencode;
mod pi;

pub(crate) use claude::ClaudeStream;
pub(crate) use codex::CodexStream;
pub(crate) use opencode::OpenCodeStream;
pub(crate) use pi::PiStream;

/// A backend protocol: how one decoded line becomes callbacks
pub(crate) trait StreamParser: Send {
    /// One decoded line of the protocol
    type Event: DeserializeOwned;

    /// Backend name used in logs and as the last-resort model name
    const NAME: &'static str;

    fn handle(&mut self, event: Self::Event, handler: &mut dyn InvokeHandler);

    /// Flush end-of-stream reporting and return the accumulated text
    fn finish(self, handler: &mut dyn InvokeHandler) -> String;
}

/// Drive `parser` over every line of `reader`
pub(crate) async fn normalize<R, P>(reader: R, mut parser: P, handler: &mut dyn InvokeHandler) -> String
where
    R: AsyncRead + Unpin,
    P: StreamParser,
{
    let mut lines = LineReader::new(reader);

    while let Some(line) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<P::Event>(line) {
            Ok(event) => parser.handle(event, handler),
            Err(e) => debug!(
                backend = P::NAME,
                error = %e,
                line = %truncate(line, 100),
                "skipping unparseable stream line"
            ),
        }
    }

    parser.finish(handler)
}

/// Text accumulated during one invocation plus the tool ids already reported
#[derive(Debug, Default)]
pub(crate) struct Transcript {
    text: String,
    seen: HashSet<String>,
}

impl Transcript {
    pub(crate) fn push_text(&mut self, text: &str, handler: &mut dyn InvokeHandler) {
        if text.is_empty() {
            return;
        }
        self.text.push_str(text);
        handler.on_output(text);
    }

    /// True the first time a non-empty id is seen, and always for missing ids
    pub(crate) fn first_sighting(&mut self, id: Option<&str>) -> bool {
        match id.filter(|id| !id.is_empty()) {
            Some(id) => self.seen.insert(id.to_string()),
            None => true,
        }
    }

    /// Report a tool use unless its id was already reported
    pub(crate) fn report_tool_use(
        &mut self,
        id: Option<&str>,
        name: &str,
        input: &Value,
        handler: &mut dyn InvokeHandler,
    ) -> bool {
        if !self.first_sighting(id) {
            debug!(tool = name, id = ?id, "duplicate tool use skipped");
            return false;
        }
        handler.on_tool_use(name, input);
        true
    }

    /// Use a terminal result string when no text was streamed
    pub(crate) fn fallback(&mut self, text: &str, handler: &mut dyn InvokeHandler) {
        if self.text.is_empty() {
            self.push_text(text, handler);
        }
    }

    pub(crate) fn into_text(self) -> String {
        self.text
    }
}

/// Flatten a tool result payload into readable text
///
/// Strings pass through. `{content: [{text}]}` objects, arrays of them, and
/// arrays of bare `{text}` blocks are joined with newlines. Anything else is
/// rendered as compact JSON; null is empty.
pub(crate) fn tool_result_text(result: &Value) -> String {
    match result {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        _ => {
            let mut texts = content_texts(result);
            if texts.is_empty() {
                if let Value::Array(items) = result {
                    for item in items {
                        let nested = content_texts(item);
                        if nested.is_empty() {
                            texts.extend(item.get("text").and_then(Value::as_str));
                        } else {
                            texts.extend(nested);
                        }
                    }
                }
            }

            if texts.is_empty() {
                result.to_string()
            } else {
                texts.join("\n")
            }
        }
    }
}

fn content_texts(value: &Value) -> Vec<&str> {
    value
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Deserialize a JSON array, dropping elements that do not fit `T`
///
/// Anything that is not an array yields an empty list.
pub(crate) fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
