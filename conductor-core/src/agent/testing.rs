//! Shared helpers for agent tests

use std::path::{Path, PathBuf};

use super::output::InvokeHandler;

/// One recorded callback
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Output(String),
    ToolUse(String, serde_json::Value),
    ToolResult(String, String),
    SystemInit(String),
    Tokens(u64, u64),
    FinalTokens(String, u64, u64),
    ProcessStart,
    ProcessEnd,
}

/// Handler that records every callback in arrival order
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub events: Vec<Event>,
}

impl RecordingHandler {
    /// Concatenation of every `on_output` fragment
    pub fn output(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Output(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Names passed to `on_tool_use`, in order
    pub fn tool_uses(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::ToolUse(name, _) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `(name, result)` pairs passed to `on_tool_result`
    pub fn tool_results(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::ToolResult(name, result) => Some((name.as_str(), result.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn system_inits(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::SystemInit(model) => Some(model.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tokens(&self) -> Vec<(u64, u64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Tokens(i, o) => Some((*i, *o)),
                _ => None,
            })
            .collect()
    }

    pub fn final_tokens(&self) -> Vec<(&str, u64, u64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::FinalTokens(m, i, o) => Some((m.as_str(), *i, *o)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }
}

impl InvokeHandler for RecordingHandler {
    fn on_output(&mut self, text: &str) {
        self.events.push(Event::Output(text.to_string()));
    }

    fn on_tool_use(&mut self, name: &str, input: &serde_json::Value) {
        self.events.push(Event::ToolUse(name.to_string(), input.clone()));
    }

    fn on_tool_result(&mut self, name: &str, result: &str) {
        self.events
            .push(Event::ToolResult(name.to_string(), result.to_string()));
    }

    fn on_system_init(&mut self, model: &str) {
        self.events.push(Event::SystemInit(model.to_string()));
    }

    fn on_tokens(&mut self, input: u64, output: u64) {
        self.events.push(Event::Tokens(input, output));
    }

    fn on_final_tokens(&mut self, model: &str, input: u64, output: u64) {
        self.events
            .push(Event::FinalTokens(model.to_string(), input, output));
    }

    fn on_process_start(&mut self, _pid: u32) {
        self.events.push(Event::ProcessStart);
    }

    fn on_process_end(&mut self) {
        self.events.push(Event::ProcessEnd);
    }
}

/// Write an executable shell script standing in for an agent CLI
#[cfg(unix)]
pub fn fake_cli(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Lines of a heredoc-free script that prints each line to stdout
#[cfg(unix)]
pub fn echo_lines(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| format!("printf '%s\\n' '{}'", line.replace('\'', r"'\''")))
        .collect::<Vec<_>>()
        .join("\n")
}
