//! Token accounting shared by the stream normalizers

use std::ops::AddAssign;

use super::output::InvokeHandler;

/// Token counts for one turn, step, or model
///
/// `input` already includes cache reads and writes; backends report those
/// separately and they are folded in before a count reaches callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    pub fn is_zero(&self) -> bool {
        self.input == 0 && self.output == 0
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input += rhs.input;
        self.output += rhs.output;
    }
}

/// Per-model running totals, reported once the stream has ended
#[derive(Debug, Default)]
pub struct UsageLedger {
    models: Vec<(String, TokenUsage)>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `usage` to the running total for `model`
    ///
    /// All-zero usage counts as no usage and is not recorded.
    pub fn record(&mut self, model: &str, usage: TokenUsage) {
        if usage.is_zero() {
            return;
        }
        match self.models.iter_mut().find(|(name, _)| name == model) {
            Some((_, total)) => *total += usage,
            None => self.models.push((model.to_string(), usage)),
        }
    }

    /// Totals in the order models were first seen
    #[cfg(test)]
    pub(crate) fn totals(&self) -> &[(String, TokenUsage)] {
        &self.models
    }

    /// Fire `on_final_tokens` once per model; nothing when no usage was recorded
    pub fn report(self, handler: &mut dyn InvokeHandler) {
        for (model, usage) in self.models {
            handler.on_final_tokens(&model, usage.input, usage.output);
        }
    }
}

/// Pick the first non-empty model name, falling back to the backend name
pub(crate) fn model_or<'a>(candidates: &[Option<&'a str>], backend: &'a str) -> &'a str {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|m| !m.is_empty())
        .unwrap_or(backend)
}
