//! Correlation handles returned to callers
//!
//! A [`TraceContext`] is created once per task; a [`SpanContext`] once per
//! phase instance. Both are plain values the caller keeps for as long as the
//! trace or phase is open.

use serde_json::Value;

use super::model::TraceMetadata;

/// Handle for an open trace
#[derive(Debug, Clone, PartialEq)]
pub struct TraceContext {
    /// Correlation key. Same value as `task_id`.
    pub trace_id: String,
    pub task_id: String,
    pub metadata: TraceMetadata,
}

/// Handle for an open phase
#[derive(Debug, Clone, PartialEq)]
pub struct SpanContext {
    pub span_id: String,
    pub phase_name: String,
    /// Copied from the owning trace
    pub trace_id: String,
}

/// One LLM invocation, converted to a `generation-create` event on record
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationInput {
    pub name: String,
    pub model: String,
    pub input: Value,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub status: String,
    pub duration_ms: u64,
}

impl GenerationInput {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            input: Value::Null,
            input_tokens: 0,
            output_tokens: 0,
            status: "success".to_string(),
            duration_ms: 0,
        }
    }

    pub fn input(mut self, input: impl Into<Value>) -> Self {
        self.input = input.into();
        self
    }

    pub fn tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Token totals reported when a trace completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Whether a status string counts as a successful outcome
pub(crate) fn is_success(status: &str) -> bool {
    matches!(status, "success" | "ok" | "completed" | "skipped")
}
