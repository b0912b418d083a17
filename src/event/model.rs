//! Typed ingestion events
//!
//! Each event kind carries its own body struct. The generic
//! `{"id","type","timestamp","body"}` envelope only exists at serialization
//! time (see [`IngestionEvent`]'s `Serialize` impl).

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

/// Wire-level event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    TraceCreate,
    SpanCreate,
    SpanUpdate,
    GenerationCreate,
    EventCreate,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TraceCreate => "trace-create",
            EventKind::SpanCreate => "span-create",
            EventKind::SpanUpdate => "span-update",
            EventKind::GenerationCreate => "generation-create",
            EventKind::EventCreate => "event-create",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation severity understood by the ingestion API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Default,
    Error,
}

/// Caller-supplied trace metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Anything else the caller wants attached
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TraceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Attach an extra key. Keys owned by the named fields are ignored.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert_extra(&mut self.extra, &["workflow", "repository", "branch"], key.into(), value.into());
        self
    }
}

/// Caller-supplied phase metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PhaseMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Attach an extra key. `max_iterations` is ignored here.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert_extra(&mut self.extra, &["max_iterations"], key.into(), value.into());
        self
    }
}

// Flattened extras must not repeat a named field's JSON key
fn insert_extra(extra: &mut BTreeMap<String, Value>, reserved: &[&str], key: String, value: Value) {
    if reserved.contains(&key.as_str()) {
        warn!(key = %key, "Ignoring metadata key reserved for a named field");
        return;
    }
    extra.insert(key, value);
}

/// Status and duration attached to finished observations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub status: String,
    pub duration_ms: u64,
}

/// Token counts in the ingestion API's usage shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub unit: &'static str,
}

impl Usage {
    pub fn tokens(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input.saturating_add(output),
            unit: "TOKENS",
        }
    }
}

/// Final state of a trace, sent as the trace's `output`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceOutput {
    pub status: String,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
}

/// `trace-create` body. Also used for trace updates (same id, new fields).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceBody {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TraceMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<TraceOutput>,
}

/// `span-create` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanCreateBody {
    pub id: String,
    pub trace_id: String,
    pub name: String,
    pub start_time: String,
    pub metadata: PhaseMetadata,
}

/// `span-update` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanUpdateBody {
    pub id: String,
    pub trace_id: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub metadata: Outcome,
}

/// `generation-create` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationBody {
    pub id: String,
    pub trace_id: String,
    pub parent_observation_id: String,
    pub name: String,
    pub model: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub input: Value,
    pub start_time: String,
    pub end_time: String,
    pub usage: Usage,
    pub level: Level,
    pub metadata: Outcome,
}

/// Why an activity inside a phase was skipped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipMetadata {
    pub reason: String,
}

/// `event-create` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCreateBody {
    pub id: String,
    pub trace_id: String,
    pub parent_observation_id: String,
    pub name: String,
    pub start_time: String,
    pub level: Level,
    pub metadata: SkipMetadata,
}

/// Event payload, one variant per [`EventKind`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventBody {
    Trace(TraceBody),
    SpanCreate(SpanCreateBody),
    SpanUpdate(SpanUpdateBody),
    Generation(GenerationBody),
    Event(EventCreateBody),
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::Trace(_) => EventKind::TraceCreate,
            EventBody::SpanCreate(_) => EventKind::SpanCreate,
            EventBody::SpanUpdate(_) => EventKind::SpanUpdate,
            EventBody::Generation(_) => EventKind::GenerationCreate,
            EventBody::Event(_) => EventKind::EventCreate,
        }
    }

    /// Id of the trace or observation this body describes
    pub fn subject_id(&self) -> &str {
        match self {
            EventBody::Trace(b) => &b.id,
            EventBody::SpanCreate(b) => &b.id,
            EventBody::SpanUpdate(b) => &b.id,
            EventBody::Generation(b) => &b.id,
            EventBody::Event(b) => &b.id,
        }
    }
}

/// An event as held by the buffer and sent on the wire
///
/// `id` and `timestamp` are assigned at enqueue time.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionEvent {
    pub id: String,
    pub timestamp: String,
    pub body: EventBody,
}

impl IngestionEvent {
    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }
}

#[derive(Serialize)]
struct WireEvent<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: EventKind,
    timestamp: &'a str,
    body: &'a EventBody,
}

impl Serialize for IngestionEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEvent {
            id: &self.id,
            kind: self.kind(),
            timestamp: &self.timestamp,
            body: &self.body,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_envelope() {
        let event = IngestionEvent {
            id: "evt-1".to_string(),
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            body: EventBody::Trace(TraceBody {
                id: "task-1".to_string(),
                name: Some("plan-implement".to_string()),
                ..Default::default()
            }),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], "evt-1");
        assert_eq!(json["type"], "trace-create");
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00.000Z");
        assert_eq!(json["body"]["id"], "task-1");
        assert_eq!(json["body"]["name"], "plan-implement");
        // Unset optionals stay off the wire
        assert!(json["body"].get("output").is_none());
    }

    #[test]
    fn test_metadata_flattens_extra() {
        let meta = TraceMetadata::new()
            .workflow("plan-implement")
            .repository("org/repo")
            .with("attempt", 2);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["workflow"], "plan-implement");
        assert_eq!(json["repository"], "org/repo");
        assert_eq!(json["attempt"], 2);
        assert!(json.get("branch").is_none());
    }

    #[test]
    fn test_span_update_keys() {
        let body = EventBody::SpanUpdate(SpanUpdateBody {
            id: "span-1".to_string(),
            trace_id: "task-1".to_string(),
            end_time: "2024-01-01T00:00:01.200Z".to_string(),
            level: Some(Level::Error),
            status_message: Some("failed".to_string()),
            metadata: Outcome {
                status: "failed".to_string(),
                duration_ms: 1200,
            },
        });

        assert_eq!(body.kind(), EventKind::SpanUpdate);
        assert_eq!(body.subject_id(), "span-1");

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["traceId"], "task-1");
        assert_eq!(json["endTime"], "2024-01-01T00:00:01.200Z");
        assert_eq!(json["level"], "ERROR");
        assert_eq!(json["statusMessage"], "failed");
        assert_eq!(json["metadata"]["duration_ms"], 1200);
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage::tokens(120, 30);
        assert_eq!(usage.total, 150);
        assert_eq!(serde_json::to_value(usage).unwrap()["unit"], "TOKENS");
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = Usage::tokens(u64::MAX, 1);
        assert_eq!(usage.input, u64::MAX);
        assert_eq!(usage.total, u64::MAX);
    }

    #[test]
    fn test_reserved_metadata_keys_ignored() {
        let meta = TraceMetadata::new()
            .workflow("plan-implement")
            .with("workflow", "other")
            .with("branch", "main");
        assert!(meta.extra.is_empty());
        assert_eq!(meta.branch, None);

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json.matches("\"workflow\"").count(), 1);
        assert_eq!(serde_json::to_value(&meta).unwrap()["workflow"], "plan-implement");

        let phase = PhaseMetadata::new().max_iterations(3).with("max_iterations", 9);
        assert!(phase.extra.is_empty());
        assert_eq!(serde_json::to_value(&phase).unwrap()["max_iterations"], 3);
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(EventKind::GenerationCreate.as_str(), "generation-create");
        assert_eq!(
            serde_json::to_value(EventKind::EventCreate).unwrap(),
            "event-create"
        );
    }
}
