//! Telemetry event model
//!
//! - `model` - typed event bodies and the wire envelope
//! - `context` - trace/span handles and producer inputs

pub mod context;
pub mod model;

pub use context::{GenerationInput, SpanContext, TokenUsage, TraceContext};
pub use model::{
    EventBody, EventCreateBody, EventKind, GenerationBody, IngestionEvent, Level, Outcome,
    PhaseMetadata, SkipMetadata, SpanCreateBody, SpanUpdateBody, TraceBody, TraceMetadata,
    TraceOutput, Usage,
};
