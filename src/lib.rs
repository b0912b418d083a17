//! taskscope - execution telemetry for autonomous agents
//!
//! Records traces, phases and LLM generations for an agent's tasks and ships
//! them in batches to a Langfuse-compatible ingestion endpoint. Recording
//! never blocks and never fails the caller; delivery happens on a background
//! task with a bounded buffer.
//!
//! # Modules
//!
//! - `tracer` - public recording API
//! - `event` - typed event model and correlation handles
//! - `pipeline` - bounded buffer and drain scheduler
//! - `ingestion` - batch ingestion client and HTTP transport
//! - `config` - configuration and secret sources
//! - `clock` - timestamp source
//! - `logging` - subscriber setup
//! - `metrics` - Prometheus counters for the pipeline
//!
//! # Quick Start
//!
//! ```ignore
//! use taskscope::{Tracer, TelemetryConfig, TraceMetadata, PhaseMetadata, TokenUsage};
//!
//! let tracer = Tracer::new(TelemetryConfig::with_credentials("pk-lf-...", "sk-lf-..."))?;
//! let trace = tracer.start_trace("task-1", TraceMetadata::new().workflow("plan-implement"));
//! let span = tracer.start_phase(&trace, "plan", PhaseMetadata::new().max_iterations(3));
//! tracer.end_phase(&span, "success", 1200);
//! tracer.complete_trace(&trace, "success", TokenUsage::new(1500, 300));
//! tracer.stop().await?;
//! ```

pub mod clock;
pub mod config;
pub mod event;
pub mod ingestion;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod tracer;

// Re-export commonly used types at crate root for convenience
pub use config::{EnvSecrets, SecretSource, StaticSecrets, TelemetryConfig};
pub use event::{GenerationInput, PhaseMetadata, SpanContext, TokenUsage, TraceContext, TraceMetadata};
pub use ingestion::IngestionError;
pub use tracer::{Tracer, TracerError};
