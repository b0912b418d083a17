//! Tracer - public API for recording agent execution telemetry
//!
//! Every recording call builds a typed event and hands it to the buffer
//! without blocking. Delivery happens in the background; only `flush`,
//! `stop` and `ping` talk to the network on the caller's task.
//!
//! # Correlation
//!
//! ```text
//! start_trace ──► trace-create (id = task id)
//!    │
//!    ├─ start_phase ──► span-create (fresh span id, traceId)
//!    │     ├─ record_generation ──► generation-create (parentObservationId = span id)
//!    │     ├─ record_skipped    ──► event-create      (parentObservationId = span id)
//!    │     └─ end_phase ──► span-update (status, duration_ms)
//!    │
//!    └─ complete_trace ──► trace-create update (status, token totals)
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::clock::{format_timestamp, Clock, SystemClock};
use crate::config::{ConfigError, TelemetryConfig};
use crate::event::context::is_success;
use crate::event::{
    EventBody, EventCreateBody, GenerationBody, GenerationInput, IngestionEvent, Level, Outcome,
    PhaseMetadata, SkipMetadata, SpanContext, SpanCreateBody, SpanUpdateBody, TokenUsage,
    TraceBody, TraceContext, TraceMetadata, TraceOutput, Usage,
};
use crate::ingestion::{HttpTransport, IngestionClient, IngestionError, Transport};
use crate::pipeline::{self, Drainer, EventSender, Scheduler};

/// Name of the trace sent by [`Tracer::ping`]
pub const PING_TRACE_NAME: &str = "connectivity-check";

/// Error type for tracer construction
#[derive(Debug, Error)]
pub enum TracerError {
    #[error("invalid telemetry configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
}

/// Records traces, phases and generations and ships them in batches
pub struct Tracer {
    events: EventSender,
    scheduler: Scheduler,
    client: IngestionClient,
    clock: Arc<dyn Clock>,
}

impl Tracer {
    /// Create a tracer that sends over HTTP. Must be called inside a Tokio
    /// runtime: the background drain task starts immediately.
    pub fn new(config: TelemetryConfig) -> Result<Self, TracerError> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout)?);
        Self::with_parts(config, transport, Arc::new(SystemClock))
    }

    /// Create a tracer with an explicit transport and clock
    pub fn with_parts(
        config: TelemetryConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TracerError> {
        config.validate()?;

        let client = IngestionClient::new(
            transport,
            &config.base_url,
            &config.public_key,
            &config.secret_key,
            config.retry_delay,
        );
        let (events, drain) = pipeline::channel(config.buffer_capacity, clock.clone());
        let drainer = Arc::new(Drainer::new(drain, client.clone(), config.max_batch_size));
        let scheduler = Scheduler::start(drainer, config.flush_interval);

        info!(
            endpoint = client.endpoint(),
            buffer_capacity = config.buffer_capacity,
            max_batch_size = config.max_batch_size,
            "Tracer initialized"
        );

        Ok(Self {
            events,
            scheduler,
            client,
            clock,
        })
    }

    /// Open a trace for a task. The task id is reused as the trace id.
    pub fn start_trace(&self, task_id: impl Into<String>, metadata: TraceMetadata) -> TraceContext {
        let task_id = task_id.into();
        let name = metadata.workflow.clone().unwrap_or_else(|| task_id.clone());

        self.events.enqueue(EventBody::Trace(TraceBody {
            id: task_id.clone(),
            name: Some(name),
            timestamp: Some(self.now()),
            metadata: Some(metadata.clone()),
            ..Default::default()
        }));

        TraceContext {
            trace_id: task_id.clone(),
            task_id,
            metadata,
        }
    }

    /// Open a phase within a trace
    pub fn start_phase(
        &self,
        trace: &TraceContext,
        phase_name: impl Into<String>,
        metadata: PhaseMetadata,
    ) -> SpanContext {
        let span = SpanContext {
            span_id: Uuid::now_v7().to_string(),
            phase_name: phase_name.into(),
            trace_id: trace.trace_id.clone(),
        };

        self.events.enqueue(EventBody::SpanCreate(SpanCreateBody {
            id: span.span_id.clone(),
            trace_id: span.trace_id.clone(),
            name: span.phase_name.clone(),
            start_time: self.now(),
            metadata,
        }));

        span
    }

    /// Record one LLM call made during a phase
    pub fn record_generation(&self, span: &SpanContext, generation: GenerationInput) {
        let end = self.clock.now();
        let start = chrono::Duration::try_milliseconds(generation.duration_ms as i64)
            .and_then(|d| end.checked_sub_signed(d))
            .unwrap_or(end);
        let level = if is_success(&generation.status) {
            Level::Default
        } else {
            Level::Error
        };

        self.events.enqueue(EventBody::Generation(GenerationBody {
            id: Uuid::now_v7().to_string(),
            trace_id: span.trace_id.clone(),
            parent_observation_id: span.span_id.clone(),
            name: generation.name,
            model: generation.model,
            input: generation.input,
            start_time: format_timestamp(start),
            end_time: format_timestamp(end),
            usage: Usage::tokens(generation.input_tokens, generation.output_tokens),
            level,
            metadata: Outcome {
                status: generation.status,
                duration_ms: generation.duration_ms,
            },
        }));
    }

    /// Record that an activity inside a phase was skipped
    pub fn record_skipped(&self, span: &SpanContext, name: impl Into<String>, reason: impl Into<String>) {
        self.events.enqueue(EventBody::Event(EventCreateBody {
            id: Uuid::now_v7().to_string(),
            trace_id: span.trace_id.clone(),
            parent_observation_id: span.span_id.clone(),
            name: name.into(),
            start_time: self.now(),
            level: Level::Default,
            metadata: SkipMetadata {
                reason: reason.into(),
            },
        }));
    }

    /// Close a phase with its final status and duration
    pub fn end_phase(&self, span: &SpanContext, status: impl Into<String>, duration_ms: u64) {
        let status = status.into();
        let (level, status_message) = if is_success(&status) {
            (None, None)
        } else {
            (Some(Level::Error), Some(status.clone()))
        };

        self.events.enqueue(EventBody::SpanUpdate(SpanUpdateBody {
            id: span.span_id.clone(),
            trace_id: span.trace_id.clone(),
            end_time: self.now(),
            level,
            status_message,
            metadata: Outcome {
                status,
                duration_ms,
            },
        }));
    }

    /// Mark a trace finished. Calling again emits another update.
    pub fn complete_trace(&self, trace: &TraceContext, status: impl Into<String>, usage: TokenUsage) {
        self.events.enqueue(EventBody::Trace(TraceBody {
            id: trace.trace_id.clone(),
            output: Some(TraceOutput {
                status: status.into(),
                total_input_tokens: usage.input_tokens,
                total_output_tokens: usage.output_tokens,
                total_tokens: usage.total(),
            }),
            ..Default::default()
        }));
    }

    /// Send everything buffered now
    pub async fn flush(&self) -> Result<(), IngestionError> {
        self.scheduler.flush().await
    }

    /// Stop background delivery and send what is left. Safe to call more than once.
    pub async fn stop(&self) -> Result<(), IngestionError> {
        self.scheduler.stop().await
    }

    /// Check credentials and reachability with one direct, unbuffered request
    pub async fn ping(&self) -> Result<(), IngestionError> {
        let now = self.now();
        let event = IngestionEvent {
            id: Uuid::now_v7().to_string(),
            timestamp: now.clone(),
            body: EventBody::Trace(TraceBody {
                id: Uuid::now_v7().to_string(),
                name: Some(PING_TRACE_NAME.to_string()),
                timestamp: Some(now),
                ..Default::default()
            }),
        };

        let response = self.client.send_batch(std::slice::from_ref(&event)).await?;
        if let Some(failure) = response.rejection_for(&event.id) {
            return Err(IngestionError::Rejected {
                id: failure.id.clone(),
                status: failure.status,
                message: failure.message().to_string(),
            });
        }

        info!(endpoint = self.client.endpoint(), "Ingestion endpoint reachable");
        Ok(())
    }

    /// Events dropped because the buffer was full
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    /// Whether background delivery is still active
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    fn now(&self) -> String {
        format_timestamp(self.clock.now())
    }
}
