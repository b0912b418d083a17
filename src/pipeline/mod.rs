//! Telemetry batching pipeline
//!
//! - `buffer` - bounded, non-blocking event queue
//! - `scheduler` - periodic and on-demand drain into ingestion batches
//!
//! # Architecture
//!
//! ```text
//! Tracer ──enqueue──► EventSender ──► [bounded queue] ──► Drainer (mutex)
//!                                                           ▲      │
//!                          ticker / flush() / stop() ───────┘      ▼
//!                                                   IngestionClient::send_batch_with_retry
//! ```

pub mod buffer;
pub mod scheduler;

pub use buffer::{channel, EventDrain, EventSender};
pub use scheduler::{DrainReport, Drainer, Scheduler};
