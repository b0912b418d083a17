//! Drain scheduling
//!
//! A [`Drainer`] owns the buffer's read side behind an async mutex, so every
//! drain (periodic, `flush`, or `stop`) forms and sends its batches alone.
//! The [`Scheduler`] runs the periodic drain on a background task and handles
//! the one-shot stop sequence.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::buffer::EventDrain;
use crate::event::IngestionEvent;
use crate::ingestion::{IngestionClient, IngestionError};

/// Summary of one drain-and-send pass
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Events removed from the buffer
    pub events: usize,
    /// Batches attempted
    pub batches: usize,
    /// Batches lost after their retry
    pub failed_batches: usize,
    /// First send error of the pass
    pub first_error: Option<IngestionError>,
}

impl DrainReport {
    pub fn into_result(self) -> Result<(), IngestionError> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Moves buffered events into sent batches, one drain at a time
pub struct Drainer {
    drain: Mutex<EventDrain>,
    client: IngestionClient,
    max_batch_size: usize,
}

impl Drainer {
    pub fn new(drain: EventDrain, client: IngestionClient, max_batch_size: usize) -> Self {
        Self {
            drain: Mutex::new(drain),
            client,
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Pop every available event, sending a batch each time one fills up and
    /// a final partial batch once the buffer is empty.
    ///
    /// A failed batch does not stop the pass; later batches are still sent.
    pub async fn drain_and_send(&self) -> DrainReport {
        let mut drain = self.drain.lock().await;
        let mut report = DrainReport::default();
        let mut batch = Vec::with_capacity(self.max_batch_size);

        while let Some(event) = drain.try_next() {
            batch.push(event);
            if batch.len() >= self.max_batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.max_batch_size));
                self.ship(full, &mut report).await;
            }
        }
        if !batch.is_empty() {
            self.ship(batch, &mut report).await;
        }

        if report.batches > 0 {
            debug!(
                events = report.events,
                batches = report.batches,
                failed_batches = report.failed_batches,
                "Telemetry drain finished"
            );
        }
        report
    }

    async fn ship(&self, batch: Vec<IngestionEvent>, report: &mut DrainReport) {
        report.events += batch.len();
        report.batches += 1;

        if let Err(e) = self.client.send_batch_with_retry(&batch).await {
            report.failed_batches += 1;
            error!(error = %e, events = batch.len(), "Dropping telemetry batch after retry");
            if report.first_error.is_none() {
                report.first_error = Some(e);
            }
        }
    }
}

struct Running {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<DrainReport>,
}

/// Background periodic drain plus the flush/stop entry points
pub struct Scheduler {
    drainer: Arc<Drainer>,
    running: StdMutex<Option<Running>>,
}

impl Scheduler {
    /// Spawn the periodic drain task. Must be called inside a Tokio runtime.
    ///
    /// The first periodic drain happens one `interval` after start.
    pub fn start(drainer: Arc<Drainer>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_periodic(drainer.clone(), interval, stop_rx));

        Self {
            drainer,
            running: StdMutex::new(Some(Running { stop_tx, handle })),
        }
    }

    /// Drain and send now, returning the first send error
    pub async fn flush(&self) -> Result<(), IngestionError> {
        self.drainer.drain_and_send().await.into_result()
    }

    /// Stop the background task and send everything still buffered.
    ///
    /// Only the first call signals the task and waits for its final drain.
    /// Every call then runs one more flush to pick up events enqueued while
    /// the task was shutting down. The final drain's error wins over the
    /// trailing flush's.
    pub async fn stop(&self) -> Result<(), IngestionError> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let mut final_error = None;
        if let Some(Running { stop_tx, handle }) = running {
            // The task may already be gone if it panicked; the join below reports that.
            let _ = stop_tx.send(());
            match handle.await {
                Ok(report) => final_error = report.first_error,
                Err(e) => warn!(error = %e, "Telemetry scheduler task ended abnormally"),
            }
        }

        let trailing = self.flush().await;
        match final_error {
            Some(e) => Err(e),
            None => trailing,
        }
    }

    /// Whether the background task has not been stopped yet
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|r| r.is_some())
            .unwrap_or(false)
    }
}

/// Returns the report of the final drain run on stop
async fn run_periodic(
    drainer: Arc<Drainer>,
    interval: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) -> DrainReport {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_ms = interval.as_millis() as u64, "Telemetry scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = drainer.drain_and_send().await;
                if let Some(e) = report.first_error {
                    warn!(
                        error = %e,
                        failed_batches = report.failed_batches,
                        "Periodic telemetry flush lost batches"
                    );
                }
            }
            // Fires on an explicit stop and when the scheduler is dropped
            _ = &mut stop_rx => {
                let report = drainer.drain_and_send().await;
                if let Some(e) = &report.first_error {
                    warn!(error = %e, "Final telemetry flush lost batches");
                }
                info!("Telemetry scheduler stopped");
                return report;
            }
        }
    }
}
