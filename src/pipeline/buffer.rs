//! Bounded event buffer
//!
//! ```text
//!  producers (any thread)                 single consumer
//!  ┌──────────────┐                       ┌──────────────┐
//!  │ EventSender  │──try_send──► [ bounded mpsc ] ──► │  EventDrain  │
//!  │  (cloneable) │   (never blocks)      └──────────────┘
//!  └──────────────┘
//!        │ full?
//!        └──► drop + warn
//! ```
//!
//! Producers only ever get an [`EventSender`]. The one [`EventDrain`] is
//! owned by the scheduler, so there is no way to read the queue except
//! through a drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;
use uuid::Uuid;

use crate::clock::{format_timestamp, Clock};
use crate::event::{EventBody, IngestionEvent};
use crate::metrics::{EVENTS_DROPPED, EVENTS_ENQUEUED};

/// Create a buffer holding at most `capacity` events
pub fn channel(capacity: usize, clock: Arc<dyn Clock>) -> (EventSender, EventDrain) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSender {
            tx,
            clock,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        EventDrain { rx },
    )
}

/// Enqueue handle given to producers
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<IngestionEvent>,
    clock: Arc<dyn Clock>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Stamp `body` with an id and timestamp and queue it without blocking.
    ///
    /// Returns `false` if the event was dropped (buffer full or closed).
    /// Dropping is logged; it is never an error for the caller.
    pub fn enqueue(&self, body: EventBody) -> bool {
        let event = IngestionEvent {
            id: Uuid::now_v7().to_string(),
            timestamp: format_timestamp(self.clock.now()),
            body,
        };

        match self.tx.try_send(event) {
            Ok(()) => {
                EVENTS_ENQUEUED.inc();
                true
            }
            Err(TrySendError::Full(event)) => {
                self.record_drop();
                warn!(
                    event_id = %event.id,
                    kind = %event.kind(),
                    capacity = self.tx.max_capacity(),
                    "Telemetry buffer full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.record_drop();
                warn!(
                    event_id = %event.id,
                    kind = %event.kind(),
                    "Telemetry buffer closed, dropping event"
                );
                false
            }
        }
    }

    /// Events dropped through this buffer so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        EVENTS_DROPPED.inc();
    }
}

/// The buffer's only read side
pub struct EventDrain {
    rx: mpsc::Receiver<IngestionEvent>,
}

impl EventDrain {
    /// Pop the oldest buffered event, if any
    pub fn try_next(&mut self) -> Option<IngestionEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::event::TraceBody;
    use chrono::TimeZone;

    fn body(id: &str) -> EventBody {
        EventBody::Trace(TraceBody {
            id: id.to_string(),
            ..Default::default()
        })
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(chrono::Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()))
    }

    #[test]
    fn test_enqueue_stamps_event() {
        let (tx, mut rx) = channel(4, clock());
        assert!(tx.enqueue(body("t1")));

        let event = rx.try_next().unwrap();
        assert!(!event.id.is_empty());
        assert_eq!(event.timestamp, "2024-05-01T08:00:00.000Z");
        assert_eq!(event.body.subject_id(), "t1");
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let (tx, mut rx) = channel(100, clock());
        for i in 0..100 {
            tx.enqueue(body(&i.to_string()));
        }

        let mut ids = std::collections::HashSet::new();
        while let Some(event) = rx.try_next() {
            assert!(ids.insert(event.id));
        }
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_overflow_drops_without_blocking() {
        let (tx, mut rx) = channel(3, clock());

        let accepted = (0..10).filter(|i| tx.enqueue(body(&i.to_string()))).count();
        assert_eq!(accepted, 3);
        assert_eq!(tx.dropped(), 7);

        // The oldest events are the ones kept
        let kept: Vec<String> = std::iter::from_fn(|| rx.try_next())
            .map(|e| e.body.subject_id().to_string())
            .collect();
        assert_eq!(kept, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_closed_buffer_drops() {
        let (tx, rx) = channel(3, clock());
        drop(rx);
        assert!(!tx.enqueue(body("late")));
        assert_eq!(tx.dropped(), 1);
    }
}
