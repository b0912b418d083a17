//! Shared test doubles for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use taskscope::ingestion::{IngestionError, Transport, TransportResponse};
use taskscope::TelemetryConfig;

/// One request seen by the mock
#[derive(Debug, Clone)]
pub struct Attempt {
    pub authorization: String,
    pub body: Value,
    pub succeeded: bool,
}

impl Attempt {
    pub fn events(&self) -> Vec<Value> {
        self.body["batch"].as_array().cloned().unwrap_or_default()
    }
}

/// In-memory ingestion endpoint
///
/// Fails the first `failures` requests with a transport error, then answers
/// 207 with one success (or one rejection) per event.
pub struct MockTransport {
    attempts: Mutex<Vec<Attempt>>,
    failures: AtomicUsize,
    delay: Duration,
    status: u16,
    reject_with: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
            delay: Duration::ZERO,
            status: 207,
            reject_with: None,
        }
    }

    pub fn failing(mut self, failures: usize) -> Self {
        self.failures = AtomicUsize::new(failures);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject_with = Some(message.to_string());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Events from successful requests, in delivery order
    pub fn delivered(&self) -> Vec<Value> {
        self.attempts()
            .iter()
            .filter(|a| a.succeeded)
            .flat_map(|a| a.events())
            .collect()
    }

    /// Sizes of successfully delivered batches
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.attempts()
            .iter()
            .filter(|a| a.succeeded)
            .map(|a| a.events().len())
            .collect()
    }

    /// Delivered events of one type
    pub fn delivered_of(&self, kind: &str) -> Vec<Value> {
        self.delivered()
            .into_iter()
            .filter(|e| e["type"] == kind)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(
        &self,
        _url: &str,
        authorization: &str,
        body: Vec<u8>,
    ) -> Result<TransportResponse, IngestionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let body: Value = serde_json::from_slice(&body).expect("request body is JSON");
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        self.attempts.lock().unwrap().push(Attempt {
            authorization: authorization.to_string(),
            body: body.clone(),
            succeeded: !fail && self.status < 400,
        });

        if fail {
            return Err(IngestionError::Transport("simulated outage".to_string()));
        }
        if self.status >= 400 {
            return Ok(TransportResponse {
                status: self.status,
                body: br#"{"message":"unauthorized"}"#.to_vec(),
            });
        }

        let ids: Vec<&str> = body["batch"]
            .as_array()
            .map(|events| events.iter().filter_map(|e| e["id"].as_str()).collect())
            .unwrap_or_default();

        let reply = match &self.reject_with {
            Some(message) => json!({
                "successes": [],
                "errors": ids.iter().map(|id| json!({"id": id, "status": 400, "message": message})).collect::<Vec<_>>(),
            }),
            None => json!({
                "successes": ids.iter().map(|id| json!({"id": id, "status": 201})).collect::<Vec<_>>(),
                "errors": [],
            }),
        };

        Ok(TransportResponse {
            status: self.status,
            body: serde_json::to_vec(&reply).expect("reply serializes"),
        })
    }
}

/// Config with a periodic interval long enough to never fire during a test
pub fn quiet_config() -> TelemetryConfig {
    let mut config = TelemetryConfig::with_credentials("pk-test", "sk-test").base_url("http://ingest.test");
    config.flush_interval = Duration::from_secs(3600);
    config.retry_delay = Duration::from_millis(5);
    config
}
