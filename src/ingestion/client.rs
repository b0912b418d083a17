//! Ingestion API client
//!
//! Turns a batch of events into one `POST /api/public/ingestion` request and
//! interprets the multi-status response. Event-level rejections are logged,
//! not returned: the server has already made its final decision on them.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::transport::Transport;
use crate::event::IngestionEvent;
use crate::metrics::{BATCHES_SENT, EVENTS_REJECTED, SEND_RETRIES};

/// Path of the batch ingestion endpoint, relative to the base URL
pub const INGESTION_PATH: &str = "/api/public/ingestion";

/// Longest response body kept in a [`IngestionError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Error type for ingestion requests
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Connection failure, timeout, or unreadable response
    #[error("transport error: {0}")]
    Transport(String),
    /// The whole batch was refused (HTTP status >= 400)
    #[error("ingestion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The batch could not be serialized
    #[error("failed to serialize batch: {0}")]
    Marshal(#[from] serde_json::Error),
    /// A single event was refused inside an accepted batch
    #[error("event {id} rejected ({status}): {message}")]
    Rejected {
        id: String,
        status: u16,
        message: String,
    },
}

/// Accepted event entry in an ingestion response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventSuccess {
    pub id: String,
    pub status: u16,
}

/// Rejected event entry in an ingestion response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventFailure {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub message: Option<String>,
}

impl EventFailure {
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("no message")
    }
}

/// Per-event outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IngestionResponse {
    #[serde(default)]
    pub successes: Vec<EventSuccess>,
    #[serde(default)]
    pub errors: Vec<EventFailure>,
}

impl IngestionResponse {
    /// Rejection entry for the given event id, if any
    pub fn rejection_for(&self, id: &str) -> Option<&EventFailure> {
        self.errors.iter().find(|e| e.id == id)
    }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    batch: &'a [IngestionEvent],
}

/// Build the `Authorization` header value for a key pair
pub fn basic_auth_header(public_key: &str, secret_key: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", public_key, secret_key))
    )
}

/// Client for the batch ingestion endpoint
#[derive(Clone)]
pub struct IngestionClient {
    transport: Arc<dyn Transport>,
    endpoint: String,
    authorization: String,
    retry_delay: Duration,
}

impl IngestionClient {
    /// Create a new ingestion client
    ///
    /// # Arguments
    /// * `transport` - HTTP transport used for every request
    /// * `base_url` - Host of the ingestion API (e.g., "https://cloud.langfuse.com")
    /// * `public_key` / `secret_key` - Credentials, encoded once into a Basic header
    /// * `retry_delay` - Pause before the single retry in [`Self::send_batch_with_retry`]
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &str,
        public_key: &str,
        secret_key: &str,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), INGESTION_PATH),
            authorization: basic_auth_header(public_key, secret_key),
            retry_delay,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one batch
    ///
    /// Fails on transport errors and HTTP statuses >= 400. Individually
    /// rejected events are logged and reported in the returned response only.
    /// A 2xx body that does not parse is logged and treated as an empty
    /// success.
    pub async fn send_batch(
        &self,
        batch: &[IngestionEvent],
    ) -> Result<IngestionResponse, IngestionError> {
        if batch.is_empty() {
            return Ok(IngestionResponse::default());
        }

        let body = serde_json::to_vec(&BatchRequest { batch })?;
        let response = self
            .transport
            .post(&self.endpoint, &self.authorization, body)
            .await?;

        if response.status >= 400 {
            let mut text = String::from_utf8_lossy(&response.body).into_owned();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(IngestionError::Status {
                status: response.status,
                body: text,
            });
        }

        let parsed = match serde_json::from_slice::<IngestionResponse>(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    status = response.status,
                    error = %e,
                    "Unparsable ingestion response, assuming success"
                );
                IngestionResponse::default()
            }
        };

        for failure in &parsed.errors {
            EVENTS_REJECTED.inc();
            warn!(
                event_id = %failure.id,
                status = failure.status,
                message = failure.message(),
                "Event rejected by ingestion endpoint"
            );
        }

        debug!(
            events = batch.len(),
            accepted = parsed.successes.len(),
            rejected = parsed.errors.len(),
            "Batch delivered"
        );

        Ok(parsed)
    }

    /// Send one batch, retrying exactly once after a fixed delay
    ///
    /// Every failure kind gets the same single retry. The second failure is
    /// returned and the batch is gone.
    pub async fn send_batch_with_retry(
        &self,
        batch: &[IngestionEvent],
    ) -> Result<IngestionResponse, IngestionError> {
        let result = match self.send_batch(batch).await {
            Ok(response) => Ok(response),
            Err(first) => {
                warn!(
                    error = %first,
                    events = batch.len(),
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "Batch send failed, retrying once"
                );
                SEND_RETRIES.inc();
                tokio::time::sleep(self.retry_delay).await;
                self.send_batch(batch).await
            }
        };

        let outcome = if result.is_ok() { "success" } else { "failure" };
        BATCHES_SENT.with_label_values(&[outcome]).inc();
        result
    }
}
