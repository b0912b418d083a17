//! HTTP transport seam
//!
//! The ingestion client only needs "POST these bytes, give me status + body".
//! Keeping that behind a trait lets the pipeline be exercised without a
//! network.

use std::time::Duration;

use async_trait::async_trait;

use super::client::IngestionError;

/// Raw HTTP response as seen by the ingestion client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Sends one JSON POST request
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` with the given `Authorization` header value.
    ///
    /// Only connection-level failures are errors here; HTTP error statuses are
    /// returned as a normal response.
    async fn post(
        &self,
        url: &str,
        authorization: &str,
        body: Vec<u8>,
    ) -> Result<TransportResponse, IngestionError>;
}

/// `reqwest`-backed transport with a per-request timeout
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestionError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        authorization: &str,
        body: Vec<u8>,
    ) -> Result<TransportResponse, IngestionError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| IngestionError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| IngestionError::Transport(format!("failed to read response: {}", e)))?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
