//! Ingestion endpoint integration
//!
//! This module provides the client that ships event batches to the remote
//! ingestion API, plus the transport seam it sends through.

pub mod client;
pub mod transport;

pub use client::{
    basic_auth_header, EventFailure, EventSuccess, IngestionClient, IngestionError,
    IngestionResponse, INGESTION_PATH,
};
pub use transport::{HttpTransport, Transport, TransportResponse};
