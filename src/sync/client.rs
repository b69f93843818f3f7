//! HTTP delivery client for the remote API.
//!
//! Each record is sent as its own `POST` carrying the raw payload. A 2xx
//! response is the only success signal; everything else is classified into a
//! [`DeliveryError`].

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use uuid::Uuid;

use super::error::DeliveryError;
use crate::models::{Record, RecordKind};

/// Header carrying the per-record deduplication key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// A destination that can accept records.
///
/// `deliver` resolves to `Ok(())` only on an explicit acknowledgment.
pub trait Endpoint: Send + Sync {
    fn deliver(&self, record: &Record) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Delivery over HTTP to the LockIn API.
pub struct HttpEndpoint {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    installation_id: Uuid,
    timeout: Duration,
}

impl HttpEndpoint {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        installation_id: Uuid,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            installation_id,
            timeout,
        })
    }

    /// Returns the API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Builds the delivery URL for a record kind.
    fn build_url(&self, kind: RecordKind) -> String {
        let base = self.api_url.trim_end_matches('/');

        // Bare host:port defaults to plain http
        let base = if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("http://{}", base)
        };

        format!("{}{}", base, kind.endpoint_path())
    }

    /// Stable key for a record, unique across installations.
    pub fn idempotency_key(&self, record: &Record) -> String {
        format!("{}:{}:{}", self.installation_id, record.kind, record.id)
    }
}

impl Endpoint for HttpEndpoint {
    async fn deliver(&self, record: &Record) -> Result<(), DeliveryError> {
        let url = self.build_url(record.kind);

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(IDEMPOTENCY_HEADER, self.idempotency_key(record))
            .body(record.payload.clone());

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Timeout(self.timeout)
            } else {
                DeliveryError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(kind = %record.kind, id = record.id, %status, "Delivery acknowledged");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::from_status(status.as_u16(), body))
    }
}
