//! Delivery error types.

use std::time::Duration;
use thiserror::Error;

/// Maximum number of response body bytes kept in an error message.
const MAX_BODY_LEN: usize = 512;

/// Errors from a single delivery attempt.
///
/// Everything except [`DeliveryError::Rejected`] is transient and is simply
/// retried on the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Network-level failure (connection refused, DNS, reset)
    #[error("Connection error: {0}")]
    Transport(String),

    /// No response within the delivery timeout
    #[error("Delivery timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Endpoint answered but is temporarily unable to accept (5xx, 408, 429)
    #[error("Endpoint unavailable (HTTP {status}): {body}")]
    Unavailable { status: u16, body: String },

    /// Endpoint refused the payload itself (4xx)
    #[error("Endpoint rejected record (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

impl DeliveryError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = truncate(body.into());
        match status {
            408 | 429 => DeliveryError::Unavailable { status, body },
            400..=499 => DeliveryError::Rejected { status, body },
            _ => DeliveryError::Unavailable { status, body },
        }
    }

    pub fn is_transient(&self) -> bool {
        !matches!(self, DeliveryError::Rejected { .. })
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_BODY_LEN {
        let mut end = MAX_BODY_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(!DeliveryError::from_status(400, "").is_transient());
        assert!(!DeliveryError::from_status(422, "").is_transient());
        assert!(DeliveryError::from_status(408, "").is_transient());
        assert!(DeliveryError::from_status(429, "").is_transient());
        assert!(DeliveryError::from_status(500, "").is_transient());
        assert!(DeliveryError::from_status(503, "").is_transient());
    }

    #[test]
    fn test_network_errors_are_transient() {
        assert!(DeliveryError::Transport("refused".into()).is_transient());
        assert!(DeliveryError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let err = DeliveryError::from_status(400, "x".repeat(2000));
        match err {
            DeliveryError::Rejected { body, .. } => {
                assert_eq!(body.len(), MAX_BODY_LEN + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let err = DeliveryError::from_status(422, "bad field");
        assert_eq!(
            err.to_string(),
            "Endpoint rejected record (HTTP 422): bad field"
        );
        assert_eq!(
            DeliveryError::Timeout(Duration::from_millis(250)).to_string(),
            "Delivery timed out after 250ms"
        );
    }
}
