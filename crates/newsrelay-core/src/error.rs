//! Error types for NewsRelay.
//!
//! Every failure a polling cycle can hit maps to one of three kinds:
//! fetching the feed, reading/writing the seen record, or delivering a
//! message. [`CycleError`] folds them together at the dispatcher boundary.

use std::time::Duration;
use thiserror::Error;

/// Upstream feed could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("unexpected page markup: {0}")]
    Parse(String),
}

/// Seen record unreadable or unwritable.
#[derive(Debug, Error)]
#[error("storage error for '{entity}': {message}")]
pub struct StorageError {
    pub entity: String,
    pub message: String,
}

impl StorageError {
    pub fn new(entity: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            entity: entity.into(),
            message: message.to_string(),
        }
    }
}

/// Transport rejected a message.
#[derive(Debug, Error)]
#[error("{channel} delivery failed: {message}")]
pub struct DeliveryError {
    pub channel: String,
    pub message: String,
}

impl DeliveryError {
    pub fn new(channel: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            channel: channel.into(),
            message: message.to_string(),
        }
    }
}

/// Outcome of a failed cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Delivery failed after `persisted` ids had already been marked seen.
    #[error("{source} ({persisted} item(s) already marked seen)")]
    Delivery {
        #[source]
        source: DeliveryError,
        persisted: usize,
    },
}

impl CycleError {
    /// Short label used in logs and the failure log.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetch",
            CycleError::Storage(_) => "storage",
            CycleError::Delivery { .. } => "delivery",
        }
    }
}

/// Top-level error.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = FetchError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "timed out after 10s");
    }

    #[test]
    fn test_cycle_error_kind() {
        let err: CycleError = FetchError::Auth("bad password".into()).into();
        assert_eq!(err.kind(), "fetch");
        assert!(err.to_string().contains("bad password"));

        let err = CycleError::Delivery {
            source: DeliveryError::new("discord", "HTTP 429"),
            persisted: 3,
        };
        assert_eq!(err.kind(), "delivery");
        assert!(err.to_string().contains("3 item(s)"));
    }
}
