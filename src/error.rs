//! Error types for tickwatch

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while sampling, reporting or dispatching
#[derive(Error, Debug)]
pub enum Error {
    /// A region identifier could not be mapped to a live region
    #[error("Region not found: {0}")]
    RegionNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Schedule expression rejected by the cron parser
    #[error("Invalid schedule expression '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    /// Webhook transport error (connect, timeout, TLS)
    #[error("Webhook delivery failed: {0}")]
    DeliveryTransport(#[source] reqwest::Error),

    /// Webhook endpoint answered with a non-2xx status
    #[error("Webhook endpoint returned status {status}")]
    DeliveryStatus { status: u16 },

    /// Payload serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidSchedule`]
    pub fn invalid_schedule(expression: &str, reason: impl Into<String>) -> Self {
        Error::InvalidSchedule {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this is a failed webhook delivery (transport or status)
    pub fn is_delivery(&self) -> bool {
        matches!(
            self,
            Error::DeliveryTransport(_) | Error::DeliveryStatus { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::RegionNotFound("mars".to_string());
        assert_eq!(err.to_string(), "Region not found: mars");

        let err = Error::invalid_schedule("bad", "expected at least 6 fields");
        assert_eq!(
            err.to_string(),
            "Invalid schedule expression 'bad': expected at least 6 fields"
        );
    }

    #[test]
    fn test_is_delivery() {
        assert!(Error::DeliveryStatus { status: 500 }.is_delivery());
        assert!(!Error::Config("x".into()).is_delivery());
    }
}
