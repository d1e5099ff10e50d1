//! Error taxonomy for the AGRO BOOST backend.
//!
//! Every fallible path in the workspace resolves to one of these variants.
//! The HTTP layer maps them to status codes; the MQTT listener logs them
//! at the per-event boundary and keeps going.

use thiserror::Error;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Backend error types.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or unusable identifying field in a request/payload.
    /// Never retried; surfaces as 400.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown kit, device, or notification. Surfaces as 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Business-rule refusal of a manual pump-ON request. Surfaces as 400
    /// and is always paired with an alert notification.
    #[error("threshold rejection: {0}")]
    ThresholdRejection(String),

    /// Persistence failure. Logged, surfaces as 500, no automatic retry.
    #[error("storage error: {0}")]
    Storage(String),

    /// Outbound publish failure. Logged only, never surfaced to a caller,
    /// never retried.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Validation(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("kit AGRO-001".to_string());
        assert_eq!(err.to_string(), "not found: kit AGRO-001");

        let err = Error::ThresholdRejection("battery too low".to_string());
        assert!(err.to_string().contains("battery too low"));
    }

    #[test]
    fn test_json_error_is_validation() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        assert!(matches!(Error::from(json_err), Error::Validation(_)));
    }
}
