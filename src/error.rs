//! Custom error types for archivist

use std::time::Duration;
use thiserror::Error;

/// Main error type for archivist operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Provider throttled: wait {}s", .0.as_secs())]
    Throttled(Duration),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Invalid target reference: {0}")]
    InvalidTarget(String),

    #[error("Transient source failure: {0}")]
    Transient(String),

    #[error("Not initialized: run 'archivist init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl Error {
    /// Whether the media retry policy may retry this failure with backoff.
    /// Throttles are deliberately excluded: they are a mandatory wait, not a
    /// retry attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Http(_) | Error::Io(_))
    }

    /// Provider-mandated wait, if this is an explicit throttle signal
    pub fn throttle_wait(&self) -> Option<Duration> {
        match self {
            Error::Throttled(wait) => Some(*wait),
            _ => None,
        }
    }
}

/// Result type alias for archivist
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let e = Error::Config("missing key".into());
        assert_eq!(e.to_string(), "Configuration error: missing key");

        let e = Error::Throttled(Duration::from_secs(30));
        assert_eq!(e.to_string(), "Provider throttled: wait 30s");

        let e = Error::PermissionDenied("admin required".into());
        assert_eq!(e.to_string(), "Permission denied: admin required");

        let e = Error::TargetNotFound("-1001234".into());
        assert_eq!(e.to_string(), "Target not found: -1001234");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Transient("timed out".into()).is_transient());
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(Error::from(io_err).is_transient());

        // A throttle is not a retryable transient failure
        assert!(!Error::Throttled(Duration::from_secs(5)).is_transient());
        assert!(!Error::PermissionDenied("nope".into()).is_transient());
    }

    #[test]
    fn test_throttle_wait() {
        let e = Error::Throttled(Duration::from_secs(42));
        assert_eq!(e.throttle_wait(), Some(Duration::from_secs(42)));
        assert!(Error::Transient("x".into()).throttle_wait().is_none());
    }

    #[test]
    fn test_error_from_anyhow() {
        let e: Error = anyhow::anyhow!("wrapped").into();
        assert_eq!(e.to_string(), "wrapped");
    }
}
