//! Error types for the Lemniscate scanner.

use thiserror::Error;

/// Result type alias using the Lemniscate error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the scanner's query and command surface.
///
/// Per-ticker problems never show up here: fetch failures shrink the scan
/// batch and scoring faults are downgraded to a neutral score. What remains
/// are failures that abort a whole operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream market data provider failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// The result store could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap any error chain as a persistence failure.
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Whether the caller may retry the same operation unchanged.
    ///
    /// A retried scan cannot double-seal a week, so persistence failures
    /// are safe to retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Provider(_))
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
            Self::Provider(_) => 502,
            Self::Persistence(_) => 503,
            _ => 500,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::NotFound("test".into()).status_code(), 404);
        assert_eq!(Error::InvalidInput("test".into()).status_code(), 400);
        assert_eq!(Error::Persistence("test".into()).status_code(), 503);
        assert_eq!(Error::Provider("test".into()).status_code(), 502);
        assert_eq!(Error::Internal("test".into()).status_code(), 500);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::persistence("database is locked").is_retryable());
        assert!(Error::Provider("rate limited".into()).is_retryable());
        assert!(!Error::InvalidInput("bad week".into()).is_retryable());
        assert!(!Error::Config("empty universe".into()).is_retryable());
    }

    #[test]
    fn test_anyhow_conversion_keeps_chain() {
        let err = anyhow::anyhow!("disk full").context("appending scan batch");
        let converted: Error = err.into();
        let message = converted.to_string();
        assert!(message.contains("appending scan batch"));
        assert!(message.contains("disk full"));
    }
}
