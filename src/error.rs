use thiserror::Error;

/// Main error type for the snapshot tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage busy after {attempts} attempts")]
    StorageBusy { attempts: u32 },

    // Provider errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Empty hero table for {0}")]
    EmptyTable(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TrackerError {
    /// Whether another attempt of the same operation may succeed.
    ///
    /// Timeouts, connection failures, rate limiting and 5xx responses are
    /// transient. Everything else (malformed or empty tables, validation,
    /// storage errors) surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackerError::RateLimited(_) | TrackerError::ProviderUnavailable(_) => true,
            TrackerError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(false, |s| s.is_server_error() || s.as_u16() == 429)
            }
            _ => false,
        }
    }
}

/// Result type alias for TrackerError
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(TrackerError::RateLimited("429".into()).is_retryable());
        assert!(TrackerError::ProviderUnavailable("503".into()).is_retryable());
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        assert!(!TrackerError::MalformedResponse("no rates".into()).is_retryable());
        assert!(!TrackerError::EmptyTable("competitive/PC".into()).is_retryable());
        assert!(!TrackerError::StorageBusy { attempts: 5 }.is_retryable());
        assert!(!TrackerError::Cancelled.is_retryable());
    }
}
