//! Error types for Lokalisointi

use thiserror::Error;

/// Result type alias for Lokalisointi operations
pub type Result<T> = std::result::Result<T, LokalisointiError>;

/// Object store failure, classified by whether retrying can help
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transient condition (timeouts, dropped connections, throttling, 5xx)
    #[error("transient object store failure: {0}")]
    Retryable(String),

    /// Permission problems, malformed requests and other permanent faults
    #[error("object store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Retryable(_))
    }
}

/// Main error type for Lokalisointi
#[derive(Error, Debug)]
pub enum LokalisointiError {
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    ObjectStore(#[from] StoreError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Remote sync error: {0}")]
    RemoteSync(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LokalisointiError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LokalisointiError::ObjectStore(e) => e.is_retryable(),
            LokalisointiError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// HTTP status used when the error reaches the API layer
    pub fn status_code(&self) -> u16 {
        match self {
            LokalisointiError::Validation(_) => 400,
            LokalisointiError::NotFound(_) => 404,
            LokalisointiError::RemoteSync(_) => 502,
            LokalisointiError::ObjectStore(StoreError::Retryable(_)) => 503,
            _ => 500,
        }
    }
}
