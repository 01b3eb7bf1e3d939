//! Error types for the portfolio tracker SDK

use thiserror::Error;

/// Errors raised by data sources, the pricing service and the session API
#[derive(Debug, Error)]
pub enum RequestError {
    /// Required input was missing
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// No response within the operation's time bound
    #[error("Request timeout")]
    Timeout,

    /// Server (or the offline book) reported an error payload
    #[error("API error: {0}")]
    ApiError(String),

    /// Response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Requested coin or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key-value store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RequestError {
    /// Creates a Validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates an ApiError
    pub fn api(msg: impl Into<String>) -> Self {
        Self::ApiError(msg.into())
    }

    /// Creates an InvalidResponse error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Maps a transport failure, keeping client-side timeouts distinct
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(err)
        }
    }
}

/// Errors raised by key-value store implementations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data exists but cannot be read back; it must not be overwritten
    #[error("Stored data is unreadable: {0}")]
    Unreadable(String),
}

/// A dashboard panel that failed to refresh
///
/// The dashboard keeps rendering the previous contents of a failed panel,
/// so these are reported alongside the refreshed view rather than aborting it.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Failed to refresh market listing: {0}")]
    Market(#[source] RequestError),

    #[error("Failed to refresh global market stats: {0}")]
    Global(#[source] RequestError),

    #[error("Failed to refresh holdings: {0}")]
    Holdings(#[source] RequestError),
}
