//! API error taxonomy.

use crate::transport::TransportError;
use thiserror::Error;

/// Classified error for a failed API call.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Not authenticated, or authentication could not be repaired
    /// within the single refresh attempt allowed per call
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("Forbidden")]
    Forbidden,

    /// Non-2xx response outside the auth family
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// Response body did not decode to the expected shape
    #[error("Decoding error: {0}")]
    Decoding(#[source] serde_json::Error),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request timed out
    #[error("Request timed out")]
    Timeout,

    /// Token persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] token_vault::StorageError),

    /// Invalid session state transition
    #[error("Invalid session state transition: {0}")]
    InvalidTransition(String),

    /// Anything else
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Returns true if this error is transient and the operation can be
    /// retried by the caller (or by the refresh backoff loop).
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::ServerError(status) => (500..600).contains(status),
            _ => false,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(cause) => ApiError::Network(cause),
            TransportError::Timeout => ApiError::Timeout,
        }
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
