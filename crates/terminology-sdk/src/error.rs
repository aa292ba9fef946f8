//! Error types for the terminology SDK

use thiserror::Error;

/// Errors that can occur when talking to a terminology service
#[derive(Error, Debug)]
pub enum TerminologyError {
    /// The requested concept, member or batch does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service did not answer in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The service answered with a non-success status
    #[error("Service error ({status}): {message}")]
    ServiceError { status: u16, message: String },

    /// Connection error (remote mode)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The service does not offer the requested capability
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// An asynchronous bulk operation finished unsuccessfully
    #[error("Batch failed: {0}")]
    BatchFailed(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TerminologyError {
    /// Map a transport error, keeping timeouts and connection failures distinct.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TerminologyError::Timeout(err.to_string())
        } else if err.is_connect() {
            TerminologyError::ConnectionError(err.to_string())
        } else {
            TerminologyError::HttpError(err)
        }
    }

    /// Whether the same request could reasonably succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            TerminologyError::Timeout(_) | TerminologyError::ConnectionError(_) => true,
            TerminologyError::ServiceError { status, .. } => *status >= 500 || *status == 429,
            TerminologyError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type TerminologyResult<T> = Result<T, TerminologyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TerminologyError::Timeout("query".into()).is_retryable());
        assert!(TerminologyError::ServiceError { status: 503, message: "busy".into() }.is_retryable());
        assert!(!TerminologyError::ServiceError { status: 400, message: "bad ecl".into() }.is_retryable());
        assert!(!TerminologyError::NotFound("123".into()).is_retryable());
        assert!(!TerminologyError::Unsupported("reserve".into()).is_retryable());
    }
}
