//! Error types for compute provider operations.
//!
//! Errors are categorized so callers can decide whether a failed call is
//! worth retrying. Only transport-level unavailability is retryable; a
//! failed semantic operation (create/update/delete) never is.

use crate::types::OperationKind;
use thiserror::Error;

/// Categories of provider errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Provider temporarily unavailable (transient, retryable)
    Unavailable,
    /// Resource does not exist
    NotFound,
    /// Authentication or authorization failure
    Auth,
    /// Request was malformed or rejected by validation
    InvalidRequest,
    /// A long-running operation reached a terminal failure
    OperationFailed,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unavailable => "Provider temporarily unavailable",
            Self::NotFound => "Resource not found",
            Self::Auth => "Authentication failed",
            Self::InvalidRequest => "Invalid request",
            Self::OperationFailed => "Operation failed",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while talking to the compute provider.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider endpoint unavailable or transport failure
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Detailed message from the failed call
        message: String,
    },

    /// Resource does not exist
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Authentication or authorization failure
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Request rejected by the provider's validation
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// A long-running operation reached a terminal failure state
    #[error("{kind} operation failed: {message}")]
    OperationFailed {
        /// Which operation kind failed
        kind: OperationKind,
        /// Provider-reported failure message
        message: String,
    },

    /// Timed out waiting for a long-running operation
    #[error("timed out waiting for {kind} operation {id}")]
    OperationTimeout { kind: OperationKind, id: String },

    /// HTTP-level error that does not map to a known category
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Unavailable { .. } => ErrorCategory::Unavailable,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Auth { .. } => ErrorCategory::Auth,
            Error::InvalidRequest { .. } => ErrorCategory::InvalidRequest,
            Error::OperationFailed { .. } | Error::OperationTimeout { .. } => {
                ErrorCategory::OperationFailed
            }
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Map an HTTP status code to a categorized error.
    pub fn from_status(code: u16, context: &str) -> Self {
        match code {
            400 => Error::InvalidRequest {
                message: context.to_string(),
            },
            401 | 403 => Error::Auth {
                message: format!("{context} (HTTP {code})"),
            },
            404 => Error::NotFound {
                resource: context.to_string(),
            },
            429 | 502 | 503 | 504 => Error::Unavailable {
                message: format!("{context} (HTTP {code})"),
            },
            _ => Error::Http {
                message: format!("{context} (HTTP {code})"),
            },
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Error::from_status(code, "request failed"),
            // Connection, DNS and TLS failures are transport-level and transient.
            other => Error::Unavailable {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for compute provider operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(
            Error::Unavailable {
                message: "503".into()
            }
            .is_retryable()
        );
        assert!(
            !Error::NotFound {
                resource: "instance".into()
            }
            .is_retryable()
        );
        assert!(
            !Error::OperationFailed {
                kind: OperationKind::Create,
                message: "quota exceeded".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_from_status_mapping() {
        assert_eq!(
            Error::from_status(503, "list").category(),
            ErrorCategory::Unavailable
        );
        assert_eq!(
            Error::from_status(404, "instance").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::from_status(401, "list").category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            Error::from_status(400, "create").category(),
            ErrorCategory::InvalidRequest
        );
        assert_eq!(
            Error::from_status(500, "get").category(),
            ErrorCategory::Other
        );
    }
}
