//! Error types for the reconciliation engine.
//!
//! Apart from `Schema`, every class is local to a single VM: one VM's
//! failure is recorded in its own result and never aborts the rest of the
//! fleet. `Schema` indicates a malformed field-spec definition, which is a
//! programmer error and fatal to the whole run.

use thiserror::Error;

/// Errors that can occur during VM reconciliation
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed field-spec definition (programmer error, fatal)
    #[error("schema definition error: {0}")]
    Schema(String),

    /// Desired spec fails required/type constraints (aborts that VM only)
    #[error("invalid field {path}: {message}")]
    Validation { path: String, message: String },

    /// Restart/recreate required without the matching force flag
    #[error("changes require VM {action} (set {flag} to allow)")]
    Authorization { action: String, flag: String },

    /// Worker pool could not be set up (fatal to the whole run)
    #[error("failed to build worker pool: {0}")]
    Runtime(String),

    /// A provider operation failed (aborts that VM only)
    #[error(transparent)]
    Provider(#[from] computekit::Error),

    /// A compensating action after a failed operation also failed. The
    /// original failure stays primary; the compensation failure is appended.
    #[error("{original}; compensating start also failed: {compensation}")]
    Compensation {
        original: String,
        compensation: String,
    },
}

impl Error {
    /// Whether this error aborts the whole run rather than a single VM.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Schema(_) | Self::Runtime(_))
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;
