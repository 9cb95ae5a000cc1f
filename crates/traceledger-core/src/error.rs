//! Shared error kinds for the ingestion-to-audit pipeline.
//!
//! Every crate in the workspace returns this enum (or wraps it) rather than
//! `anyhow::Error`, so the API layer can translate a single, closed set of
//! kinds into HTTP status codes and the worker can translate it into
//! ack/nak/DLQ decisions.

use thiserror::Error;

/// The error kinds surfaced by the core, per the error handling design.
///
/// Policy: retry only `Transient`; dead-letter `Validation` and `NotFound`
/// (they will never succeed on redelivery); `Integrity` halts processing of
/// the affected stream until operator intervention.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error kind should ever be retried by a bus consumer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Whether this error kind is permanent and should go straight to the
    /// dead-letter subject without consuming a retry attempt.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound(_))
    }

    /// Whether this error kind is fatal and should halt the affected stream
    /// rather than being silently retried or dead-lettered.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Validation(format!("malformed json: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
