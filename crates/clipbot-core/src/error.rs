//! Failure classification for clip conversion.
//!
//! Every failure in the pipeline carries one of three kinds. Only the
//! retry controller acts on `Retryable`; the other two travel up unchanged.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type ClipResult<T> = Result<T, ClipError>;

/// Errors raised by the clip conversion pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipError {
    /// Transient fault; the whole attempt may be resubmitted.
    #[error("retryable: {0}")]
    Retryable(String),
    /// This link cannot be converted; the service keeps running.
    #[error("non-retryable: {0}")]
    NonRetryable(String),
    /// Service-wide fault; the service must stop accepting work.
    #[error("critical: {0}")]
    Critical(String),
}

/// Kind of a [`ClipError`], used by callers that dispatch on severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`ClipError::Retryable`].
    Retryable,
    /// See [`ClipError::NonRetryable`].
    NonRetryable,
    /// See [`ClipError::Critical`].
    Critical,
}

impl ClipError {
    /// Build a retryable error.
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    /// Build a non-retryable error.
    pub fn non_retryable(msg: impl Into<String>) -> Self {
        Self::NonRetryable(msg.into())
    }

    /// Build a critical error.
    pub fn critical(msg: impl Into<String>) -> Self {
        Self::Critical(msg.into())
    }

    /// Severity of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Retryable(_) => ErrorKind::Retryable,
            Self::NonRetryable(_) => ErrorKind::NonRetryable,
            Self::Critical(_) => ErrorKind::Critical,
        }
    }
}
