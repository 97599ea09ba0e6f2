//! Deadline-bounded calls.
//!
//! Every remote call the orchestrator makes must be bounded by a configured
//! timeout, after which the outcome is unknown and the caller compensates.
//! [`with_deadline`] wraps a future and folds the elapsed case into a typed
//! error alongside the operation's own failure, so call sites match on one
//! enum instead of nesting results.

use std::time::Duration;

use thiserror::Error;

/// Failure of a deadline-bounded call: either the operation itself failed,
/// or the deadline expired and the outcome is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeadlineError<E> {
    /// The deadline expired before the operation resolved
    #[error("call timed out after {0:?}")]
    Elapsed(Duration),

    /// The operation resolved with its own error
    #[error(transparent)]
    Inner(E),
}

impl<E> DeadlineError<E> {
    /// Whether this failure was the deadline expiring
    #[must_use]
    pub const fn is_elapsed(&self) -> bool {
        matches!(self, Self::Elapsed(_))
    }
}

/// Run a fallible future under a deadline.
///
/// # Errors
///
/// Returns [`DeadlineError::Elapsed`] if `limit` expires first, or
/// [`DeadlineError::Inner`] if the operation resolves with an error.
pub async fn with_deadline<T, E>(
    limit: Duration,
    operation: impl Future<Output = Result<T, E>>,
) -> Result<T, DeadlineError<E>>
where
    E: std::error::Error,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(DeadlineError::Inner(err)),
        Err(_) => Err(DeadlineError::Elapsed(limit)),
    }
}
