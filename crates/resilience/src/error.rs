//! Error types for resilience operations

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned when an operation could not be completed under a retry policy
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts exhausted: {last_error}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        last_error: BoxError,
    },

    /// The operation failed with an error the policy does not retry
    #[error("Attempt {attempt} failed permanently: {error}")]
    Permanent {
        attempt: usize,
        #[source]
        error: BoxError,
    },
}

impl ResilienceError {
    /// Returns the number of attempts made before giving up
    pub fn attempts(&self) -> usize {
        match self {
            Self::RetriesExhausted { attempts, .. } => *attempts,
            Self::Permanent { attempt, .. } => *attempt,
        }
    }

    /// Returns the error of the last attempt
    pub fn last_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match self {
            Self::RetriesExhausted { last_error, .. } => last_error.as_ref(),
            Self::Permanent { error, .. } => error.as_ref(),
        }
    }
}
