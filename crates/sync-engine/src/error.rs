//! Error types for sync operations

use crate::types::PushReport;
use tasksync_core::AppError;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// A store failure stopped a push part-way through
    ///
    /// The first `processed` edits were resolved and are reported in
    /// `partial`; the rest were not attempted and can be resubmitted.
    #[error("Push aborted after {processed} of {total} edits: {source}")]
    BatchAborted {
        processed: usize,
        total: usize,
        partial: PushReport,
        #[source]
        source: AppError,
    },

    /// The push carried more edits than the engine accepts at once
    #[error("Batch of {size} edits exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// Resubmitting the remainder of a push kept failing
    #[error("Push gave up after {attempts} attempts ({processed} of {total} edits processed): {last_error}")]
    RetriesExhausted {
        attempts: usize,
        processed: usize,
        total: usize,
        partial: PushReport,
        #[source]
        last_error: AppError,
    },

    /// Error from the store or the domain layer
    #[error(transparent)]
    App(#[from] AppError),

    /// Request or response (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Returns true if the same request may succeed when sent again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BatchAborted { source, .. } => source.is_retryable(),
            Self::RetriesExhausted { last_error, .. } => last_error.is_retryable(),
            Self::App(e) => e.is_retryable(),
            Self::BatchTooLarge { .. } | Self::Serialization(_) => false,
        }
    }

    /// Returns the edits resolved before the failure, if any were
    pub fn partial_report(&self) -> Option<&PushReport> {
        match self {
            Self::BatchAborted { partial, .. } | Self::RetriesExhausted { partial, .. } => {
                Some(partial)
            }
            _ => None,
        }
    }

    /// Returns a message suitable for sending back to a client
    pub fn user_message(&self) -> String {
        match self {
            Self::BatchAborted { source, .. } => source.user_message(),
            Self::RetriesExhausted { last_error, .. } => last_error.user_message(),
            Self::App(e) => e.user_message(),
            Self::BatchTooLarge { limit, .. } => {
                format!("Too many changes at once. Send at most {} per request.", limit)
            }
            Self::Serialization(_) => "The request could not be read.".to_string(),
        }
    }
}
