//! Error types and recovery strategies for TaskSync
//!
//! Errors fall into three severity tiers:
//! - **Recoverable**: the caller may retry (storage temporarily unreachable)
//! - **Degraded**: the single request fails but the service continues (bad edit)
//! - **Fatal**: operator intervention required (corrupted store, failed migration)
//!
//! Each error carries a recovery action so the sync engine and the CLI can
//! decide whether a retry is worthwhile.

use std::fmt;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry with exponential backoff (store busy or unreachable)
    RetryWithBackoff,
    /// Skip the offending item and continue with the rest of the batch
    SkipItem,
    /// Attempt to repair the database
    RepairDatabase,
    /// No automatic recovery - the caller has a bug or bad input
    FixCaller,
    /// No automatic recovery - operator intervention required
    OperatorIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::SkipItem => write!(f, "Skipping item"),
            Self::RepairDatabase => write!(f, "Repairing database"),
            Self::FixCaller => write!(f, "Caller must correct the request"),
            Self::OperatorIntervention => write!(f, "Operator intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// The request fails but the service continues
    Degraded,
    /// Critical error requiring operator action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for TaskSync
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Storage Errors =====
    /// Underlying medium unreachable or the transaction failed
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Integrity check reported damage
    #[error("Storage corrupted: {details}")]
    StorageCorrupted { details: String },

    /// Schema migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    // ===== Sync Errors =====
    /// A record was requested under an account that does not exist
    #[error("Unknown account: {account}")]
    UnknownAccount { account: String },

    /// An incoming edit is missing required fields or is otherwise unusable
    #[error("Malformed edit{}: {reason}", quoted_id(.task_id))]
    MalformedEdit {
        task_id: Option<String>,
        reason: String,
    },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::StorageUnavailable { .. } => ErrorSeverity::Recoverable,

            Self::MalformedEdit { .. }
            | Self::UnknownAccount { .. }
            | Self::InvalidArgument { .. } => ErrorSeverity::Degraded,

            Self::StorageCorrupted { .. } | Self::MigrationFailed { .. } => ErrorSeverity::Fatal,

            Self::InternalError { .. } => ErrorSeverity::Degraded,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::StorageUnavailable { .. } => RecoveryAction::RetryWithBackoff,
            Self::MalformedEdit { .. } => RecoveryAction::SkipItem,
            Self::StorageCorrupted { .. } => RecoveryAction::RepairDatabase,
            Self::UnknownAccount { .. } | Self::InvalidArgument { .. } => {
                RecoveryAction::FixCaller
            }
            _ => RecoveryAction::OperatorIntervention,
        }
    }

    /// Returns a message suitable for sending back to a client
    pub fn user_message(&self) -> String {
        match self {
            Self::StorageUnavailable { .. } => {
                "The task store is temporarily unavailable. Please try again.".to_string()
            }
            Self::StorageCorrupted { .. } | Self::MigrationFailed { .. } => {
                "The task store needs maintenance. Please contact the administrator.".to_string()
            }
            Self::UnknownAccount { .. } => "Your account could not be found. Please sign in again.".to_string(),
            Self::MalformedEdit { task_id, .. } => match task_id {
                Some(id) => format!("The edit for task {} could not be read.", id),
                None => "An edit could not be read.".to_string(),
            },
            Self::InternalError { .. } => {
                "An unexpected error occurred. Please try again.".to_string()
            }
            Self::InvalidArgument { .. } => "Invalid input provided.".to_string(),
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(self.recovery_action(), RecoveryAction::RetryWithBackoff)
    }

    /// Helper to create a storage error from any error type
    pub fn storage<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a malformed-edit error
    pub fn malformed(task_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::MalformedEdit {
            task_id: task_id.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Helper to create an unknown-account error
    pub fn unknown_account(account: impl fmt::Display) -> Self {
        Self::UnknownAccount {
            account: account.to_string(),
        }
    }
}

fn quoted_id(task_id: &Option<String>) -> String {
    task_id
        .as_ref()
        .map(|id| format!(" '{}'", id))
        .unwrap_or_default()
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
