//! Shared domain types for TaskSync
//!
//! Accounts, task records, version stamps and the error taxonomy used by the
//! store, the sync engine and the command-line front end.

pub mod clock;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use clock::VersionClock;
pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{Account, AccountId, TaskEdit, TaskId, TaskRecord, Validator, Version};
