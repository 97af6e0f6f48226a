//! Versioned task synchronization engine
//!
//! Clients keep a watermark and pull only the records changed after it, and
//! push edits that are admitted by whole-record last-write-wins on their
//! client-declared version:
//! - Pull: [`SyncEngine::changes_since`]
//! - Push: [`SyncEngine::apply_batch`], with per-edit outcomes in a [`PushReport`]
//! - Request dispatch for the wire surface: [`protocol::dispatch`]
//!
//! # Example
//!
//! ```rust,no_run
//! use tasksync_core::{TaskEdit, Version};
//! use tasksync_database::TaskStore;
//! use tasksync_sync_engine::{SyncEngine, SyncSettings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = TaskStore::open_in_memory().await?;
//! let engine = SyncEngine::new(store, SyncSettings::default());
//! let account = engine.accounts().resolve("a@example.com").await?;
//!
//! engine
//!     .apply_batch(&account, vec![TaskEdit::new("t1", 1, "buy milk")])
//!     .await?;
//!
//! let changes = engine.changes_since(&account, Version::ZERO).await?;
//! assert_eq!(changes.len(), 1);
//! # Ok(())
//! # }
//! ```

mod accounts;
mod conflict;
mod engine;
mod error;
mod types;

pub mod compression;
pub mod protocol;

pub use accounts::AccountResolver;
pub use conflict::{ConflictResolver, Decision};
pub use engine::{parse_edit, SyncEngine, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use protocol::{dispatch, Response, ResponseKind};
pub use types::{ChangeSet, EditOutcome, EditResult, PushReport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: SyncSettings = SyncSettings::default();
        let _: ConflictResolver = ConflictResolver::new();
        let _: PushReport = PushReport::new();
        let _: Response = Response::unknown();
    }
}
