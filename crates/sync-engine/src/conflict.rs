//! Last-write-wins admission of incoming edits

use tasksync_core::{TaskEdit, TaskRecord};

/// Whether an incoming edit should replace the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    Ignore,
}

/// Decides whether an edit supersedes the stored record
///
/// The whole record is the unit of conflict: the edit with the higher
/// client-declared version wins outright, there is no field merge. Only
/// client versions are compared; the server stamp of the stored record
/// plays no part in admission.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// Applies the edit if nothing is stored yet or the stored client version is older
    pub fn resolve(&self, existing: Option<&TaskRecord>, edit: &TaskEdit) -> Decision {
        match existing {
            None => Decision::Apply,
            Some(stored) if stored.client_version < edit.client_version => Decision::Apply,
            Some(_) => Decision::Ignore,
        }
    }
}
