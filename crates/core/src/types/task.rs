//! Task record domain model

use crate::error::AppError;
use crate::types::{AccountId, Validator, Version};
use serde::{Deserialize, Serialize};

/// Client-generated task identifier, unique within one owner's namespace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a task id from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the task id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The single live record for an `(owner, task_id)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub owner: AccountId,
    pub task_id: TaskId,
    /// Server-issued stamp of the last winning write
    pub version: Version,
    /// Client-declared version admitted by the last winning write
    pub client_version: Version,
    /// Opaque payload; the store never inspects it
    pub content: String,
}

impl TaskRecord {
    /// Builds the record a winning edit is stored as
    pub fn from_edit(owner: AccountId, edit: &TaskEdit, stamp: Version) -> Self {
        Self {
            owner,
            task_id: edit.task_id.clone(),
            version: stamp,
            client_version: edit.client_version,
            content: edit.content.clone(),
        }
    }

    /// Returns true if this record belongs to the given account
    pub fn is_owned_by(&self, owner: AccountId) -> bool {
        self.owner == owner
    }
}

/// An edit pushed by a client: "my copy of this task is newer than `client_version`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEdit {
    pub task_id: TaskId,
    pub client_version: Version,
    pub content: String,
}

impl TaskEdit {
    /// Creates a new edit
    pub fn new(
        task_id: impl Into<TaskId>,
        client_version: i64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            client_version: Version::from_raw(client_version),
            content: content.into(),
        }
    }

    /// Checks the fields a store write depends on
    pub fn check(&self) -> Result<(), AppError> {
        self.validate().map_err(|errors| {
            AppError::malformed(Some(self.task_id.as_str()), errors.join("; "))
        })
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Validator for TaskEdit {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.task_id.is_blank() {
            errors.push("Task id cannot be empty".to_string());
        }

        if self.client_version < Version::ZERO {
            errors.push(format!(
                "Client version cannot be negative (got {})",
                self.client_version
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
