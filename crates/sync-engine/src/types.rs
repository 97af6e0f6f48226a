//! Core sync types and data structures

use serde::{Deserialize, Serialize};
use tasksync_core::{TaskId, TaskRecord, Version};

/// Result of a pull: the changed records and the watermark to send next time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Records with a version above the requested watermark, oldest first
    pub records: Vec<TaskRecord>,
    /// `max(watermark, highest returned version)`
    pub next_watermark: Version,
    /// True when the pull was page-limited and further records may follow
    pub more_available: bool,
}

impl ChangeSet {
    /// Builds a change set, deriving the next watermark from the records
    pub fn new(records: Vec<TaskRecord>, watermark: Version) -> Self {
        let next_watermark = records
            .iter()
            .map(|r| r.version)
            .fold(watermark, Version::max);

        Self {
            records,
            next_watermark,
            more_available: false,
        }
    }

    /// Returns true if nothing changed since the watermark
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of changed records
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// What happened to a single pushed edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum EditOutcome {
    /// The edit won and was stored under a fresh server version
    Applied { version: Version },
    /// The store already held an equal-or-newer client version
    Ignored { stored_client_version: Version },
    /// The edit was unusable and never reached the store
    Rejected { reason: String },
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Outcome of one edit, tied back to its position in the pushed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResult {
    /// Zero-based position in the batch as the client sent it
    pub index: usize,
    /// Task the edit targeted, when it could be read
    pub task_id: Option<TaskId>,
    pub outcome: EditOutcome,
}

/// Per-edit outcomes of a push, in batch order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReport {
    pub results: Vec<EditResult>,
}

impl PushReport {
    /// Creates an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one edit
    pub fn record(&mut self, index: usize, task_id: Option<TaskId>, outcome: EditOutcome) {
        self.results.push(EditResult {
            index,
            task_id,
            outcome,
        });
    }

    /// Appends the results of a later partial push
    pub fn merge(&mut self, other: PushReport) {
        self.results.extend(other.results);
    }

    /// Number of edits that were stored
    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_applied()).count()
    }

    /// Ids of edits that lost to an equal-or-newer stored version
    pub fn stale_ids(&self) -> Vec<&TaskId> {
        self.results
            .iter()
            .filter(|r| r.outcome.is_ignored())
            .filter_map(|r| r.task_id.as_ref())
            .collect()
    }

    /// Rejected edits with their reasons
    pub fn rejections(&self) -> Vec<(&EditResult, &str)> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                EditOutcome::Rejected { reason } => Some((r, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Returns the outcome for the last edit that targeted `task_id`
    pub fn outcome_for(&self, task_id: &TaskId) -> Option<&EditOutcome> {
        self.results
            .iter()
            .rev()
            .find(|r| r.task_id.as_ref() == Some(task_id))
            .map(|r| &r.outcome)
    }

    /// Number of edits covered by the report
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
