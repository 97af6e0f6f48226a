//! Sync engine configuration section

use crate::validation::{Checks, ConfigSection, ValidationError};
use serde::{Deserialize, Serialize};

/// Limits and behaviour of pull and push
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Most edits accepted in one push (0 means no limit)
    pub max_batch_size: usize,

    /// Largest accepted task content, in bytes (0 means no limit)
    pub max_content_bytes: usize,

    /// Page size for pulls (0 returns every change at once)
    pub max_pull_records: u32,

    /// Gzip pull responses for clients that accept it
    pub gzip_responses: bool,

    /// Attempts for a push interrupted by a storage failure
    pub retry_attempts: u32,

    /// Delay before the first resubmission, in milliseconds
    pub retry_initial_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            max_content_bytes: 64 * 1024,
            max_pull_records: 0,
            gzip_responses: true,
            retry_attempts: 3,
            retry_initial_delay_ms: 50,
        }
    }
}

impl ConfigSection for SyncConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Checks::new()
            .range("sync.max_batch_size", self.max_batch_size, 0..=100_000)
            .range("sync.max_content_bytes", self.max_content_bytes, 0..=16 * 1024 * 1024)
            .range("sync.max_pull_records", self.max_pull_records, 0..=1_000_000)
            .range("sync.retry_attempts", self.retry_attempts, 1..=10)
            .range("sync.retry_initial_delay_ms", self.retry_initial_delay_ms, 1..=10_000)
            .finish()
    }

    fn merge(&mut self, other: Self) {
        self.max_batch_size = other.max_batch_size;
        self.max_content_bytes = other.max_content_bytes;
        self.max_pull_records = other.max_pull_records;
        self.gzip_responses = other.gzip_responses;
        self.retry_attempts = other.retry_attempts;
        self.retry_initial_delay_ms = other.retry_initial_delay_ms;
    }

    fn section_name(&self) -> &'static str {
        "sync"
    }
}

impl SyncConfig {
    /// Returns the pull page size, or `None` when pulls are unpaged
    pub fn pull_limit(&self) -> Option<u32> {
        (self.max_pull_records > 0).then_some(self.max_pull_records)
    }
}
