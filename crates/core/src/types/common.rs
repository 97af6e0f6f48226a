//! Common types and utilities shared across domain models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version stamp used both for conflict admission and as a sync watermark
///
/// Server-issued stamps are milliseconds since the Unix epoch, so a
/// watermark doubles as "changed since time T".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// The watermark a client holds before its first sync
    pub const ZERO: Self = Self(0);

    /// Creates a version from its raw integer value
    pub fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw integer value
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns the immediate successor of this version
    pub fn successor(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Trait for types that can validate themselves
pub trait Validator {
    /// Validates the instance and returns errors if invalid
    fn validate(&self) -> Result<(), Vec<String>>;

    /// Returns true if the instance is valid
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
