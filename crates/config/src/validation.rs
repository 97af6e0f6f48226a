//! Per-section validation
//!
//! Sections report every problem at once so `tasksync config validate` can
//! list them together.

pub use crate::error::ValidationError;
use std::fmt::Display;
use std::ops::RangeInclusive;

/// A `[section]` of the config file
pub trait ConfigSection: Default {
    /// Checks every field, returning all problems found
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Replaces this section's values with those of `other`
    fn merge(&mut self, other: Self);

    /// Table name in the TOML file
    fn section_name(&self) -> &'static str;
}

/// Accumulates validation failures for one section
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<ValidationError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `value` to lie within `range`
    pub fn range<T>(&mut self, field: &str, value: T, range: RangeInclusive<T>) -> &mut Self
    where
        T: PartialOrd + Display,
    {
        if !range.contains(&value) {
            let message = format!("must be between {} and {}", range.start(), range.end());
            self.errors
                .push(ValidationError::with_value(field, message, value));
        }
        self
    }

    /// Requires `value` to contain something other than whitespace
    pub fn non_blank(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(ValidationError::new(field, "must not be blank"));
        }
        self
    }

    pub fn fail(&mut self, error: ValidationError) -> &mut Self {
        self.errors.push(error);
        self
    }

    /// Appends the outcome of a nested validation
    pub fn extend(&mut self, result: Result<(), Vec<ValidationError>>) -> &mut Self {
        if let Err(errors) = result {
            self.errors.extend(errors);
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }
}
