//! Validation helpers for configuration values
//!
//! Each config section implements [`ConfigSection`], which includes validation.

pub use crate::error::{Problem, ValidationError};
use std::path::Path;

/// Trait for configuration sections that can validate themselves
///
/// New sections are added to [`Config`](crate::Config) without touching the
/// persistence code.
pub trait ConfigSection: Default {
    /// Validates the configuration section
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Merges another config section into this one
    ///
    /// Values from `other` take precedence.
    fn merge(&mut self, other: Self);

    /// Returns the section name for error reporting
    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a numeric value is within an inclusive range
    pub fn in_range<T>(
        value: T,
        min: T,
        max: T,
        section: &'static str,
        key: &'static str,
    ) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::new(
                section,
                key,
                Problem::OutOfRange {
                    value: value.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                },
            ))
        } else {
            Ok(())
        }
    }

    pub fn finite(
        value: f32,
        section: &'static str,
        key: &'static str,
    ) -> Result<(), ValidationError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::new(section, key, Problem::NotFinite))
        }
    }

    pub fn non_empty_path(
        path: &Path,
        section: &'static str,
        key: &'static str,
    ) -> Result<(), ValidationError> {
        if path.as_os_str().is_empty() {
            Err(ValidationError::new(section, key, Problem::EmptyPath))
        } else {
            Ok(())
        }
    }

    /// Collects multiple validation results into a single result
    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
