//! Structured validation output.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ValidationIssue {
    /// Stable rule code (e.g. `CIRCULAR_REFERENCE`)
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Offending field, if the rule targets one
    pub field: Option<String>,
    /// Offending entity, when a rule runs per node or per pair
    pub entity_id: Option<String>,
}

impl ValidationIssue {
    /// Create an issue without field or entity.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            entity_id: None,
        }
    }

    /// Builder: set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Builder: set the entity.
    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Outcome of running a rule set.
///
/// `is_valid` is true iff `errors` is empty; warnings never affect validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Build a result from collected issues.
    pub fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// A result with no issues.
    pub fn valid() -> Self {
        Self::from_issues(Vec::new(), Vec::new())
    }

    /// Fold another result into this one.
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.is_valid = self.errors.is_empty();
        self
    }

    /// Check whether an error with the given code was reported.
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Check whether a warning with the given code was reported.
    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_follows_errors() {
        let warnings_only = ValidationResult::from_issues(
            vec![],
            vec![ValidationIssue::new("W", "warning")],
        );
        assert!(warnings_only.is_valid);

        let merged = warnings_only.merge(ValidationResult::from_issues(
            vec![ValidationIssue::new("E", "error").with_field("startDate")],
            vec![],
        ));
        assert!(!merged.is_valid);
        assert!(merged.has_error("E"));
        assert!(merged.has_warning("W"));
        assert_eq!(merged.errors[0].field.as_deref(), Some("startDate"));
    }
}
