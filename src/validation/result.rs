//! Validation results.
//!
//! A [`CheckOutcome`] is what a check's evaluation function returns. The
//! runner combines it with the catalog entry to produce the caller-facing
//! [`ValidationResult`].

use crate::catalog::registry::Validation;
use crate::core::types::{CheckStatus, Severity};
use serde::{Deserialize, Serialize};

/// Row counts for checks evaluated row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowTally {
    /// Rows the check looked at.
    pub checked: usize,
    /// Rows that did not satisfy the check.
    pub failed: usize,
}

impl RowTally {
    /// Create a tally; `failed` is clamped to `checked`.
    pub fn new(checked: usize, failed: usize) -> Self {
        Self {
            checked,
            failed: failed.min(checked),
        }
    }

    /// Rows that satisfied the check.
    pub fn passed(&self) -> usize {
        self.checked.saturating_sub(self.failed)
    }

    /// Failing rows, never more than were checked.
    pub fn failed_rows(&self) -> usize {
        self.failed.min(self.checked)
    }
}

/// One evaluation outcome as seen by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Catalog id of the check.
    pub id: String,
    /// Human-readable check name.
    pub name: String,
    /// Outcome.
    pub status: CheckStatus,
    /// Catalog severity, or an override from the check.
    pub severity: Option<Severity>,
    /// Description of what was found.
    pub message: String,
    /// Ordered structured detail lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technical_details: Vec<String>,
    /// Row counts, for row-level checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tally: Option<RowTally>,
}

impl ValidationResult {
    /// Build a result from a check's outcome.
    pub fn from_outcome(validation: &Validation, outcome: CheckOutcome) -> Self {
        Self {
            id: validation.id.clone(),
            name: validation.name.clone(),
            status: outcome.status,
            severity: outcome.severity.or(validation.severity),
            message: outcome.message,
            technical_details: outcome.details,
            tally: outcome.tally,
        }
    }

    /// Placeholder for a check that has not produced a result.
    pub fn pending(validation: &Validation, message: impl Into<String>) -> Self {
        Self::from_outcome(validation, CheckOutcome::pending(message))
    }

    /// Result for a check whose evaluation logic failed.
    ///
    /// Severity is escalated to at least `High`.
    pub fn evaluation_failed(validation: &Validation, message: impl Into<String>) -> Self {
        Self {
            id: validation.id.clone(),
            name: validation.name.clone(),
            status: CheckStatus::Fail,
            severity: validation.severity.max(Some(Severity::High)),
            message: message.into(),
            technical_details: Vec::new(),
            tally: None,
        }
    }

    /// Whether this is a failure with critical severity.
    pub fn is_critical_failure(&self) -> bool {
        self.status == CheckStatus::Fail && self.severity == Some(Severity::Critical)
    }
}

/// What a check's evaluation function reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Outcome.
    pub status: CheckStatus,
    /// Message shown to the user.
    pub message: String,
    /// Structured detail lines.
    pub details: Vec<String>,
    /// Severity override; `None` keeps the catalog severity.
    pub severity: Option<Severity>,
    /// Row counts, for row-level checks.
    pub tally: Option<RowTally>,
}

impl CheckOutcome {
    fn with_status(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Vec::new(),
            severity: None,
            tally: None,
        }
    }

    /// A passing outcome.
    pub fn pass(message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Pass, message)
    }

    /// A failing outcome.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Fail, message)
    }

    /// A warning outcome.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Warning, message)
    }

    /// A pending outcome.
    pub fn pending(message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Pending, message)
    }

    /// Attach detail lines.
    pub fn with_details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.extend(details.into_iter().map(Into::into));
        self
    }

    /// Override the catalog severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Attach row counts.
    pub fn with_tally(mut self, tally: RowTally) -> Self {
        self.tally = Some(tally);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ValidationCategory;

    fn email_check() -> Validation {
        Validation::new("quality_email_format", ValidationCategory::DataQuality, "Email format")
            .severity(Severity::Medium)
    }

    #[test]
    fn test_outcome_keeps_catalog_severity() {
        let result = ValidationResult::from_outcome(
            &email_check(),
            CheckOutcome::fail("3 invalid").with_tally(RowTally::new(10, 3)),
        );
        assert_eq!(result.severity, Some(Severity::Medium));
        assert_eq!(result.tally.map(|t| t.passed()), Some(7));
        assert!(!result.is_critical_failure());
    }

    #[test]
    fn test_outcome_severity_override() {
        let result = ValidationResult::from_outcome(
            &email_check(),
            CheckOutcome::warning("mime mismatch").with_severity(Severity::Low),
        );
        assert_eq!(result.severity, Some(Severity::Low));
    }

    #[test]
    fn test_evaluation_failure_escalates() {
        let low = Validation::new("x", ValidationCategory::DataQuality, "X").severity(Severity::Low);
        assert_eq!(
            ValidationResult::evaluation_failed(&low, "boom").severity,
            Some(Severity::High)
        );

        let informational = Validation::new("y", ValidationCategory::DataQuality, "Y");
        assert_eq!(
            ValidationResult::evaluation_failed(&informational, "boom").severity,
            Some(Severity::High)
        );

        let critical = email_check().severity(Severity::Critical);
        let failed = ValidationResult::evaluation_failed(&critical, "boom");
        assert_eq!(failed.severity, Some(Severity::Critical));
        assert!(failed.is_critical_failure());
    }

    #[test]
    fn test_tally_clamps() {
        let tally = RowTally::new(5, 9);
        assert_eq!(tally.failed, 5);
        assert_eq!(tally.passed(), 0);
    }
}
