//! Column mapping checks. These look at headers and need no data rows.

use super::{capped_details, is_blank};
use crate::core::input::RowSet;
use crate::validation::check::{CheckResult, RowCheck};
use crate::validation::result::CheckOutcome;

/// Requires every configured column to be present.
pub struct RequiredColumnsCheck {
    required: Vec<String>,
}

impl RequiredColumnsCheck {
    /// Create with the column names that must be present.
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }
}

impl RowCheck for RequiredColumnsCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| !rows.has_column(name))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(CheckOutcome::pass(format!(
                "All {} required column(s) present",
                self.required.len()
            )))
        } else {
            Ok(CheckOutcome::fail(format!("Missing required column(s): {}", missing.join(", ")))
                .with_details(missing.iter().map(|name| format!("missing: {}", name))))
        }
    }
}

/// Flags headers that map to no known target field.
///
/// Passes when no known columns are configured.
pub struct UnknownColumnsCheck {
    known: Vec<String>,
}

impl UnknownColumnsCheck {
    /// Create with the target fields columns may map to.
    pub fn new(known: Vec<String>) -> Self {
        Self { known }
    }
}

impl RowCheck for UnknownColumnsCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        if self.known.is_empty() {
            return Ok(CheckOutcome::pass("No target fields configured; all columns accepted"));
        }

        let unknown: Vec<String> = rows
            .headers
            .iter()
            .filter(|header| {
                !self
                    .known
                    .iter()
                    .any(|known| known.trim().eq_ignore_ascii_case(header.trim()))
            })
            .cloned()
            .collect();

        if unknown.is_empty() {
            Ok(CheckOutcome::pass("Every column maps to a target field"))
        } else {
            Ok(CheckOutcome::warning(format!(
                "{} column(s) will not be imported",
                unknown.len()
            ))
            .with_details(capped_details(unknown)))
        }
    }
}

/// Flags columns that are blank in every row.
pub struct EmptyColumnsCheck;

impl RowCheck for EmptyColumnsCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        if rows.is_empty() {
            return Ok(CheckOutcome::pass("No rows to inspect"));
        }

        let empty: Vec<String> = rows
            .headers
            .iter()
            .filter(|header| rows.column(header).all(is_blank))
            .cloned()
            .collect();

        if empty.is_empty() {
            Ok(CheckOutcome::pass("Every column has data"))
        } else {
            Ok(CheckOutcome::warning(format!("{} column(s) are empty in every row", empty.len()))
                .with_details(capped_details(empty)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CheckStatus;

    fn people() -> RowSet {
        RowSet::new(["Name", "Email", "Notes"])
            .with_row(["Ada", "ada@example.com", ""])
            .with_row(["Grace", "grace@example.com", " "])
    }

    #[test]
    fn test_required_columns() {
        let check = RequiredColumnsCheck::new(vec!["email".into()]);
        assert_eq!(check.evaluate(&people()).unwrap().status, CheckStatus::Pass);

        let check = RequiredColumnsCheck::new(vec!["email".into(), "phone".into()]);
        let outcome = check.evaluate(&people()).unwrap();
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.details, vec!["missing: phone"]);
    }

    #[test]
    fn test_required_columns_on_headers_only() {
        let check = RequiredColumnsCheck::new(vec!["email".into()]);
        let outcome = check.evaluate(&RowSet::new(["email"])).unwrap();
        assert_eq!(outcome.status, CheckStatus::Pass);
    }

    #[test]
    fn test_unknown_columns() {
        let open = UnknownColumnsCheck::new(Vec::new());
        assert_eq!(open.evaluate(&people()).unwrap().status, CheckStatus::Pass);

        let check = UnknownColumnsCheck::new(vec!["name".into(), "email".into()]);
        let outcome = check.evaluate(&people()).unwrap();
        assert_eq!(outcome.status, CheckStatus::Warning);
        assert_eq!(outcome.details, vec!["Notes"]);
    }

    #[test]
    fn test_empty_columns() {
        let outcome = EmptyColumnsCheck.evaluate(&people()).unwrap();
        assert_eq!(outcome.status, CheckStatus::Warning);
        assert_eq!(outcome.details, vec!["Notes"]);

        let headers_only = RowSet::new(["a"]);
        assert_eq!(
            EmptyColumnsCheck.evaluate(&headers_only).unwrap().status,
            CheckStatus::Pass
        );
    }
}
