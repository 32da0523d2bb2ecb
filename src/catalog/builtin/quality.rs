//! Row-level data quality checks.

use super::{capped_details, is_blank, is_email_column, is_valid_email};
use crate::core::error::CheckError;
use crate::core::input::RowSet;
use crate::validation::check::{CheckResult, RowCheck};
use crate::validation::result::{CheckOutcome, RowTally};

/// Requires a value in each required column on every row.
pub struct RequiredValuesCheck {
    required: Vec<String>,
}

impl RequiredValuesCheck {
    /// Create with the columns that need a value.
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }
}

impl RowCheck for RequiredValuesCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let columns: Vec<&str> = self
            .required
            .iter()
            .filter_map(|name| rows.find_column(name))
            .collect();
        if columns.is_empty() {
            return Err(CheckError::MissingContext(
                "none of the required columns are mapped".to_string(),
            ));
        }

        let mut failures = Vec::new();
        for (position, row) in rows.rows.iter().enumerate() {
            let blank: Vec<&str> = columns
                .iter()
                .copied()
                .filter(|column| row.get(*column).map_or(true, |v| is_blank(v)))
                .collect();
            if !blank.is_empty() {
                failures.push(format!("row {}: no value for {}", position + 1, blank.join(", ")));
            }
        }

        let tally = RowTally::new(rows.len(), failures.len());
        if failures.is_empty() {
            Ok(CheckOutcome::pass(format!("Every row has {}", columns.join(", "))).with_tally(tally))
        } else {
            Ok(CheckOutcome::fail(format!(
                "{} of {} rows are missing required values",
                failures.len(),
                rows.len()
            ))
            .with_tally(tally)
            .with_details(capped_details(failures)))
        }
    }
}

/// Validates addresses in every email-named column.
pub struct EmailFormatCheck;

impl RowCheck for EmailFormatCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let columns: Vec<&String> = rows.headers.iter().filter(|h| is_email_column(h)).collect();
        if columns.is_empty() {
            return Ok(CheckOutcome::pass("No email columns to validate"));
        }

        let mut checked = 0usize;
        let mut invalid = Vec::new();
        for column in &columns {
            for (position, value) in rows.column(column).enumerate() {
                if is_blank(value) {
                    continue;
                }
                checked += 1;
                if !is_valid_email(value) {
                    invalid.push(format!("row {}, {}: '{}'", position + 1, column, value));
                }
            }
        }

        let tally = RowTally::new(checked, invalid.len());
        if invalid.is_empty() {
            Ok(CheckOutcome::pass(format!("{} email address(es) are well formed", checked))
                .with_tally(tally))
        } else {
            Ok(CheckOutcome::fail(format!(
                "{} of {} email address(es) are malformed",
                invalid.len(),
                checked
            ))
            .with_tally(tally)
            .with_details(capped_details(invalid)))
        }
    }
}

/// Flags stray non-numeric values in columns that are mostly numeric.
pub struct NumericConsistencyCheck {
    /// Share of numeric values above which a column counts as numeric.
    pub threshold: f64,
}

impl Default for NumericConsistencyCheck {
    fn default() -> Self {
        Self { threshold: 0.8 }
    }
}

fn is_numeric(value: &str) -> bool {
    let value = value.trim().replace(',', "");
    let value = value.trim_start_matches(['$', '€', '£']);
    !value.is_empty() && value.parse::<f64>().map_or(false, f64::is_finite)
}

impl RowCheck for NumericConsistencyCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let mut checked = 0usize;
        let mut stray = Vec::new();

        for header in &rows.headers {
            let values: Vec<(usize, &str)> = rows
                .column(header)
                .enumerate()
                .filter(|(_, v)| !is_blank(v))
                .collect();
            if values.is_empty() {
                continue;
            }
            let numeric = values.iter().filter(|(_, v)| is_numeric(v)).count();
            let share = numeric as f64 / values.len() as f64;
            if share < self.threshold || numeric == values.len() {
                continue;
            }

            checked += values.len();
            stray.extend(
                values
                    .iter()
                    .filter(|(_, v)| !is_numeric(v))
                    .map(|(position, v)| format!("row {}, {}: '{}'", position + 1, header, v)),
            );
        }

        if stray.is_empty() {
            return Ok(CheckOutcome::pass("Numeric columns are consistent"));
        }
        let tally = RowTally::new(checked, stray.len());
        Ok(CheckOutcome::warning(format!(
            "{} non-numeric value(s) in numeric columns",
            stray.len()
        ))
        .with_tally(tally)
        .with_details(capped_details(stray)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CheckStatus;

    #[test]
    fn test_required_values() {
        let rows = RowSet::new(["name", "email"])
            .with_row(["Ada", "ada@example.com"])
            .with_row(["Grace", " "])
            .with_row(["Linus"]);
        let check = RequiredValuesCheck::new(vec!["Email".into()]);

        let outcome = check.evaluate(&rows).unwrap();
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.tally, Some(RowTally::new(3, 2)));
        assert_eq!(outcome.details[0], "row 2: no value for email");
    }

    #[test]
    fn test_required_values_without_mapped_columns() {
        let rows = RowSet::new(["name"]).with_row(["Ada"]);
        let check = RequiredValuesCheck::new(vec!["email".into()]);
        assert!(matches!(check.evaluate(&rows), Err(CheckError::MissingContext(_))));
    }

    #[test]
    fn test_email_format_tally() {
        let mut rows = RowSet::new(["name", "work_email"]);
        for i in 0..100 {
            if i % 12 == 0 && i < 96 {
                rows.push_values([format!("p{}", i), "broken-at-example".to_string()]);
            } else {
                rows.push_values([format!("p{}", i), format!("p{}@example.com", i)]);
            }
        }

        let outcome = EmailFormatCheck.evaluate(&rows).unwrap();
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.tally, Some(RowTally::new(100, 8)));
    }

    #[test]
    fn test_email_format_skips_blank_and_non_email_columns() {
        let rows = RowSet::new(["name", "email"])
            .with_row(["not an email", ""])
            .with_row(["x", "x@example.org"]);
        let outcome = EmailFormatCheck.evaluate(&rows).unwrap();
        assert_eq!(outcome.status, CheckStatus::Pass);
        assert_eq!(outcome.tally, Some(RowTally::new(1, 0)));
    }

    #[test]
    fn test_numeric_consistency() {
        let mut rows = RowSet::new(["amount", "city"]);
        for value in ["10", "12.5", "$1,200", "n/a", "7", "8", "9", "11", "3", "4"] {
            rows.push_values([value, "Oslo"]);
        }

        let outcome = NumericConsistencyCheck::default().evaluate(&rows).unwrap();
        assert_eq!(outcome.status, CheckStatus::Warning);
        assert_eq!(outcome.details, vec!["row 4, amount: 'n/a'"]);
        assert_eq!(outcome.tally, Some(RowTally::new(10, 1)));
    }

    #[test]
    fn test_numeric_ignores_text_columns() {
        let rows = RowSet::new(["code"])
            .with_row(["A1"])
            .with_row(["B2"])
            .with_row(["3"]);
        assert_eq!(
            NumericConsistencyCheck::default().evaluate(&rows).unwrap().status,
            CheckStatus::Pass
        );
    }
}
