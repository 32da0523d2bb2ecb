//! Transformation and deduplication checks.
//!
//! Transformation checks report values the normalization step will rewrite;
//! they warn rather than fail.

use super::{capped_details, is_blank, is_email_column};
use crate::core::error::CheckError;
use crate::core::input::RowSet;
use crate::validation::check::{CheckResult, RowCheck};
use crate::validation::result::{CheckOutcome, RowTally};
use std::collections::HashMap;

/// Values with leading or trailing whitespace.
pub struct TrimWhitespaceCheck;

impl RowCheck for TrimWhitespaceCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let mut affected = Vec::new();
        for (position, row) in rows.rows.iter().enumerate() {
            let columns: Vec<&str> = row
                .iter()
                .filter(|(_, value)| !value.is_empty() && value.trim().len() != value.len())
                .map(|(column, _)| column.as_str())
                .collect();
            if !columns.is_empty() {
                affected.push(format!("row {}: {}", position + 1, columns.join(", ")));
            }
        }

        let tally = RowTally::new(rows.len(), affected.len());
        if affected.is_empty() {
            Ok(CheckOutcome::pass("No values need trimming").with_tally(tally))
        } else {
            Ok(CheckOutcome::warning(format!("{} row(s) have values to trim", affected.len()))
                .with_tally(tally)
                .with_details(capped_details(affected)))
        }
    }
}

/// Email addresses that will be lower-cased.
pub struct EmailCaseCheck;

impl RowCheck for EmailCaseCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let mut checked = 0usize;
        let mut mixed = Vec::new();
        for column in rows.headers.iter().filter(|h| is_email_column(h)) {
            for (position, value) in rows.column(column).enumerate() {
                if is_blank(value) {
                    continue;
                }
                checked += 1;
                if value.trim() != value.trim().to_lowercase() {
                    mixed.push(format!("row {}: '{}'", position + 1, value.trim()));
                }
            }
        }

        let tally = RowTally::new(checked, mixed.len());
        if mixed.is_empty() {
            Ok(CheckOutcome::pass("Email addresses are already lower-case").with_tally(tally))
        } else {
            Ok(CheckOutcome::warning(format!(
                "{} email address(es) will be lower-cased",
                mixed.len()
            ))
            .with_tally(tally)
            .with_details(capped_details(mixed)))
        }
    }
}

/// Rows where every value is blank.
pub struct BlankRowsCheck;

impl RowCheck for BlankRowsCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let blank: Vec<String> = rows
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.values().all(|v| is_blank(v)))
            .map(|(position, _)| format!("row {}", position + 1))
            .collect();

        let tally = RowTally::new(rows.len(), blank.len());
        if blank.is_empty() {
            Ok(CheckOutcome::pass("No blank rows").with_tally(tally))
        } else {
            Ok(CheckOutcome::warning(format!("{} blank row(s) will be dropped", blank.len()))
                .with_tally(tally)
                .with_details(capped_details(blank)))
        }
    }
}

/// Rows identical to an earlier row after trimming.
pub struct ExactDuplicateRowsCheck;

impl RowCheck for ExactDuplicateRowsCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let mut first_seen: HashMap<Vec<&str>, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for (position, row) in rows.rows.iter().enumerate() {
            let key: Vec<&str> = row.values().map(|v| v.trim()).collect();
            if key.iter().all(|v| v.is_empty()) {
                continue;
            }
            match first_seen.get(&key) {
                Some(first) => duplicates.push(format!(
                    "row {} repeats row {}",
                    position + 1,
                    first + 1
                )),
                None => {
                    first_seen.insert(key, position);
                }
            }
        }

        let tally = RowTally::new(rows.len(), duplicates.len());
        if duplicates.is_empty() {
            Ok(CheckOutcome::pass("No duplicate rows").with_tally(tally))
        } else {
            Ok(CheckOutcome::warning(format!("{} duplicate row(s)", duplicates.len()))
                .with_tally(tally)
                .with_details(capped_details(duplicates)))
        }
    }
}

/// Repeated values of the configured key columns.
///
/// Keys are compared trimmed and case-insensitively. Rows with a blank key
/// are skipped.
pub struct KeyCollisionCheck {
    keys: Vec<String>,
}

impl KeyCollisionCheck {
    /// Create with the columns that together identify a record.
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }
}

impl RowCheck for KeyCollisionCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        if self.keys.is_empty() {
            return Ok(CheckOutcome::pass("No key columns configured"));
        }
        let mut columns = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let column = rows.find_column(key).ok_or_else(|| {
                CheckError::MissingContext(format!("key column '{}' is not mapped", key))
            })?;
            columns.push(column);
        }

        let mut checked = 0usize;
        let mut first_seen: HashMap<Vec<String>, usize> = HashMap::new();
        let mut collisions = Vec::new();
        for (position, row) in rows.rows.iter().enumerate() {
            let key: Vec<String> = columns
                .iter()
                .map(|c| row.get(*c).map_or(String::new(), |v| v.trim().to_lowercase()))
                .collect();
            if key.iter().any(String::is_empty) {
                continue;
            }
            checked += 1;
            match first_seen.get(&key) {
                Some(first) => collisions.push(format!(
                    "row {}: '{}' already used by row {}",
                    position + 1,
                    key.join(" / "),
                    first + 1
                )),
                None => {
                    first_seen.insert(key, position);
                }
            }
        }

        let tally = RowTally::new(checked, collisions.len());
        if collisions.is_empty() {
            Ok(CheckOutcome::pass(format!("Every {} is unique", columns.join(" + "))).with_tally(tally))
        } else {
            Ok(CheckOutcome::fail(format!(
                "{} row(s) reuse an existing {}",
                collisions.len(),
                columns.join(" + ")
            ))
            .with_tally(tally)
            .with_details(capped_details(collisions)))
        }
    }
}
