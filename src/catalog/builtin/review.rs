//! Final review and push planning checks.

use super::is_blank;
use crate::core::input::RowSet;
use crate::validation::check::{CheckResult, RowCheck};
use crate::validation::result::CheckOutcome;

/// Requires between one and the configured maximum of rows.
pub struct RowCountCheck {
    max_rows: usize,
}

impl RowCountCheck {
    /// Create with the largest accepted row count.
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }
}

impl RowCheck for RowCountCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let count = rows.len();
        if count == 0 {
            Ok(CheckOutcome::fail("There are no rows to import"))
        } else if count > self.max_rows {
            Ok(CheckOutcome::fail(format!(
                "{} rows exceed the limit of {}",
                count, self.max_rows
            )))
        } else {
            Ok(CheckOutcome::pass(format!("{} row(s) ready to import", count)))
        }
    }
}

/// Always passes; the details summarise what will be imported.
pub struct SummaryCheck;

impl RowCheck for SummaryCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let mut details = vec![
            format!("rows: {}", rows.len()),
            format!("columns: {}", rows.headers.len()),
        ];
        for header in &rows.headers {
            let filled = rows.column(header).filter(|v| !is_blank(v)).count();
            details.push(format!("{}: {} of {} filled", header, filled, rows.len()));
        }
        Ok(CheckOutcome::pass(format!(
            "{} row(s) across {} column(s)",
            rows.len(),
            rows.headers.len()
        ))
        .with_details(details))
    }
}

/// Always passes; the details list the push batches.
pub struct BatchPlanCheck {
    batch_size: usize,
}

impl BatchPlanCheck {
    /// Create with the number of rows per push batch.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl RowCheck for BatchPlanCheck {
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        let total = rows.len();
        let batches = total.div_ceil(self.batch_size);
        let details = (0..batches).map(|batch| {
            let start = batch * self.batch_size;
            let end = (start + self.batch_size).min(total);
            format!("batch {}: rows {}-{}", batch + 1, start + 1, end)
        });
        Ok(CheckOutcome::pass(format!(
            "{} row(s) in {} batch(es) of up to {}",
            total, batches, self.batch_size
        ))
        .with_details(super::capped_details(details)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CheckStatus;

    fn rows(count: usize) -> RowSet {
        let mut rows = RowSet::new(["email"]);
        for i in 0..count {
            rows.push_values([format!("u{}@example.com", i)]);
        }
        rows
    }

    #[test]
    fn test_row_count_bounds() {
        let check = RowCountCheck::new(3);
        assert_eq!(check.evaluate(&rows(0)).unwrap().status, CheckStatus::Fail);
        assert_eq!(check.evaluate(&rows(3)).unwrap().status, CheckStatus::Pass);
        assert_eq!(check.evaluate(&rows(4)).unwrap().status, CheckStatus::Fail);
    }

    #[test]
    fn test_summary() {
        let outcome = SummaryCheck.evaluate(&rows(2)).unwrap();
        assert_eq!(outcome.status, CheckStatus::Pass);
        assert_eq!(outcome.details, vec!["rows: 2", "columns: 1", "email: 2 of 2 filled"]);
    }

    #[test]
    fn test_batch_plan() {
        let outcome = BatchPlanCheck::new(2).evaluate(&rows(5)).unwrap();
        assert_eq!(
            outcome.details,
            vec!["batch 1: rows 1-2", "batch 2: rows 3-4", "batch 3: rows 5-5"]
        );

        let zero = BatchPlanCheck::new(0).evaluate(&rows(1)).unwrap();
        assert_eq!(zero.details, vec!["batch 1: rows 1-1"]);
    }
}
