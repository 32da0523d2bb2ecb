//! Score aggregation.
//!
//! A score is `round(100 × Σweight / units)` over non-pending results, with
//! pass = 1.0, warning = 0.5 and fail = 0. A result that carries a row tally
//! counts once per checked row: passing rows at full weight, failing rows at
//! the result's weight. No scorable results gives 0.

use crate::core::types::CheckStatus;
use crate::validation::result::ValidationResult;
use serde::{Deserialize, Serialize};

/// Counts and score for one category's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryRollup {
    /// Passing results.
    pub pass: usize,
    /// Failing results.
    pub fail: usize,
    /// Results with warnings.
    pub warning: usize,
    /// Results that could not be evaluated.
    pub pending: usize,
    /// Any failure with critical severity.
    pub has_critical_failure: bool,
    /// Score in `0..=100`.
    pub score: u8,
}

impl CategoryRollup {
    /// Summarise a result list.
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let mut rollup = CategoryRollup {
            score: score(results),
            ..Default::default()
        };
        for result in results {
            match result.status {
                CheckStatus::Pass => rollup.pass += 1,
                CheckStatus::Fail => rollup.fail += 1,
                CheckStatus::Warning => rollup.warning += 1,
                CheckStatus::Pending => rollup.pending += 1,
            }
            rollup.has_critical_failure |= result.is_critical_failure();
        }
        rollup
    }

    /// Number of results summarised.
    pub fn total(&self) -> usize {
        self.pass + self.fail + self.warning + self.pending
    }
}

/// Score a result list.
pub fn score(results: &[ValidationResult]) -> u8 {
    let mut earned = 0.0;
    let mut units = 0.0;

    for result in results {
        let Some(weight) = result.status.weight() else {
            continue;
        };
        match result.tally {
            Some(tally) if tally.checked > 0 => {
                earned += tally.passed() as f64 + tally.failed_rows() as f64 * weight;
                units += tally.checked as f64;
            }
            _ => {
                earned += weight;
                units += 1.0;
            }
        }
    }

    if units == 0.0 {
        return 0;
    }
    (100.0 * earned / units).round().clamp(0.0, 100.0) as u8
}
