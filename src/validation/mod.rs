//! Check evaluation, results and scoring.
//!
//! The runner evaluates one category's checks against one input; the score
//! module turns the resulting list into counts and a 0-100 score.

pub mod check;
pub mod result;
pub mod runner;
pub mod score;

pub use check::{CheckFn, CheckResult, FileCheck, RowCheck};
pub use result::{CheckOutcome, RowTally, ValidationResult};
pub use runner::ValidationRunner;
pub use score::{score, CategoryRollup};
