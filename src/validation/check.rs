//! Check evaluation traits.
//!
//! A check declares the input variant it consumes by implementing either
//! [`FileCheck`] or [`RowCheck`]. [`CheckFn`] carries that choice into the
//! catalog so mismatches are caught at registration time.

use crate::core::error::CheckError;
use crate::core::input::{FileInput, RowSet};
use crate::core::types::InputKind;
use crate::validation::result::CheckOutcome;
use std::fmt;
use std::sync::Arc;

/// Result of evaluating a single check.
pub type CheckResult = Result<CheckOutcome, CheckError>;

/// A check over raw file bytes.
pub trait FileCheck: Send + Sync {
    /// Evaluate the check.
    fn evaluate(&self, file: &FileInput) -> CheckResult;
}

/// A check over parsed rows.
pub trait RowCheck: Send + Sync {
    /// Evaluate the check.
    fn evaluate(&self, rows: &RowSet) -> CheckResult;
}

impl<F> FileCheck for F
where
    F: Fn(&FileInput) -> CheckResult + Send + Sync,
{
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        self(file)
    }
}

impl<F> RowCheck for F
where
    F: Fn(&RowSet) -> CheckResult + Send + Sync,
{
    fn evaluate(&self, rows: &RowSet) -> CheckResult {
        self(rows)
    }
}

/// Evaluation function of a catalog entry, tagged by input variant.
#[derive(Clone)]
pub enum CheckFn {
    /// Consumes [`FileInput`].
    File(Arc<dyn FileCheck>),
    /// Consumes [`RowSet`].
    Rows(Arc<dyn RowCheck>),
}

impl CheckFn {
    /// Wrap a file check.
    pub fn file(check: impl FileCheck + 'static) -> Self {
        CheckFn::File(Arc::new(check))
    }

    /// Wrap a row check.
    pub fn rows(check: impl RowCheck + 'static) -> Self {
        CheckFn::Rows(Arc::new(check))
    }

    /// Input variant this function consumes.
    pub fn input_kind(&self) -> InputKind {
        match self {
            CheckFn::File(_) => InputKind::File,
            CheckFn::Rows(_) => InputKind::Rows,
        }
    }
}

impl fmt::Debug for CheckFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CheckFn::{:?}", self.input_kind())
    }
}
