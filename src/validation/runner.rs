//! Validation runner.
//!
//! Evaluates every catalog entry of a category against one input and returns
//! one result per entry, in catalog order. A failing or panicking check is
//! converted into a result and never stops its siblings.

use crate::catalog::registry::{CatalogEntry, ValidationCatalog};
use crate::core::config::RunnerOptions;
use crate::core::error::CheckError;
use crate::core::input::ValidationInput;
use crate::core::types::ValidationCategory;
use crate::validation::check::{CheckFn, CheckResult};
use crate::validation::result::ValidationResult;
use crossbeam::channel;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs the checks of one category.
#[derive(Clone)]
pub struct ValidationRunner {
    catalog: Arc<ValidationCatalog>,
    options: RunnerOptions,
}

impl ValidationRunner {
    /// Create a runner over a shared catalog.
    pub fn new(catalog: Arc<ValidationCatalog>) -> Self {
        Self {
            catalog,
            options: RunnerOptions::default(),
        }
    }

    /// Set the runner options.
    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Evaluate checks one at a time instead of on the rayon pool.
    pub fn sequential(mut self) -> Self {
        self.options.parallel = false;
        self
    }

    /// Set a per-check time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.check_timeout_ms = Some(timeout.as_millis().max(1) as u64);
        self
    }

    /// The catalog this runner reads.
    pub fn catalog(&self) -> &Arc<ValidationCatalog> {
        &self.catalog
    }

    /// The runner options.
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run every check of `category` against `input`.
    pub fn run(
        &self,
        category: ValidationCategory,
        input: impl Into<Arc<ValidationInput>>,
    ) -> Vec<ValidationResult> {
        let input = input.into();
        let entries = self.catalog.entries_for_category(category);
        let start = Instant::now();

        if input.kind() != category.input_kind() {
            log::warn!(
                "{} received {} but its checks require {}",
                category,
                input.kind(),
                category.input_kind()
            );
            let message = format!("Check requires {}", category.input_kind());
            return entries
                .iter()
                .map(|e| ValidationResult::pending(&e.validation, message.clone()))
                .collect();
        }

        if let ValidationInput::Rows(rows) = input.as_ref() {
            if category.requires_rows() && rows.is_empty() {
                log::debug!("{} has no parsed rows; all checks pending", category);
                return entries
                    .iter()
                    .map(|e| ValidationResult::pending(&e.validation, "No parsed rows available"))
                    .collect();
            }
        }

        let results: Vec<ValidationResult> = if self.options.parallel {
            entries
                .par_iter()
                .map(|entry| self.evaluate(entry, &input))
                .collect()
        } else {
            entries
                .iter()
                .map(|entry| self.evaluate(entry, &input))
                .collect()
        };

        log::debug!(
            "ran {} check(s) for {} in {:?}",
            results.len(),
            category,
            start.elapsed()
        );
        results
    }

    fn evaluate(&self, entry: &CatalogEntry, input: &Arc<ValidationInput>) -> ValidationResult {
        let result = match self.options.check_timeout() {
            Some(limit) => evaluate_with_timeout(&entry.check, input, limit),
            None => evaluate_guarded(&entry.check, input),
        };

        match result {
            Ok(outcome) => ValidationResult::from_outcome(&entry.validation, outcome),
            Err(CheckError::MissingContext(message)) => {
                ValidationResult::pending(&entry.validation, message)
            }
            Err(error) => {
                log::warn!("check '{}' could not be evaluated: {}", entry.validation.id, error);
                ValidationResult::evaluation_failed(
                    &entry.validation,
                    format!("Check could not be evaluated: {}", error),
                )
            }
        }
    }
}

fn evaluate_guarded(check: &CheckFn, input: &ValidationInput) -> CheckResult {
    panic::catch_unwind(AssertUnwindSafe(|| dispatch(check, input)))
        .unwrap_or_else(|payload| Err(CheckError::Panicked(panic_message(payload.as_ref()))))
}

/// Evaluate on a helper thread and give up after `limit`.
///
/// The helper thread is left to finish on its own; its late answer is dropped.
fn evaluate_with_timeout(
    check: &CheckFn,
    input: &Arc<ValidationInput>,
    limit: Duration,
) -> CheckResult {
    let (sender, receiver) = channel::bounded(1);
    let check = check.clone();
    let input = Arc::clone(input);

    let spawned = std::thread::Builder::new()
        .name("stagegate-check".to_string())
        .spawn(move || {
            let _ = sender.send(evaluate_guarded(&check, &input));
        });
    if let Err(error) = spawned {
        return Err(CheckError::Other(format!("could not start check thread: {}", error)));
    }

    match receiver.recv_timeout(limit) {
        Ok(result) => result,
        Err(channel::RecvTimeoutError::Timeout) => Err(CheckError::MissingContext(format!(
            "timed out after {} ms",
            limit.as_millis()
        ))),
        Err(channel::RecvTimeoutError::Disconnected) => {
            Err(CheckError::Other("check thread exited without a result".to_string()))
        }
    }
}

fn dispatch(check: &CheckFn, input: &ValidationInput) -> CheckResult {
    match (check, input) {
        (CheckFn::File(check), ValidationInput::File(file)) => check.evaluate(file),
        (CheckFn::Rows(check), ValidationInput::Rows(rows)) => check.evaluate(rows),
        (check, _) => Err(CheckError::MissingContext(format!(
            "Check requires {}",
            check.input_kind()
        ))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::registry::Validation;
    use crate::core::config::PipelineConfig;
    use crate::core::input::{FileInput, RowSet};
    use crate::core::types::{CheckStatus, Severity};
    use crate::validation::result::CheckOutcome;

    fn quality(id: &str) -> Validation {
        Validation::new(id, ValidationCategory::DataQuality, id).severity(Severity::Low)
    }

    fn sample_rows() -> RowSet {
        RowSet::new(["email"]).with_row(["a@example.com"])
    }

    #[test]
    fn test_results_follow_catalog_order() {
        let catalog = ValidationCatalog::new();
        for id in ["c", "a", "b"] {
            catalog
                .register(
                    quality(id),
                    CheckFn::rows(|_: &RowSet| -> CheckResult { Ok(CheckOutcome::pass("ok")) }),
                )
                .unwrap();
        }
        let runner = ValidationRunner::new(Arc::new(catalog));

        let ids: Vec<_> = runner
            .run(ValidationCategory::DataQuality, ValidationInput::Rows(sample_rows()))
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_failing_check_does_not_abort_siblings() {
        let catalog = ValidationCatalog::new();
        catalog
            .register(
                quality("broken"),
                CheckFn::rows(|_: &RowSet| -> CheckResult {
                    Err(CheckError::Other("lookup table missing".into()))
                }),
            )
            .unwrap();
        catalog
            .register(
                quality("panics"),
                CheckFn::rows(|_: &RowSet| -> CheckResult { panic!("index out of range") }),
            )
            .unwrap();
        catalog
            .register(
                quality("fine"),
                CheckFn::rows(|_: &RowSet| -> CheckResult { Ok(CheckOutcome::pass("ok")) }),
            )
            .unwrap();
        let runner = ValidationRunner::new(Arc::new(catalog));

        let results = runner.run(ValidationCategory::DataQuality, ValidationInput::Rows(sample_rows()));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, CheckStatus::Fail);
        assert_eq!(results[0].severity, Some(Severity::High));
        assert_eq!(results[1].status, CheckStatus::Fail);
        assert!(results[1].message.contains("index out of range"));
        assert_eq!(results[2].status, CheckStatus::Pass);
    }

    #[test]
    fn test_empty_rows_are_pending() {
        let runner = ValidationRunner::new(Arc::new(ValidationCatalog::default()));
        let results = runner.run(
            ValidationCategory::DataQuality,
            ValidationInput::Rows(RowSet::new(["email"])),
        );
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.status == CheckStatus::Pending));
        assert_eq!(results[0].message, "No parsed rows available");
    }

    #[test]
    fn test_column_mapping_runs_without_rows() {
        let runner = ValidationRunner::new(Arc::new(ValidationCatalog::default()));
        let results = runner.run(
            ValidationCategory::ColumnMapping,
            ValidationInput::Rows(RowSet::new(["email"])),
        );
        assert!(results.iter().all(|r| r.status != CheckStatus::Pending));
    }

    #[test]
    fn test_wrong_input_kind_is_pending() {
        let runner = ValidationRunner::new(Arc::new(ValidationCatalog::default()));
        let results = runner.run(
            ValidationCategory::FileUpload,
            ValidationInput::Rows(sample_rows()),
        );
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.status == CheckStatus::Pending));
        assert_eq!(results[0].message, "Check requires file bytes");
    }

    #[test]
    fn test_missing_context_is_pending() {
        let runner = ValidationRunner::new(Arc::new(ValidationCatalog::default()));
        let rows = RowSet::new(["name"]).with_row(["Ada"]);
        let results = runner.run(ValidationCategory::Deduplication, ValidationInput::Rows(rows));
        let keys = results.iter().find(|r| r.id == "dedup_key_collisions").unwrap();
        assert_eq!(keys.status, CheckStatus::Pending);
    }

    #[test]
    fn test_timeout_resolves_to_pending() {
        let catalog = ValidationCatalog::new();
        catalog
            .register(
                quality("slow"),
                CheckFn::rows(|_: &RowSet| -> CheckResult {
                    std::thread::sleep(Duration::from_millis(500));
                    Ok(CheckOutcome::pass("late"))
                }),
            )
            .unwrap();
        catalog
            .register(
                quality("quick"),
                CheckFn::rows(|_: &RowSet| -> CheckResult { Ok(CheckOutcome::pass("ok")) }),
            )
            .unwrap();
        let runner =
            ValidationRunner::new(Arc::new(catalog)).with_timeout(Duration::from_millis(20));

        let results = runner.run(ValidationCategory::DataQuality, ValidationInput::Rows(sample_rows()));
        assert_eq!(results[0].status, CheckStatus::Pending);
        assert_eq!(results[0].message, "timed out after 20 ms");
        assert_eq!(results[1].status, CheckStatus::Pass);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let config = PipelineConfig::default();
        let catalog = Arc::new(ValidationCatalog::with_builtins(&config));
        let parallel = ValidationRunner::new(Arc::clone(&catalog));
        let sequential = ValidationRunner::new(catalog).sequential();

        let file = ValidationInput::File(FileInput::new(
            "people.csv",
            b"name,email,name\nAda,ada@example.com,x\nGrace\n".to_vec(),
        ));
        let input = Arc::new(file);

        let first = parallel.run(ValidationCategory::FilePreflight, Arc::clone(&input));
        let second = parallel.run(ValidationCategory::FilePreflight, Arc::clone(&input));
        let third = sequential.run(ValidationCategory::FilePreflight, input);
        assert_eq!(first, second);
        assert_eq!(first, third);
    }
}
