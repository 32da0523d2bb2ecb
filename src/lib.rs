//! # Stagegate - Staged File Import Validation
//!
//! Stagegate drives an uploaded file through an ordered sequence of
//! validation stages, from file upload to the final push into a target
//! system. Each stage runs a set of categorized checks, aggregates them into
//! a status and a score, and decides whether the user may move on.
//!
//! ## Features
//!
//! - **Check Catalog**: Checks are grouped by stage and can be moved between
//!   stages at runtime without readers ever seeing a half-applied move
//! - **Deterministic Runner**: One result per check, in catalog order, with
//!   optional parallel evaluation and per-check timeouts
//! - **Policy-driven Advancement**: A per-stage policy table decides which
//!   warnings block and where critical failures send the user
//! - **Resumable Sessions**: Sessions persist after every transition and
//!   re-derive the stage to resume at
//! - **Stale Run Protection**: Per-stage run counters drop results from runs
//!   that were superseded
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagegate::prelude::*;
//!
//! let pipeline = ImportPipeline::new(PipelineConfig::default());
//!
//! let file = FileInput::new("people.csv", std::fs::read("people.csv")?);
//! let session = pipeline.create_session(file.metadata.clone())?;
//! let id = session.id();
//!
//! pipeline.run_stage(id, ValidationCategory::FileUpload, file.clone())?;
//! if pipeline.can_advance(id, ValidationCategory::FileUpload)? {
//!     pipeline.run_stage(id, ValidationCategory::FilePreflight, file)?;
//! }
//!
//! for result in pipeline.results(id, ValidationCategory::FilePreflight)? {
//!     println!("{}: {} ({})", result.name, result.status, result.message);
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`core`]: Stage identifiers, inputs, configuration and error handling
//! - [`catalog`]: The check catalog and the built-in checks
//! - [`validation`]: Check evaluation, results and scoring
//! - [`pipeline`]: Sessions, the stage state machine, persistence and
//!   orchestration
//!
//! ## Writing Custom Checks
//!
//! A check consumes either file bytes or parsed rows, depending on the stage
//! it belongs to. Implement [`validation::RowCheck`] (or
//! [`validation::FileCheck`]) and register it:
//!
//! ```rust,ignore
//! use stagegate::prelude::*;
//!
//! struct NoTestAccounts;
//!
//! impl RowCheck for NoTestAccounts {
//!     fn evaluate(&self, rows: &RowSet) -> CheckResult {
//!         let Some(column) = rows.find_column("email") else {
//!             return Err(CheckError::MissingContext("no email column".into()));
//!         };
//!         let test_accounts = rows.column(column).filter(|v| v.ends_with("@test.invalid")).count();
//!         if test_accounts == 0 {
//!             Ok(CheckOutcome::pass("No test accounts"))
//!         } else {
//!             Ok(CheckOutcome::fail(format!("{} test account(s)", test_accounts)))
//!         }
//!     }
//! }
//!
//! let catalog = ValidationCatalog::with_builtins(&PipelineConfig::default());
//! catalog.register(
//!     Validation::new("quality_no_test_accounts", ValidationCategory::DataQuality, "Test accounts")
//!         .severity(Severity::High),
//!     CheckFn::rows(NoTestAccounts),
//! )?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod core;
pub mod pipeline;
pub mod validation;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use stagegate::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{
        AggregateStatus, CheckStatus, CheckType, FileMetadata, InputKind, Severity, StageStatus,
        ValidationCategory,
    };

    // Inputs
    pub use crate::core::input::{FileInput, Row, RowSet, ValidationInput};

    // Configuration
    pub use crate::core::config::{
        FailureRoute, PipelineConfig, PolicyTable, RunnerOptions, StagePolicy, WarningPolicy,
    };

    // Errors
    pub use crate::core::error::{
        CatalogError, CheckError, ConfigError, IngestError, IngestResult, InvariantViolation,
        PipelineError, PipelineResult, SessionId, StoreError,
    };

    // Catalog
    pub use crate::catalog::registry::{CatalogEntry, Validation, ValidationCatalog};

    // Validation
    pub use crate::validation::check::{CheckFn, CheckResult, FileCheck, RowCheck};
    pub use crate::validation::result::{CheckOutcome, RowTally, ValidationResult};
    pub use crate::validation::runner::ValidationRunner;
    pub use crate::validation::score::{score, CategoryRollup};

    // Pipeline
    pub use crate::pipeline::events::{EventCallback, EventSink, PipelineEvent};
    pub use crate::pipeline::machine::{Route, RunTicket, StageMachine, SubmitOutcome};
    pub use crate::pipeline::orchestrator::{ImportPipeline, PipelineBuilder};
    pub use crate::pipeline::session::{Lifecycle, PipelineSession, Stage};
    pub use crate::pipeline::store::{JsonFileSessionStore, MemorySessionStore, SessionStore};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "stagegate");
    }

    #[test]
    fn test_catalog_with_builtins() {
        let catalog = ValidationCatalog::default();

        // Check some built-in checks exist
        assert!(catalog.contains("upload_file_type"));
        assert!(catalog.contains("preflight_duplicate_headers"));
        assert!(catalog.contains("quality_email_format"));
        assert!(catalog.contains("dedup_key_collisions"));
        assert!(catalog.contains("push_batch_plan"));
    }

    #[test]
    fn test_prelude_covers_a_session() {
        let pipeline = ImportPipeline::new(PipelineConfig::default());
        let file = FileInput::new("people.csv", b"email\nada@example.com\n".to_vec());
        let id = pipeline.create_session(file.metadata.clone()).unwrap().id();

        let outcome = pipeline
            .run_stage(id, ValidationCategory::FileUpload, file)
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(
            pipeline.route(id, ValidationCategory::FileUpload).unwrap(),
            Route::Advance(Stage::At(ValidationCategory::FilePreflight))
        );
    }
}
