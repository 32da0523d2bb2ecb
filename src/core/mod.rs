//! Core types for the stagegate import pipeline.
//!
//! This module contains the foundational types shared by the catalog, the
//! runner and the state machine:
//! - Stage identifiers, severities and statuses
//! - Validation inputs (file bytes and parsed rows)
//! - Pipeline configuration and advancement policies
//! - Error types

pub mod config;
pub mod error;
pub mod input;
pub mod types;

// Re-export commonly used types
pub use config::{
    FailureRoute, PipelineConfig, PolicyTable, RunnerOptions, StagePolicy, WarningPolicy,
};
pub use error::{
    CatalogError, CheckError, ConfigError, IngestError, IngestResult, InvariantViolation,
    PipelineError, PipelineResult, SessionId, StoreError,
};
pub use input::{FileInput, Row, RowSet, ValidationInput};
pub use types::{
    AggregateStatus, CheckStatus, CheckType, FileMetadata, InputKind, Severity, StageStatus,
    ValidationCategory,
};
