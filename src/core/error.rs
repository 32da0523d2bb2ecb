//! Error types for Stagegate.
//!
//! Uses thiserror for structured errors with context. The taxonomy mirrors how
//! callers are expected to react:
//! - [`CheckError`] never leaves the runner; it becomes a `fail` or `pending` result
//! - [`InvariantViolation`] is a caller or integration bug and is always returned
//! - [`PipelineError::BlockedAdvancement`] is an expected refusal to start or
//!   submit a stage whose predecessors have not been cleared

use crate::core::types::{InputKind, ValidationCategory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a pipeline session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a session ID from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Top-level error type for Stagegate.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum IngestError {
    /// A state machine transition failed.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// The catalog rejected an edit.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Loading or saving a session failed.
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// The configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Raw I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<InvariantViolation> for IngestError {
    fn from(violation: InvariantViolation) -> Self {
        IngestError::Pipeline(PipelineError::Invariant(violation))
    }
}

/// Errors raised by the stage state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineError {
    /// An ordering or bookkeeping rule was broken.
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// An earlier stage has not been cleared.
    #[error("Cannot run {category}: {blocked_by} has not been cleared")]
    BlockedAdvancement {
        /// Stage that was requested.
        category: ValidationCategory,
        /// First earlier stage that is not cleared.
        blocked_by: ValidationCategory,
    },

    /// No session with this id exists.
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    /// The session was completed or abandoned.
    #[error("Session {session_id} is {state} and accepts no further transitions")]
    SessionClosed {
        /// The closed session.
        session_id: SessionId,
        /// Its lifecycle state.
        state: String,
    },
}

impl PipelineError {
    /// Whether this is the expected "not yet" answer rather than a bug.
    pub fn is_blocked(&self) -> bool {
        matches!(self, PipelineError::BlockedAdvancement { .. })
    }
}

/// Programming or integration errors that must never be silently corrected.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvariantViolation {
    /// A category name did not parse.
    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    /// A stage was marked complete out of order.
    #[error("{category} cannot complete before {expected}")]
    NonContiguousCompletion {
        /// Stage that was being completed.
        category: ValidationCategory,
        /// Stage that had to complete next.
        expected: ValidationCategory,
    },

    /// A stored completed-stage list has gaps or is out of order.
    #[error("Completed stages are not a contiguous prefix: {0:?}")]
    CompletedStagesNotPrefix(Vec<ValidationCategory>),

    /// A ticket carries a run number that was never handed out.
    #[error("Run {run} for {category} was never issued (latest issued is {issued})")]
    UnknownRun {
        /// Stage of the ticket.
        category: ValidationCategory,
        /// Run number on the ticket.
        run: u64,
        /// Highest run number handed out.
        issued: u64,
    },

    /// A ticket was submitted to the wrong session.
    #[error("Run ticket belongs to session {ticket}, not {session}")]
    SessionMismatch {
        /// Session receiving the submit.
        session: SessionId,
        /// Session named on the ticket.
        ticket: SessionId,
    },

    /// A session lacks the record for a stage.
    #[error("Stage status for {0} is missing")]
    MissingStage(ValidationCategory),

    /// A stage claims to have applied a run it never issued.
    #[error("Run counter for {category} applied {applied} beyond issued {issued}")]
    RunCounterAhead {
        /// Affected stage.
        category: ValidationCategory,
        /// Applied run number.
        applied: u64,
        /// Highest issued run number.
        issued: u64,
    },
}

/// Errors raised while building or editing the validation catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Another check already uses this id.
    #[error("Check '{0}' is already registered")]
    DuplicateId(String),

    /// No check has this id.
    #[error("Check '{0}' not found")]
    UnknownCheck(String),

    /// The check's input kind does not match its category.
    #[error("Check '{id}' consumes {check} but {category} supplies {category_input}")]
    InputMismatch {
        /// Check id.
        id: String,
        /// Target category.
        category: ValidationCategory,
        /// Input the check consumes.
        check: InputKind,
        /// Input the category supplies.
        category_input: InputKind,
    },
}

/// Failure inside an individual check's evaluation logic.
///
/// The runner recovers every variant locally; none of them abort a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// The check lacks the context it needs; reported as `pending`.
    #[error("Missing context: {0}")]
    MissingContext(String),

    /// The input was present but unusable.
    #[error("Input could not be read: {0}")]
    Unreadable(String),

    /// The check panicked; the runner caught it.
    #[error("Check panicked: {0}")]
    Panicked(String),

    /// Any other evaluation failure.
    #[error("{0}")]
    Other(String),
}

/// Errors from the session persistence boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing a document failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Document or directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A document is not valid session JSON.
    #[error("Malformed session document {path}: {source}")]
    Malformed {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The document was written by an incompatible format version.
    #[error("Session document version {found} is not compatible with {supported}")]
    IncompatibleVersion {
        /// Version in the document.
        found: String,
        /// Version this build writes.
        supported: String,
    },

    /// The document breaks a session invariant.
    #[error("Stored session is inconsistent: {0}")]
    Inconsistent(#[from] InvariantViolation),
}

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read configuration {path}: {source}")]
    Read {
        /// Configuration path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML did not parse.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type alias for top-level operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type alias for state machine operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_blocked_is_not_a_bug() {
        let blocked = PipelineError::BlockedAdvancement {
            category: ValidationCategory::ImportPush,
            blocked_by: ValidationCategory::FinalReview,
        };
        assert!(blocked.is_blocked());
        assert!(blocked.to_string().contains("Final Review"));

        let invariant: PipelineError =
            InvariantViolation::UnknownCategory("shipping".to_string()).into();
        assert!(!invariant.is_blocked());
    }

    #[test]
    fn test_invariant_converts_to_top_level() {
        let err: IngestError = InvariantViolation::MissingStage(ValidationCategory::FileUpload).into();
        assert!(matches!(
            err,
            IngestError::Pipeline(PipelineError::Invariant(InvariantViolation::MissingStage(_)))
        ));
    }
}
