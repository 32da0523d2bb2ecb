//! Core value types for the import pipeline.
//!
//! This module defines the shared vocabulary used by every other layer:
//! - Stage identifiers ([`ValidationCategory`]) and their fixed order
//! - Severities, check types and check statuses
//! - Per-stage and legacy aggregate statuses
//! - File metadata supplied by the upload collaborator

use crate::core::error::InvariantViolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which input variant a stage's checks consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Raw file bytes plus metadata.
    File,
    /// Parsed tabular rows.
    Rows,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::File => write!(f, "file bytes"),
            InputKind::Rows => write!(f, "parsed rows"),
        }
    }
}

/// A named stage of the import pipeline.
///
/// Declaration order is the stage order. It defines default precedence and
/// the shape of the completed-stage prefix.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCategory {
    /// File selection: type, size and name checks.
    FileUpload,
    /// Structural inspection of the raw bytes.
    FilePreflight,
    /// Header to target-field mapping.
    ColumnMapping,
    /// Row-level data quality.
    DataQuality,
    /// Normalization of values.
    DataTransformation,
    /// Duplicate detection.
    Deduplication,
    /// Last look before pushing.
    FinalReview,
    /// Push to the target system.
    ImportPush,
}

impl ValidationCategory {
    /// Every category in stage order.
    pub const ALL: [ValidationCategory; 8] = [
        ValidationCategory::FileUpload,
        ValidationCategory::FilePreflight,
        ValidationCategory::ColumnMapping,
        ValidationCategory::DataQuality,
        ValidationCategory::DataTransformation,
        ValidationCategory::Deduplication,
        ValidationCategory::FinalReview,
        ValidationCategory::ImportPush,
    ];

    /// Get all categories in stage order.
    pub fn all() -> &'static [ValidationCategory] {
        &Self::ALL
    }

    /// Zero-based position in the stage order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Category at the given position, if any.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The stage that follows this one.
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// The stage that precedes this one.
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Snake-case identifier used in configuration and session documents.
    pub fn key(self) -> &'static str {
        match self {
            ValidationCategory::FileUpload => "file_upload",
            ValidationCategory::FilePreflight => "file_preflight",
            ValidationCategory::ColumnMapping => "column_mapping",
            ValidationCategory::DataQuality => "data_quality",
            ValidationCategory::DataTransformation => "data_transformation",
            ValidationCategory::Deduplication => "deduplication",
            ValidationCategory::FinalReview => "final_review",
            ValidationCategory::ImportPush => "import_push",
        }
    }

    /// Get the display name for this category.
    pub fn display_name(self) -> &'static str {
        match self {
            ValidationCategory::FileUpload => "File Upload",
            ValidationCategory::FilePreflight => "File Preflight",
            ValidationCategory::ColumnMapping => "Column Mapping",
            ValidationCategory::DataQuality => "Data Quality",
            ValidationCategory::DataTransformation => "Data Transformation",
            ValidationCategory::Deduplication => "Deduplication",
            ValidationCategory::FinalReview => "Final Review",
            ValidationCategory::ImportPush => "Import Push",
        }
    }

    /// Input variant consumed by checks in this category.
    pub fn input_kind(self) -> InputKind {
        match self {
            ValidationCategory::FileUpload | ValidationCategory::FilePreflight => InputKind::File,
            _ => InputKind::Rows,
        }
    }

    /// Whether checks in this category need at least one parsed row.
    ///
    /// Column mapping only looks at headers, so it runs on an empty row set.
    pub fn requires_rows(self) -> bool {
        self >= ValidationCategory::DataQuality
    }
}

impl fmt::Display for ValidationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ValidationCategory {
    type Err = InvariantViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Self::ALL
            .iter()
            .copied()
            .find(|c| c.key().replace('_', "") == normalized)
            .ok_or_else(|| InvariantViolation::UnknownCategory(s.to_string()))
    }
}

/// Ordinal importance of a failing check.
///
/// A check without a declared severity sits in an implicit informational tier
/// below `Low`; that is modelled as `Option<Severity>::None`, which orders
/// before every `Some(_)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic.
    Low,
    /// Worth fixing; never blocks on its own.
    Medium,
    /// Blocks structural stages.
    High,
    /// Blocks every stage.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Broad kind of rule a check enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// Shape of the file or table.
    Structural,
    /// Content of individual values.
    Data,
    /// Domain rules.
    Business,
}

/// Outcome of a single check evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The check held.
    Pass,
    /// The check did not hold.
    Fail,
    /// The check held with reservations.
    Warning,
    /// Not yet scored: the category has not run or the check lacked context.
    Pending,
}

impl CheckStatus {
    /// Score weight, or `None` for statuses excluded from scoring.
    pub fn weight(self) -> Option<f64> {
        match self {
            CheckStatus::Pass => Some(1.0),
            CheckStatus::Warning => Some(0.5),
            CheckStatus::Fail => Some(0.0),
            CheckStatus::Pending => None,
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Warning => "warning",
            CheckStatus::Pending => "pending",
        };
        f.write_str(name)
    }
}

/// Status of one stage within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Never entered.
    #[default]
    NotStarted,
    /// Entered, no results yet.
    InProgress,
    /// Every check passed.
    Success,
    /// Non-critical failures or warnings.
    Warning,
    /// At least one critical failure.
    Error,
    /// Some checks could not be evaluated.
    VerificationPending,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageStatus::NotStarted => "not started",
            StageStatus::InProgress => "in progress",
            StageStatus::Success => "success",
            StageStatus::Warning => "warning",
            StageStatus::Error => "error",
            StageStatus::VerificationPending => "verification pending",
        };
        f.write_str(name)
    }
}

/// Coarse session status kept by sessions that predate per-stage tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    /// Nothing ran.
    #[default]
    NotStarted,
    /// Work started.
    InProgress,
    /// Finished with warnings.
    Warning,
    /// Failed.
    Error,
    /// Imported.
    Success,
}

/// Metadata describing the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Original file name, including extension.
    pub name: String,
    /// Size in bytes as reported by the upload collaborator.
    pub size: u64,
    /// Declared MIME type, if the collaborator supplied one.
    pub mime_type: Option<String>,
}

impl FileMetadata {
    /// Create metadata for a file.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: None,
        }
    }

    /// Set the declared MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Lower-cased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}
