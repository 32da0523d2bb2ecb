//! Pipeline configuration.
//!
//! Configuration is plain serde data so it can be loaded from a TOML file or
//! built in code with the `with_*` methods. Every field has a default, and a
//! TOML file only needs to name the values it changes.
//!
//! ```toml
//! max_file_size_bytes = 10485760
//! required_columns = ["email", "name"]
//!
//! [runner]
//! parallel = true
//! check_timeout_ms = 2000
//!
//! [policies.final_review]
//! warnings = "allow"
//! ```

use crate::core::error::ConfigError;
use crate::core::types::{CheckStatus, Severity, ValidationCategory};
use crate::validation::result::ValidationResult;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// How a stage treats a `Warning` status when deciding advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningPolicy {
    /// Warnings never block.
    Allow,
    /// Any warning blocks.
    Block,
    /// Block when a non-passing check has at least this severity.
    BlockAtOrAbove(Severity),
}

impl WarningPolicy {
    /// Whether a stage whose status is `Warning` may advance under this policy.
    pub fn allows(&self, results: &[ValidationResult]) -> bool {
        match self {
            WarningPolicy::Allow => true,
            WarningPolicy::Block => false,
            WarningPolicy::BlockAtOrAbove(threshold) => !results.iter().any(|r| {
                matches!(r.status, CheckStatus::Fail | CheckStatus::Warning)
                    && r.severity >= Some(*threshold)
            }),
        }
    }
}

/// Where the session is routed after a critical failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureRoute {
    /// Keep the session on the failing stage so issues are fixed in place.
    Stay,
    /// Send the user back to an earlier stage.
    ReturnTo(ValidationCategory),
}

/// Advancement policy for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePolicy {
    /// Treatment of `Warning` status.
    pub warnings: WarningPolicy,
    /// Routing after a critical failure.
    pub on_critical_failure: FailureRoute,
}

impl StagePolicy {
    /// Policy that lets warnings through.
    pub fn lenient() -> Self {
        Self {
            warnings: WarningPolicy::Allow,
            on_critical_failure: FailureRoute::Stay,
        }
    }

    /// Policy that blocks on high or critical warnings.
    pub fn structural() -> Self {
        Self {
            warnings: WarningPolicy::BlockAtOrAbove(Severity::High),
            on_critical_failure: FailureRoute::Stay,
        }
    }

    /// Set the critical failure route.
    pub fn with_route(mut self, route: FailureRoute) -> Self {
        self.on_critical_failure = route;
        self
    }

    /// Set the warning policy.
    pub fn with_warnings(mut self, warnings: WarningPolicy) -> Self {
        self.warnings = warnings;
        self
    }
}

impl Default for StagePolicy {
    fn default() -> Self {
        Self::structural()
    }
}

/// Per-stage advancement policies.
///
/// Deserializing overlays the given entries on [`PolicyTable::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PolicyTable {
    policies: IndexMap<ValidationCategory, StagePolicy>,
}

impl PolicyTable {
    /// Policy for a stage; stages without an entry use the structural policy.
    pub fn get(&self, category: ValidationCategory) -> StagePolicy {
        self.policies.get(&category).copied().unwrap_or_default()
    }

    /// Replace the policy for a stage.
    pub fn set(&mut self, category: ValidationCategory, policy: StagePolicy) {
        self.policies.insert(category, policy);
    }

    /// Builder-style variant of [`PolicyTable::set`].
    pub fn with(mut self, category: ValidationCategory, policy: StagePolicy) -> Self {
        self.set(category, policy);
        self
    }

    /// Iterate over every stage and its effective policy, in stage order.
    pub fn iter(&self) -> impl Iterator<Item = (ValidationCategory, StagePolicy)> + '_ {
        ValidationCategory::all().iter().map(|&c| (c, self.get(c)))
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        use ValidationCategory::*;

        let policies = [
            (FileUpload, StagePolicy::structural()),
            (
                FilePreflight,
                StagePolicy::structural().with_route(FailureRoute::ReturnTo(FileUpload)),
            ),
            (ColumnMapping, StagePolicy::structural()),
            (DataQuality, StagePolicy::lenient()),
            (DataTransformation, StagePolicy::lenient()),
            (Deduplication, StagePolicy::lenient()),
            (FinalReview, StagePolicy::structural()),
            (
                ImportPush,
                StagePolicy::structural().with_warnings(WarningPolicy::Block),
            ),
        ]
        .into_iter()
        .collect();

        Self { policies }
    }
}

impl<'de> Deserialize<'de> for PolicyTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let overrides = IndexMap::<ValidationCategory, StagePolicy>::deserialize(deserializer)?;
        let mut table = PolicyTable::default();
        for (category, policy) in overrides {
            table.set(category, policy);
        }
        Ok(table)
    }
}

/// Options for the validation runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerOptions {
    /// Evaluate the checks of a category on the rayon pool.
    pub parallel: bool,
    /// Per-check time limit; a check exceeding it is reported as pending.
    pub check_timeout_ms: Option<u64>,
}

impl RunnerOptions {
    /// Per-check time limit as a duration.
    pub fn check_timeout(&self) -> Option<Duration> {
        self.check_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            check_timeout_ms: None,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest accepted upload.
    pub max_file_size_bytes: u64,
    /// Accepted file extensions, lower-case, without the dot.
    pub allowed_extensions: Vec<String>,
    /// Declared MIME types accepted without a warning.
    pub allowed_mime_types: Vec<String>,
    /// Columns every import must carry.
    pub required_columns: Vec<String>,
    /// Columns the target understands; empty means any column is accepted.
    pub known_columns: Vec<String>,
    /// Columns whose combined values identify a record.
    pub dedup_key_columns: Vec<String>,
    /// Largest row count accepted at final review.
    pub max_row_count: usize,
    /// Rows per batch when pushing to the target.
    pub push_batch_size: usize,
    /// Runner behaviour.
    pub runner: RunnerOptions,
    /// Advancement policies.
    pub policies: PolicyTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 50 * 1024 * 1024, // 50 MB
            allowed_extensions: vec!["csv".to_string()],
            allowed_mime_types: vec![
                "text/csv".to_string(),
                "application/csv".to_string(),
                "text/plain".to_string(),
                "application/vnd.ms-excel".to_string(),
            ],
            required_columns: vec!["email".to_string()],
            known_columns: Vec::new(),
            dedup_key_columns: vec!["email".to_string()],
            max_row_count: 1_000_000,
            push_batch_size: 500,
            runner: RunnerOptions::default(),
            policies: PolicyTable::default(),
        }
    }
}

impl PipelineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded pipeline configuration from {}", path.display());
        Self::from_toml_str(&source)
    }

    /// Reject values no pipeline can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size_bytes == 0 {
            return Err(invalid("max_file_size_bytes", "must be greater than zero"));
        }
        if self.allowed_extensions.is_empty() {
            return Err(invalid("allowed_extensions", "at least one extension is required"));
        }
        if self.max_row_count == 0 {
            return Err(invalid("max_row_count", "must be greater than zero"));
        }
        if self.push_batch_size == 0 {
            return Err(invalid("push_batch_size", "must be greater than zero"));
        }
        if self.runner.check_timeout_ms == Some(0) {
            return Err(invalid("runner.check_timeout_ms", "must be greater than zero"));
        }
        Ok(())
    }

    /// Set the largest accepted upload.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    /// Set the required columns.
    pub fn with_required_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the known target columns.
    pub fn with_known_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the deduplication key columns.
    pub fn with_dedup_keys<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dedup_key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable parallel check evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.runner.parallel = parallel;
        self
    }

    /// Set the per-check timeout.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.runner.check_timeout_ms = Some(timeout.as_millis().max(1) as u64);
        self
    }

    /// Replace the policy for one stage.
    pub fn with_policy(mut self, category: ValidationCategory, policy: StagePolicy) -> Self {
        self.policies.set(category, policy);
        self
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
