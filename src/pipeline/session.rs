//! Session state.
//!
//! A [`PipelineSession`] is owned by the state machine. Everything outside the
//! pipeline module reads it through clones handed out as snapshots.

use crate::core::error::{InvariantViolation, SessionId};
use crate::core::types::{AggregateStatus, FileMetadata, StageStatus, ValidationCategory};
use crate::validation::result::ValidationResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Position of a session in the stage order, including the two meta-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Before file upload.
    #[default]
    NotStarted,
    /// At a stage.
    At(ValidationCategory),
    /// After a successful import push.
    Done,
}

impl Stage {
    /// The stage's category, if the session is at one.
    pub fn category(self) -> Option<ValidationCategory> {
        match self {
            Stage::At(category) => Some(category),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::NotStarted => write!(f, "Not Started"),
            Stage::At(category) => write!(f, "{}", category),
            Stage::Done => write!(f, "Done"),
        }
    }
}

/// Whether a session still accepts transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Accepts transitions.
    #[default]
    Active,
    /// The import push succeeded.
    Completed,
    /// The user gave up.
    Abandoned,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Active => write!(f, "active"),
            Lifecycle::Completed => write!(f, "completed"),
            Lifecycle::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Per-stage state: status, latest results and run counters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageRecord {
    /// Current status.
    pub status: StageStatus,
    /// Results of the latest applied run, in catalog order.
    pub results: Vec<ValidationResult>,
    /// Highest run number handed out.
    pub issued_run: u64,
    /// Run number whose results are stored; 0 when none.
    pub applied_run: u64,
}

/// One import session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSession {
    pub(crate) id: SessionId,
    pub(crate) file: FileMetadata,
    /// Free-form notes about the import.
    #[serde(default)]
    pub(crate) summary: String,
    pub(crate) stages: IndexMap<ValidationCategory, StageRecord>,
    pub(crate) completed_stages: Vec<ValidationCategory>,
    #[serde(default)]
    pub(crate) current_stage: Stage,
    #[serde(default)]
    pub(crate) lifecycle: Lifecycle,
    /// Coarse status written by sessions that predate per-stage tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) legacy_status: Option<AggregateStatus>,
    #[serde(default)]
    pub(crate) revision: u64,
    pub(crate) created_at_ms: u64,
    pub(crate) updated_at_ms: u64,
}

impl PipelineSession {
    /// Create a fresh session for an uploaded file.
    pub fn new(file: FileMetadata) -> Self {
        Self::with_id(SessionId::new(), file)
    }

    /// Create a fresh session with a known id.
    pub fn with_id(id: SessionId, file: FileMetadata) -> Self {
        let now = now_ms();
        Self {
            id,
            file,
            summary: String::new(),
            stages: ValidationCategory::all()
                .iter()
                .map(|&c| (c, StageRecord::default()))
                .collect(),
            completed_stages: Vec::new(),
            current_stage: Stage::NotStarted,
            lifecycle: Lifecycle::Active,
            legacy_status: None,
            revision: 0,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Metadata of the uploaded file.
    pub fn file(&self) -> &FileMetadata {
        &self.file
    }

    /// Free-form summary text.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Status of a stage.
    pub fn status(&self, category: ValidationCategory) -> StageStatus {
        self.stages
            .get(&category)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    /// Stored results of a stage, empty when it never ran.
    pub fn results(&self, category: ValidationCategory) -> &[ValidationResult] {
        self.stages
            .get(&category)
            .map(|r| r.results.as_slice())
            .unwrap_or(&[])
    }

    /// Full record of a stage.
    pub fn record(&self, category: ValidationCategory) -> Option<&StageRecord> {
        self.stages.get(&category)
    }

    /// Stages cleared so far, always a prefix of the stage order.
    pub fn completed_stages(&self) -> &[ValidationCategory] {
        &self.completed_stages
    }

    /// Whether a stage is part of the completed prefix.
    pub fn is_completed(&self, category: ValidationCategory) -> bool {
        self.completed_stages.len() > category.index()
    }

    /// The stage last entered.
    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    /// Lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Whether the session rejects further transitions.
    pub fn is_closed(&self) -> bool {
        self.lifecycle != Lifecycle::Active
    }

    /// Edit counter, bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Last mutation time in milliseconds since the Unix epoch.
    pub fn updated_at_ms(&self) -> u64 {
        self.updated_at_ms
    }

    /// Whether any stage has a status or results of its own.
    pub fn has_stage_state(&self) -> bool {
        self.stages
            .values()
            .any(|r| r.status != StageStatus::NotStarted || !r.results.is_empty())
    }

    /// Coarse status derived from the per-stage statuses.
    ///
    /// The legacy field is used only when no stage has state of its own.
    pub fn aggregate_status(&self) -> AggregateStatus {
        if !self.has_stage_state() {
            return self.legacy_status.unwrap_or_default();
        }
        let statuses: Vec<StageStatus> = self.stages.values().map(|r| r.status).collect();
        if statuses.contains(&StageStatus::Error) {
            AggregateStatus::Error
        } else if statuses.iter().all(|s| *s == StageStatus::Success) {
            AggregateStatus::Success
        } else if statuses
            .iter()
            .any(|s| matches!(s, StageStatus::Warning | StageStatus::VerificationPending))
        {
            AggregateStatus::Warning
        } else {
            AggregateStatus::InProgress
        }
    }

    /// Apply the legacy aggregate status to a session with no per-stage state.
    ///
    /// Only a legacy `Success` carries stage information: every stage is
    /// marked successful and the session is completed. Returns whether the
    /// session changed.
    pub fn reconcile_legacy(&mut self) -> bool {
        if self.has_stage_state() || self.legacy_status != Some(AggregateStatus::Success) {
            return false;
        }
        for record in self.stages.values_mut() {
            record.status = StageStatus::Success;
        }
        self.completed_stages = ValidationCategory::ALL.to_vec();
        self.current_stage = Stage::Done;
        self.lifecycle = Lifecycle::Completed;
        log::info!("session {} reconciled from legacy status: completed", self.id.short());
        true
    }

    /// Verify the structural invariants of a session.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for &category in ValidationCategory::all() {
            let record = self
                .stages
                .get(&category)
                .ok_or(InvariantViolation::MissingStage(category))?;
            if record.applied_run > record.issued_run {
                return Err(InvariantViolation::RunCounterAhead {
                    category,
                    applied: record.applied_run,
                    issued: record.issued_run,
                });
            }
        }

        let is_prefix = self
            .completed_stages
            .iter()
            .enumerate()
            .all(|(i, c)| c.index() == i);
        if !is_prefix {
            return Err(InvariantViolation::CompletedStagesNotPrefix(
                self.completed_stages.clone(),
            ));
        }
        Ok(())
    }

    pub(crate) fn record_mut(
        &mut self,
        category: ValidationCategory,
    ) -> Result<&mut StageRecord, InvariantViolation> {
        self.stages
            .get_mut(&category)
            .ok_or(InvariantViolation::MissingStage(category))
    }

    /// Record a mutation.
    pub(crate) fn touch(&mut self) {
        self.revision += 1;
        self.updated_at_ms = now_ms().max(self.updated_at_ms);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CheckStatus;

    fn session() -> PipelineSession {
        PipelineSession::new(FileMetadata::new("people.csv", 120))
    }

    #[test]
    fn test_new_session() {
        let session = session();
        assert_eq!(session.stages.len(), 8);
        assert!(session.completed_stages().is_empty());
        assert_eq!(session.current_stage(), Stage::NotStarted);
        assert_eq!(session.summary(), "");
        assert_eq!(session.aggregate_status(), AggregateStatus::NotStarted);
        assert!(session.check_invariants().is_ok());
    }

    #[test]
    fn test_legacy_success_reconciled() {
        let mut session = session();
        session.legacy_status = Some(AggregateStatus::Success);
        assert_eq!(session.aggregate_status(), AggregateStatus::Success);

        assert!(session.reconcile_legacy());
        assert_eq!(session.completed_stages().len(), 8);
        assert_eq!(session.lifecycle(), Lifecycle::Completed);
        assert_eq!(session.current_stage(), Stage::Done);
        assert!(session.check_invariants().is_ok());
    }

    #[test]
    fn test_per_stage_status_wins_over_legacy() {
        let mut session = session();
        session.legacy_status = Some(AggregateStatus::Success);
        session.record_mut(ValidationCategory::FileUpload).unwrap().status = StageStatus::Error;

        assert!(!session.reconcile_legacy());
        assert_eq!(session.aggregate_status(), AggregateStatus::Error);
        assert_eq!(session.lifecycle(), Lifecycle::Active);
    }

    #[test]
    fn test_legacy_without_stage_information() {
        let mut session = session();
        session.legacy_status = Some(AggregateStatus::Warning);
        assert!(!session.reconcile_legacy());
        assert_eq!(session.aggregate_status(), AggregateStatus::Warning);
        assert_eq!(session.status(ValidationCategory::FileUpload), StageStatus::NotStarted);
    }

    #[test]
    fn test_results_without_status_count_as_stage_state() {
        let mut session = session();
        session.legacy_status = Some(AggregateStatus::Success);
        session
            .record_mut(ValidationCategory::FileUpload)
            .unwrap()
            .results
            .push(ValidationResult {
                id: "upload_file_type".into(),
                name: "File type".into(),
                status: CheckStatus::Pending,
                severity: None,
                message: String::new(),
                technical_details: Vec::new(),
                tally: None,
            });
        assert!(!session.reconcile_legacy());
    }

    #[test]
    fn test_invariant_checks() {
        let mut session = session();
        session.completed_stages = vec![
            ValidationCategory::FileUpload,
            ValidationCategory::ColumnMapping,
        ];
        assert!(matches!(
            session.check_invariants(),
            Err(InvariantViolation::CompletedStagesNotPrefix(_))
        ));

        let mut session = self::session();
        session.record_mut(ValidationCategory::DataQuality).unwrap().applied_run = 2;
        assert!(matches!(
            session.check_invariants(),
            Err(InvariantViolation::RunCounterAhead { .. })
        ));

        let mut session = self::session();
        session.stages.shift_remove(&ValidationCategory::ImportPush);
        assert_eq!(
            session.check_invariants(),
            Err(InvariantViolation::MissingStage(ValidationCategory::ImportPush))
        );
    }

    #[test]
    fn test_touch_bumps_revision() {
        let mut session = session();
        let before = session.updated_at_ms();
        session.touch();
        assert_eq!(session.revision(), 1);
        assert!(session.updated_at_ms() >= before);
    }
}
