//! Stage state machine.
//!
//! The machine owns every transition of a [`PipelineSession`]: entering
//! stages, issuing run tickets, applying run results, and deciding where the
//! session goes next. It performs no I/O and holds no locks; callers
//! serialize access per session.

use crate::core::config::{FailureRoute, PolicyTable, StagePolicy};
use crate::core::error::{InvariantViolation, PipelineError, PipelineResult, SessionId};
use crate::core::types::{CheckStatus, StageStatus, ValidationCategory};
use crate::pipeline::session::{Lifecycle, PipelineSession, Stage};
use crate::validation::result::ValidationResult;
use serde::{Deserialize, Serialize};

/// Permission to submit one run of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunTicket {
    /// Session the run belongs to.
    pub session_id: SessionId,
    /// Stage being run.
    pub category: ValidationCategory,
    /// Run number, increasing per stage.
    pub run: u64,
}

/// What happened to a submitted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitOutcome {
    /// The results were stored.
    Applied {
        /// Stage of the run.
        category: ValidationCategory,
        /// Applied run number.
        run: u64,
        /// Derived stage status.
        status: StageStatus,
        /// Whether the stage may now be left.
        can_advance: bool,
    },
    /// A newer run had already been applied; the results were dropped.
    Discarded {
        /// Stage of the run.
        category: ValidationCategory,
        /// Discarded run number.
        run: u64,
        /// Run number that stays applied.
        applied: u64,
    },
}

impl SubmitOutcome {
    /// Whether the results were stored.
    pub fn is_applied(&self) -> bool {
        matches!(self, SubmitOutcome::Applied { .. })
    }
}

/// Where the session should go after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Move on to the next stage, or `Done` after the last one.
    Advance(Stage),
    /// Keep the user on this stage.
    Stay,
    /// Send the user back to an earlier stage.
    ReturnTo(ValidationCategory),
}

/// Derive a stage status from its results.
///
/// Critical failures win over everything; pending results keep the stage
/// unverified; any other failure or warning gives `Warning`.
pub fn derive_status(results: &[ValidationResult]) -> StageStatus {
    if results.iter().any(ValidationResult::is_critical_failure) {
        StageStatus::Error
    } else if results.iter().any(|r| r.status == CheckStatus::Pending) {
        StageStatus::VerificationPending
    } else if results
        .iter()
        .any(|r| matches!(r.status, CheckStatus::Fail | CheckStatus::Warning))
    {
        StageStatus::Warning
    } else {
        StageStatus::Success
    }
}

/// Applies the advancement rules of a [`PolicyTable`].
#[derive(Debug, Clone, Default)]
pub struct StageMachine {
    policies: PolicyTable,
}

impl StageMachine {
    /// Create a machine with the given policies.
    pub fn new(policies: PolicyTable) -> Self {
        Self { policies }
    }

    /// The policy table.
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Policy for one stage.
    pub fn policy(&self, category: ValidationCategory) -> StagePolicy {
        self.policies.get(category)
    }

    /// Whether the session may leave `category`.
    pub fn can_advance(&self, session: &PipelineSession, category: ValidationCategory) -> bool {
        let results = session.results(category);
        if results.iter().any(ValidationResult::is_critical_failure) {
            return false;
        }
        match session.status(category) {
            StageStatus::Success => true,
            StageStatus::Warning => self.policy(category).warnings.allows(results),
            _ => false,
        }
    }

    /// Where the session should go after `category`.
    pub fn route(&self, session: &PipelineSession, category: ValidationCategory) -> Route {
        if self.can_advance(session, category) {
            return Route::Advance(category.next().map_or(Stage::Done, Stage::At));
        }
        match (session.status(category), self.policy(category).on_critical_failure) {
            (StageStatus::Error, FailureRoute::ReturnTo(target)) => Route::ReturnTo(target),
            _ => Route::Stay,
        }
    }

    /// Enter a stage, or the first uncleared one when none is requested.
    ///
    /// Entering a stage whose predecessors are not cleared is a blocked
    /// advancement and changes nothing. A stage entered before it has any
    /// results is marked in progress; stages that already ran keep their
    /// derived status and stay in the completed prefix. Entering without a
    /// request twice in a row returns the same stage.
    pub fn enter(
        &self,
        session: &mut PipelineSession,
        requested: Option<ValidationCategory>,
    ) -> PipelineResult<Stage> {
        match (session.lifecycle(), requested) {
            (Lifecycle::Active, _) => {}
            (Lifecycle::Completed, None) => return Ok(Stage::Done),
            (_, _) => return Err(closed(session)),
        }

        let target = match requested {
            Some(category) => {
                self.check_prerequisites(session, category)?;
                Some(category)
            }
            None => ValidationCategory::from_index(session.completed_stages().len()),
        };
        let Some(category) = target else {
            if session.current_stage != Stage::Done {
                session.current_stage = Stage::Done;
                session.touch();
            }
            return Ok(Stage::Done);
        };

        let stage = Stage::At(category);
        let mut changed = session.current_stage != stage;
        session.current_stage = stage;

        if category != ValidationCategory::FileUpload
            && session.status(category) == StageStatus::NotStarted
        {
            session.record_mut(category)?.status = StageStatus::InProgress;
            changed = true;
        }

        if changed {
            session.touch();
        }
        log::debug!("session {} entered {}", session.id().short(), category);
        Ok(stage)
    }

    /// Check that every stage before `category` has been cleared.
    pub fn check_prerequisites(
        &self,
        session: &PipelineSession,
        category: ValidationCategory,
    ) -> PipelineResult<()> {
        let cleared = session.completed_stages().len();
        if cleared >= category.index() {
            return Ok(());
        }
        let blocked_by = ValidationCategory::from_index(cleared).unwrap_or(category);
        log::info!(
            "session {}: {} blocked by {}",
            session.id().short(),
            category,
            blocked_by
        );
        Err(PipelineError::BlockedAdvancement {
            category,
            blocked_by,
        })
    }

    /// Issue a ticket for a new run of `category`.
    pub fn begin_run(
        &self,
        session: &mut PipelineSession,
        category: ValidationCategory,
    ) -> PipelineResult<RunTicket> {
        if session.is_closed() {
            return Err(closed(session));
        }
        self.check_prerequisites(session, category)?;

        let record = session.record_mut(category)?;
        record.issued_run += 1;
        let run = record.issued_run;
        session.touch();

        Ok(RunTicket {
            session_id: session.id(),
            category,
            run,
        })
    }

    /// Apply the results of a run.
    ///
    /// Results from a run older than the one already applied are discarded.
    /// A run for a stage whose predecessors are not cleared is rejected and
    /// the session is left unchanged.
    pub fn submit(
        &self,
        session: &mut PipelineSession,
        ticket: &RunTicket,
        results: Vec<ValidationResult>,
    ) -> PipelineResult<SubmitOutcome> {
        let category = ticket.category;
        if ticket.session_id != session.id() {
            return Err(InvariantViolation::SessionMismatch {
                session: session.id(),
                ticket: ticket.session_id,
            }
            .into());
        }

        let (issued, applied) = {
            let record = session.record_mut(category)?;
            (record.issued_run, record.applied_run)
        };
        if ticket.run == 0 || ticket.run > issued {
            return Err(InvariantViolation::UnknownRun {
                category,
                run: ticket.run,
                issued,
            }
            .into());
        }
        if ticket.run <= applied {
            log::info!(
                "session {}: discarding stale run {} of {} (run {} already applied)",
                session.id().short(),
                ticket.run,
                category,
                applied
            );
            return Ok(SubmitOutcome::Discarded {
                category,
                run: ticket.run,
                applied,
            });
        }

        if session.is_closed() {
            return Err(closed(session));
        }
        self.check_prerequisites(session, category)?;

        let status = derive_status(&results);
        {
            let record = session.record_mut(category)?;
            record.results = results;
            record.status = status;
            record.applied_run = ticket.run;
        }

        session.completed_stages.truncate(category.index());
        let can_advance = self.can_advance(session, category);
        if can_advance {
            self.mark_cleared(session, category)?;
            for &following in &ValidationCategory::ALL[category.index() + 1..] {
                if !self.can_advance(session, following) {
                    break;
                }
                self.mark_cleared(session, following)?;
            }
        }

        if category == ValidationCategory::ImportPush && status == StageStatus::Success {
            session.lifecycle = Lifecycle::Completed;
            session.current_stage = Stage::Done;
            log::info!("session {} completed", session.id().short());
        }
        session.touch();

        log::debug!(
            "session {}: applied run {} of {} ({})",
            session.id().short(),
            ticket.run,
            category,
            status
        );
        Ok(SubmitOutcome::Applied {
            category,
            run: ticket.run,
            status,
            can_advance,
        })
    }

    /// Replace the summary text of an active session.
    pub fn set_summary(
        &self,
        session: &mut PipelineSession,
        summary: impl Into<String>,
    ) -> PipelineResult<()> {
        if session.is_closed() {
            return Err(closed(session));
        }
        let summary = summary.into();
        if session.summary != summary {
            session.summary = summary;
            session.touch();
        }
        Ok(())
    }

    /// Abandon an active session.
    pub fn abandon(&self, session: &mut PipelineSession) -> PipelineResult<()> {
        if session.is_closed() {
            return Err(closed(session));
        }
        session.lifecycle = Lifecycle::Abandoned;
        session.touch();
        log::info!("session {} abandoned", session.id().short());
        Ok(())
    }

    fn mark_cleared(
        &self,
        session: &mut PipelineSession,
        category: ValidationCategory,
    ) -> Result<(), InvariantViolation> {
        let expected = session.completed_stages.len();
        if category.index() != expected {
            let expected = ValidationCategory::from_index(expected).unwrap_or(category);
            return Err(InvariantViolation::NonContiguousCompletion { category, expected });
        }
        session.completed_stages.push(category);
        Ok(())
    }
}

fn closed(session: &PipelineSession) -> PipelineError {
    PipelineError::SessionClosed {
        session_id: session.id(),
        state: session.lifecycle().to_string(),
    }
}
