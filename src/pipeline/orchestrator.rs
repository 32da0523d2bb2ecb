//! Import pipeline orchestration.
//!
//! [`ImportPipeline`] ties the catalog, runner, state machine and session
//! store together. Each session has its own lock; every transition of a
//! session happens under it, while checks run and snapshots are saved after
//! it has been released.

use crate::catalog::registry::{Validation, ValidationCatalog};
use crate::core::config::PipelineConfig;
use crate::core::error::{IngestResult, PipelineError, SessionId};
use crate::core::input::ValidationInput;
use crate::core::types::{FileMetadata, ValidationCategory};
use crate::pipeline::events::{EventCallback, EventSink, PipelineEvent};
use crate::pipeline::machine::{Route, RunTicket, StageMachine, SubmitOutcome};
use crate::pipeline::session::{Lifecycle, PipelineSession, Stage};
use crate::pipeline::store::{MemorySessionStore, SessionStore};
use crate::validation::result::ValidationResult;
use crate::validation::runner::ValidationRunner;
use crate::validation::score::{self, CategoryRollup};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type SharedSession = Arc<Mutex<PipelineSession>>;

/// Builder for [`ImportPipeline`].
pub struct PipelineBuilder {
    config: PipelineConfig,
    catalog: Option<Arc<ValidationCatalog>>,
    store: Option<Arc<dyn SessionStore>>,
    events: Option<EventCallback>,
}

impl PipelineBuilder {
    /// Start from a configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            catalog: None,
            store: None,
            events: None,
        }
    }

    /// Use a prepared catalog instead of the built-in checks.
    pub fn with_catalog(mut self, catalog: Arc<ValidationCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Persist sessions in `store` instead of memory.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Receive pipeline events.
    pub fn with_events<F>(mut self, callback: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.events = Some(Box::new(callback));
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> ImportPipeline {
        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(ValidationCatalog::with_builtins(&self.config)));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        let events = match self.events {
            Some(callback) => EventSink::with_callback(callback),
            None => EventSink::new(),
        };

        ImportPipeline {
            runner: ValidationRunner::new(Arc::clone(&catalog))
                .with_options(self.config.runner.clone()),
            machine: StageMachine::new(self.config.policies.clone()),
            catalog,
            store,
            sessions: Mutex::new(HashMap::new()),
            events,
        }
    }
}

/// The import pipeline service.
pub struct ImportPipeline {
    catalog: Arc<ValidationCatalog>,
    runner: ValidationRunner,
    machine: StageMachine,
    store: Arc<dyn SessionStore>,
    sessions: Mutex<HashMap<SessionId, SharedSession>>,
    events: EventSink,
}

impl ImportPipeline {
    /// Create a pipeline with built-in checks and an in-memory store.
    pub fn new(config: PipelineConfig) -> Self {
        PipelineBuilder::new(config).build()
    }

    /// Start building a pipeline.
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// The shared catalog.
    pub fn catalog(&self) -> &Arc<ValidationCatalog> {
        &self.catalog
    }

    /// The runner.
    pub fn runner(&self) -> &ValidationRunner {
        &self.runner
    }

    /// The state machine.
    pub fn machine(&self) -> &StageMachine {
        &self.machine
    }

    /// The event sink.
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Number of sessions held in memory.
    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Start a session for an uploaded file.
    pub fn create_session(&self, file: FileMetadata) -> IngestResult<PipelineSession> {
        let session = PipelineSession::new(file);
        self.store.save(&session)?;
        log::info!(
            "created session {} for '{}'",
            session.id().short(),
            session.file().name
        );

        self.sessions
            .lock()
            .insert(session.id(), Arc::new(Mutex::new(session.clone())));
        Ok(session)
    }

    /// Load a stored session and make it active.
    pub fn resume(&self, id: SessionId) -> IngestResult<PipelineSession> {
        let handle = self.session(id)?;
        let snapshot = handle.lock().clone();
        log::info!(
            "resumed session {} at {} (r{})",
            id.short(),
            snapshot.current_stage(),
            snapshot.revision()
        );
        Ok(snapshot)
    }

    /// Enter a stage, or the first uncleared one when none is requested.
    pub fn enter(
        &self,
        id: SessionId,
        requested: Option<ValidationCategory>,
    ) -> IngestResult<Stage> {
        let handle = self.session(id)?;
        let (stage, snapshot) = {
            let mut session = handle.lock();
            let revision = session.revision();
            let stage = self.machine.enter(&mut session, requested)?;
            let changed = session.revision() != revision;
            (stage, changed.then(|| session.clone()))
        };

        if let Some(snapshot) = snapshot {
            self.store.save(&snapshot)?;
        }
        self.events.emit(PipelineEvent::StageEntered {
            session_id: id,
            stage,
        });
        Ok(stage)
    }

    /// Issue a ticket for a new run of `category`.
    pub fn begin_run(&self, id: SessionId, category: ValidationCategory) -> IngestResult<RunTicket> {
        let handle = self.session(id)?;
        let (ticket, snapshot) = {
            let mut session = handle.lock();
            let ticket = self.machine.begin_run(&mut session, category)?;
            (ticket, session.clone())
        };

        self.store.save(&snapshot)?;
        self.events.emit(PipelineEvent::RunStarted {
            session_id: id,
            category,
            run: ticket.run,
            checks: self.catalog.count_for_category(category),
        });
        Ok(ticket)
    }

    /// Submit the results of a run.
    pub fn complete_run(
        &self,
        ticket: &RunTicket,
        results: Vec<ValidationResult>,
    ) -> IngestResult<SubmitOutcome> {
        let id = ticket.session_id;
        let handle = self.session(id)?;
        let run_score = score::score(&results);
        let (outcome, snapshot) = {
            let mut session = handle.lock();
            let outcome = self.machine.submit(&mut session, ticket, results)?;
            let snapshot = outcome.is_applied().then(|| session.clone());
            (outcome, snapshot)
        };

        match outcome {
            SubmitOutcome::Applied {
                category,
                run,
                status,
                can_advance,
            } => {
                if let Some(snapshot) = &snapshot {
                    self.store.save(snapshot)?;
                }
                self.events.emit(PipelineEvent::RunApplied {
                    session_id: id,
                    category,
                    run,
                    status,
                    score: run_score,
                    can_advance,
                });
                let completed = snapshot
                    .as_ref()
                    .map_or(false, |s| s.lifecycle() == Lifecycle::Completed);
                if completed && category == ValidationCategory::ImportPush {
                    self.events.emit(PipelineEvent::SessionCompleted { session_id: id });
                }
            }
            SubmitOutcome::Discarded {
                category,
                run,
                applied,
            } => {
                self.events.emit(PipelineEvent::RunDiscarded {
                    session_id: id,
                    category,
                    run,
                    applied,
                });
            }
        }
        Ok(outcome)
    }

    /// Run every check of `category` against `input` and submit the results.
    ///
    /// A run that finishes after a newer run of the same stage was applied is
    /// discarded.
    pub fn run_stage(
        &self,
        id: SessionId,
        category: ValidationCategory,
        input: impl Into<Arc<ValidationInput>>,
    ) -> IngestResult<SubmitOutcome> {
        let ticket = self.begin_run(id, category)?;
        let results = self.runner.run(category, input);
        self.complete_run(&ticket, results)
    }

    /// Whether the session may leave `category`.
    pub fn can_advance(&self, id: SessionId, category: ValidationCategory) -> IngestResult<bool> {
        let handle = self.session(id)?;
        let session = handle.lock();
        Ok(self.machine.can_advance(&session, category))
    }

    /// Where the session should go after `category`.
    pub fn route(&self, id: SessionId, category: ValidationCategory) -> IngestResult<Route> {
        let handle = self.session(id)?;
        let session = handle.lock();
        Ok(self.machine.route(&session, category))
    }

    /// A read-only copy of the session.
    pub fn snapshot(&self, id: SessionId) -> IngestResult<PipelineSession> {
        let handle = self.session(id)?;
        let snapshot = handle.lock().clone();
        Ok(snapshot)
    }

    /// Results of a stage.
    ///
    /// A stage that never ran reports one pending result per catalog check.
    pub fn results(
        &self,
        id: SessionId,
        category: ValidationCategory,
    ) -> IngestResult<Vec<ValidationResult>> {
        let handle = self.session(id)?;
        let stored = {
            let session = handle.lock();
            let ran = session.record(category).map_or(false, |r| r.applied_run > 0);
            ran.then(|| session.results(category).to_vec())
        };

        Ok(stored.unwrap_or_else(|| {
            self.catalog
                .checks_for_category(category)
                .iter()
                .map(|v| ValidationResult::pending(v, "Not yet run"))
                .collect()
        }))
    }

    /// Counts and score of a stage's results.
    pub fn rollup(&self, id: SessionId, category: ValidationCategory) -> IngestResult<CategoryRollup> {
        let results = self.results(id, category)?;
        Ok(CategoryRollup::from_results(&results))
    }

    /// Replace the session's summary text.
    pub fn set_summary(&self, id: SessionId, summary: impl Into<String>) -> IngestResult<()> {
        let handle = self.session(id)?;
        let snapshot = {
            let mut session = handle.lock();
            let revision = session.revision();
            self.machine.set_summary(&mut session, summary)?;
            (session.revision() != revision).then(|| session.clone())
        };

        if let Some(snapshot) = snapshot {
            self.store.save(&snapshot)?;
        }
        Ok(())
    }

    /// Abandon a session.
    pub fn abandon(&self, id: SessionId) -> IngestResult<()> {
        let handle = self.session(id)?;
        let snapshot = {
            let mut session = handle.lock();
            self.machine.abandon(&mut session)?;
            session.clone()
        };

        self.store.save(&snapshot)?;
        self.events
            .emit(PipelineEvent::SessionAbandoned { session_id: id });
        Ok(())
    }

    /// Move a check to another category.
    ///
    /// Stored results are not rewritten; the move shows up in the next run.
    pub fn reassign_category(
        &self,
        check_id: &str,
        category: ValidationCategory,
    ) -> IngestResult<Validation> {
        Ok(self.catalog.reassign_category(check_id, category)?)
    }

    /// Drop a session from memory. It stays in the store.
    pub fn evict(&self, id: SessionId) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    fn session(&self, id: SessionId) -> IngestResult<SharedSession> {
        if let Some(handle) = self.sessions.lock().get(&id) {
            return Ok(Arc::clone(handle));
        }

        let loaded = self
            .store
            .load(&id)?
            .ok_or(PipelineError::SessionNotFound(id))?;
        let mut sessions = self.sessions.lock();
        let handle = sessions
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(loaded)));
        Ok(Arc::clone(handle))
    }
}

impl std::fmt::Debug for ImportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportPipeline")
            .field("checks", &self.catalog.len())
            .field("active_sessions", &self.active_sessions())
            .field("events", &self.events)
            .finish()
    }
}
