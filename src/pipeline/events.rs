//! Pipeline events for observers.

use crate::core::error::SessionId;
use crate::core::types::{StageStatus, ValidationCategory};
use crate::pipeline::session::Stage;
use std::sync::atomic::{AtomicU64, Ordering};

/// A pipeline event.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A session entered a stage.
    StageEntered {
        /// Session concerned.
        session_id: SessionId,
        /// Stage entered.
        stage: Stage,
    },
    /// A run was started.
    RunStarted {
        /// Session concerned.
        session_id: SessionId,
        /// Stage of the run.
        category: ValidationCategory,
        /// Run number.
        run: u64,
        /// Checks in the stage.
        checks: usize,
    },
    /// A run's results were applied.
    RunApplied {
        /// Session concerned.
        session_id: SessionId,
        /// Stage of the run.
        category: ValidationCategory,
        /// Run number.
        run: u64,
        /// Derived stage status.
        status: StageStatus,
        /// Score of the applied results.
        score: u8,
        /// Whether the stage may now be left.
        can_advance: bool,
    },
    /// A run was superseded by a newer one.
    RunDiscarded {
        /// Session concerned.
        session_id: SessionId,
        /// Stage of the run.
        category: ValidationCategory,
        /// Run number.
        run: u64,
        /// Run already applied.
        applied: u64,
    },
    /// The import push succeeded.
    SessionCompleted {
        /// Completed session.
        session_id: SessionId,
    },
    /// The user abandoned the session.
    SessionAbandoned {
        /// Abandoned session.
        session_id: SessionId,
    },
}

impl PipelineEvent {
    /// Session the event belongs to.
    pub fn session_id(&self) -> SessionId {
        match self {
            PipelineEvent::StageEntered { session_id, .. }
            | PipelineEvent::RunStarted { session_id, .. }
            | PipelineEvent::RunApplied { session_id, .. }
            | PipelineEvent::RunDiscarded { session_id, .. }
            | PipelineEvent::SessionCompleted { session_id }
            | PipelineEvent::SessionAbandoned { session_id } => *session_id,
        }
    }
}

/// Callback type for pipeline events.
pub type EventCallback = Box<dyn Fn(PipelineEvent) + Send + Sync>;

/// Delivers events to an optional callback and counts them.
#[derive(Default)]
pub struct EventSink {
    callback: Option<EventCallback>,
    emitted: AtomicU64,
}

impl EventSink {
    /// A sink that only counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that forwards to `callback`.
    pub fn with_callback(callback: EventCallback) -> Self {
        Self {
            callback: Some(callback),
            emitted: AtomicU64::new(0),
        }
    }

    /// Deliver an event.
    pub fn emit(&self, event: PipelineEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    /// Number of events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("has_callback", &self.callback.is_some())
            .field("emitted", &self.emitted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_callback_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::<PipelineEvent>::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            EventSink::with_callback(Box::new(move |event: PipelineEvent| seen.lock().push(event)))
        };
        let session_id = SessionId::new();

        sink.emit(PipelineEvent::SessionAbandoned { session_id });
        assert_eq!(sink.emitted(), 1);
        assert_eq!(seen.lock()[0].session_id(), session_id);
    }

    #[test]
    fn test_sink_without_callback_counts() {
        let sink = EventSink::new();
        sink.emit(PipelineEvent::SessionCompleted {
            session_id: SessionId::new(),
        });
        assert_eq!(sink.emitted(), 1);
    }
}
