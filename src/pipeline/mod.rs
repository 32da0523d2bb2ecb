//! Sessions, the stage state machine and orchestration.

pub mod events;
pub mod machine;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use events::{EventCallback, EventSink, PipelineEvent};
pub use machine::{derive_status, Route, RunTicket, StageMachine, SubmitOutcome};
pub use orchestrator::{ImportPipeline, PipelineBuilder};
pub use session::{Lifecycle, PipelineSession, Stage, StageRecord};
pub use store::{JsonFileSessionStore, MemorySessionStore, SessionDocument, SessionStore};
