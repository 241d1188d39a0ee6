//! Workflow phase tracking.
//!
//! Models development sessions moving through a fixed set of phases, each
//! holding tasks whose outcomes are reported from outside. Nothing here runs
//! the tasks themselves.
//!
//! ## Components
//!
//! - `Phase` - the static phase table and allowed transitions
//! - `Session` / `Task` / `PhaseTransition` - the persisted records
//! - `StateStore` - versioned JSON state file
//! - `EventBus` - synchronous lifecycle notifications
//! - `WorkflowEngine` - owns the sessions and applies every mutation
//! - `SessionStats` - progress and timing summaries

mod engine;
mod error;
mod events;
mod model;
mod phase;
mod stats;
mod store;
mod tasks;

pub use engine::{Clock, WorkflowEngine};
pub use error::{WorkflowError, WorkflowResult};
pub use events::{EventBus, EventKind, Listener, ListenerId, WorkflowEvent};
pub use model::{
    minutes_between, PhaseTransition, Session, SessionOptions, SessionStatus, Task, TaskDraft,
    TaskStatus, TriggeredBy,
};
pub use phase::{Phase, PhaseDefinition};
pub use stats::{PhaseTime, SessionStats};
pub use store::{PersistedState, StateStore, STATE_VERSION};
