//! Synchronous workflow event dispatch.
//!
//! The engine publishes an event after each successful mutation. Listeners
//! run in registration order on the caller's thread, before the mutating
//! call returns. A listener that returns an error or panics is logged and
//! skipped; the remaining listeners still run.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use super::model::{PhaseTransition, Session, SessionStatus, Task, TaskStatus};

/// Name of a workflow event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionCreated,
    SessionStatus,
    SessionDeleted,
    PhaseChanged,
    TaskCreated,
    TaskStatus,
    TaskCompleted,
    TaskFailed,
    WorkflowCompleted,
    WorkflowFailed,
}

impl EventKind {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionCreated => "session:created",
            Self::SessionStatus => "session:status",
            Self::SessionDeleted => "session:deleted",
            Self::PhaseChanged => "phase:changed",
            Self::TaskCreated => "task:created",
            Self::TaskStatus => "task:status",
            Self::TaskCompleted => "task:completed",
            Self::TaskFailed => "task:failed",
            Self::WorkflowCompleted => "workflow:completed",
            Self::WorkflowFailed => "workflow:failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event published by the engine, borrowing the affected records.
#[derive(Debug, Clone, Copy)]
pub enum WorkflowEvent<'a> {
    SessionCreated { session: &'a Session },
    SessionStatus { session: &'a Session, old: SessionStatus, new: SessionStatus },
    SessionDeleted { session: &'a Session },
    PhaseChanged { session: &'a Session, transition: &'a PhaseTransition },
    TaskCreated { session: &'a Session, task: &'a Task },
    TaskStatus { session: &'a Session, task: &'a Task, old: TaskStatus, new: TaskStatus },
    TaskCompleted { session: &'a Session, task: &'a Task },
    TaskFailed { session: &'a Session, task: &'a Task, error: Option<&'a str> },
    WorkflowCompleted { session: &'a Session },
    WorkflowFailed { session: &'a Session, error: &'a str },
}

impl<'a> WorkflowEvent<'a> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SessionCreated { .. } => EventKind::SessionCreated,
            Self::SessionStatus { .. } => EventKind::SessionStatus,
            Self::SessionDeleted { .. } => EventKind::SessionDeleted,
            Self::PhaseChanged { .. } => EventKind::PhaseChanged,
            Self::TaskCreated { .. } => EventKind::TaskCreated,
            Self::TaskStatus { .. } => EventKind::TaskStatus,
            Self::TaskCompleted { .. } => EventKind::TaskCompleted,
            Self::TaskFailed { .. } => EventKind::TaskFailed,
            Self::WorkflowCompleted { .. } => EventKind::WorkflowCompleted,
            Self::WorkflowFailed { .. } => EventKind::WorkflowFailed,
        }
    }

    /// The session the event is about.
    pub fn session(&self) -> &'a Session {
        match *self {
            Self::SessionCreated { session }
            | Self::SessionStatus { session, .. }
            | Self::SessionDeleted { session }
            | Self::PhaseChanged { session, .. }
            | Self::TaskCreated { session, .. }
            | Self::TaskStatus { session, .. }
            | Self::TaskCompleted { session, .. }
            | Self::TaskFailed { session, .. }
            | Self::WorkflowCompleted { session }
            | Self::WorkflowFailed { session, .. } => session,
        }
    }
}

/// Callback invoked for each matching event.
pub type Listener = Box<dyn Fn(&WorkflowEvent<'_>) -> anyhow::Result<()>>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    /// `None` matches every event
    kind: Option<EventKind>,
    listener: Listener,
}

/// In-process publish/subscribe channel for workflow events.
#[derive(Default)]
pub struct EventBus {
    registrations: Vec<Registration>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("listener_count", &self.registrations.len()).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind.
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WorkflowEvent<'_>) -> anyhow::Result<()> + 'static,
    {
        self.register(Some(kind), Box::new(listener))
    }

    /// Register a listener for every event.
    pub fn subscribe_all<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&WorkflowEvent<'_>) -> anyhow::Result<()> + 'static,
    {
        self.register(None, Box::new(listener))
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.registrations.len()
    }

    /// Deliver an event to every matching listener, in registration order.
    pub fn emit(&self, event: &WorkflowEvent<'_>) {
        let kind = event.kind();
        for registration in &self.registrations {
            if registration.kind.is_some_and(|k| k != kind) {
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (registration.listener)(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = %kind, error = %e, "workflow event listener failed");
                }
                Err(_) => {
                    tracing::warn!(event = %kind, "workflow event listener panicked");
                }
            }
        }
    }

    fn register(&mut self, kind: Option<EventKind>, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.registrations.push(Registration { id, kind, listener });
        id
    }
}
