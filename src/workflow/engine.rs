//! Workflow engine.
//!
//! Owns the session collection, validates phase and status transitions,
//! publishes events, and saves the full state after every mutation.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};
use super::events::{EventBus, WorkflowEvent};
use super::model::{PhaseTransition, Session, SessionOptions, SessionStatus, TaskStatus, TriggeredBy};
use super::phase::Phase;
use super::stats::SessionStats;
use super::store::StateStore;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc>,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Tracks workflow sessions through their phases.
pub struct WorkflowEngine {
    /// Sessions in insertion order
    pub(super) sessions: Vec<Session>,
    /// Where state is saved
    store: StateStore,
    /// Event dispatch
    pub(super) events: EventBus,
    clock: Box<dyn Clock>,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("session_count", &self.sessions.len())
            .field("store", &self.store)
            .field("events", &self.events)
            .finish()
    }
}

impl WorkflowEngine {
    /// Create an engine, loading any sessions already saved in `store`.
    ///
    /// An unreadable state file is logged and the engine starts empty.
    pub fn new(store: StateStore) -> Self {
        let sessions = match store.load() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::error!(
                    path = %store.path().display(),
                    error = %e,
                    "failed to load workflow state, starting empty"
                );
                Vec::new()
            }
        };
        tracing::debug!(count = sessions.len(), "loaded workflow sessions");

        Self { sessions, store, events: EventBus::new(), clock: Box::new(Utc::now) }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Access the event bus to add or remove listeners.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    // --- Sessions ---

    /// Create and store a new active session.
    pub fn create_session(
        &mut self,
        name: &str,
        options: SessionOptions,
    ) -> WorkflowResult<&Session> {
        if name.trim().is_empty() {
            return Err(WorkflowError::InvalidInput("session name must not be empty".to_string()));
        }

        let session = Session::new(Uuid::new_v4().to_string(), name.to_string(), options, self.now());
        tracing::debug!(id = %session.id, phase = %session.current_phase, "created session");
        self.sessions.push(session);

        let idx = self.sessions.len() - 1;
        self.events.emit(&WorkflowEvent::SessionCreated { session: &self.sessions[idx] });
        self.persist();
        Ok(&self.sessions[idx])
    }

    /// Get a session by ID.
    pub fn get_session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// All sessions in insertion order.
    pub fn list_sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Sessions that are active or paused.
    pub fn list_active(&self) -> Vec<&Session> {
        self.sessions.iter().filter(|s| s.status.is_open()).collect()
    }

    /// Rename a session or change its description.
    pub fn update_session(
        &mut self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> WorkflowResult<&Session> {
        if name.is_some_and(|n| n.trim().is_empty()) {
            return Err(WorkflowError::InvalidInput("session name must not be empty".to_string()));
        }

        let idx = self.session_index(id)?;
        let now = self.now();
        let session = &mut self.sessions[idx];
        if let Some(name) = name {
            session.name = name.to_string();
        }
        if let Some(description) = description {
            session.description = Some(description.to_string());
        }
        session.updated_at = now;

        self.persist();
        Ok(&self.sessions[idx])
    }

    /// Remove a session and its tasks.
    ///
    /// Returns false, without touching the state file, if the ID is unknown.
    pub fn delete_session(&mut self, id: &str) -> bool {
        let Some(idx) = self.sessions.iter().position(|s| s.id == id) else {
            return false;
        };

        let removed = self.sessions.remove(idx);
        tracing::debug!(id = %removed.id, "deleted session");
        self.events.emit(&WorkflowEvent::SessionDeleted { session: &removed });
        self.persist();
        true
    }

    // --- Phases ---

    /// Move a session to `target` on behalf of the user.
    pub fn transition_to(
        &mut self,
        id: &str,
        target: Phase,
        reason: Option<&str>,
    ) -> WorkflowResult<&Session> {
        let reason = reason.map_or_else(|| format!("Moved to {target}"), str::to_string);
        self.apply_transition(id, target, reason, TriggeredBy::User)
    }

    /// Check whether `transition_to` would succeed.
    pub fn can_transition_to(&self, id: &str, target: Phase) -> bool {
        self.check_transition(id, target).is_ok()
    }

    /// Advance to the next phase if the current one is done.
    ///
    /// Nothing happens when the phase needs confirmation, when no task is
    /// tagged to it, or when any of its tasks is not completed.
    pub fn auto_advance(&mut self, id: &str) -> WorkflowResult<Option<&Session>> {
        let Some(session) = self.get_session(id) else {
            return Ok(None);
        };
        if session.status != SessionStatus::Active {
            return Ok(None);
        }

        let phase = session.current_phase;
        if phase.requires_confirmation() {
            tracing::debug!(id, %phase, "phase requires confirmation, not advancing");
            return Ok(None);
        }

        let (tagged, done) = {
            let mut tasks = session.tasks_in_phase(phase).peekable();
            let tagged = tasks.peek().is_some();
            (tagged, tagged && tasks.all(|t| t.status == TaskStatus::Completed))
        };
        if !tagged {
            tracing::debug!(id, %phase, "no tasks in phase, not advancing");
            return Ok(None);
        }
        if !done {
            return Ok(None);
        }

        let Some(next) = phase.default_next() else {
            return Ok(None);
        };

        let reason = format!("All {phase} tasks completed");
        self.apply_transition(id, next, reason, TriggeredBy::System).map(Some)
    }

    fn check_transition(&self, id: &str, target: Phase) -> WorkflowResult<usize> {
        let reject = |reason: String| WorkflowError::InvalidTransition {
            session_id: id.to_string(),
            to: target,
            reason,
        };

        let idx = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| reject("session not found".to_string()))?;
        let session = &self.sessions[idx];

        if session.status != SessionStatus::Active {
            return Err(reject(format!("session is {}", session.status)));
        }
        if !session.current_phase.can_transition_to(target) {
            return Err(reject(format!("not reachable from {}", session.current_phase)));
        }

        Ok(idx)
    }

    fn apply_transition(
        &mut self,
        id: &str,
        target: Phase,
        reason: String,
        triggered_by: TriggeredBy,
    ) -> WorkflowResult<&Session> {
        let idx = self.check_transition(id, target)?;
        let now = self.now();

        let session = &mut self.sessions[idx];
        let from = session.current_phase;
        session.current_phase = target;
        session.phase_history.push(PhaseTransition {
            from: Some(from),
            to: target,
            timestamp: now,
            reason,
            triggered_by,
        });
        session.updated_at = now;
        tracing::debug!(id, %from, to = %target, %triggered_by, "phase changed");

        let session = &self.sessions[idx];
        if let Some(transition) = session.last_transition() {
            self.events.emit(&WorkflowEvent::PhaseChanged { session, transition });
        }
        self.persist();
        Ok(&self.sessions[idx])
    }

    // --- Session status ---

    /// Put an active session on hold.
    pub fn pause_session(&mut self, id: &str) -> WorkflowResult<&Session> {
        self.change_status(id, "pause", SessionStatus::Paused, None)
    }

    /// Resume a paused session.
    pub fn resume_session(&mut self, id: &str) -> WorkflowResult<&Session> {
        self.change_status(id, "resume", SessionStatus::Active, None)
    }

    /// Mark an active session as completed.
    pub fn complete_session(&mut self, id: &str) -> WorkflowResult<&Session> {
        self.change_status(id, "complete", SessionStatus::Completed, None)
    }

    /// Mark a session as failed with an error message.
    pub fn fail_session(&mut self, id: &str, error: impl Into<String>) -> WorkflowResult<&Session> {
        self.change_status(id, "fail", SessionStatus::Failed, Some(error.into()))
    }

    /// Cancel a session that has not already finished.
    pub fn cancel_session(&mut self, id: &str) -> WorkflowResult<&Session> {
        self.change_status(id, "cancel", SessionStatus::Cancelled, None)
    }

    fn change_status(
        &mut self,
        id: &str,
        operation: &'static str,
        new: SessionStatus,
        error: Option<String>,
    ) -> WorkflowResult<&Session> {
        let idx = self.session_index(id)?;
        let now = self.now();
        let session = &mut self.sessions[idx];
        let old = session.status;

        let allowed = match new {
            SessionStatus::Paused | SessionStatus::Completed => old == SessionStatus::Active,
            SessionStatus::Active => old == SessionStatus::Paused,
            SessionStatus::Failed | SessionStatus::Cancelled => !old.is_terminal(),
        };
        if !allowed {
            return Err(WorkflowError::InvalidStateTransition {
                session_id: id.to_string(),
                operation,
                status: old,
            });
        }

        session.status = new;
        session.updated_at = now;
        if matches!(new, SessionStatus::Completed | SessionStatus::Failed) {
            session.completed_at = Some(now);
        }
        if error.is_some() {
            session.error = error;
        }
        tracing::debug!(id, %old, %new, "session status changed");

        let session = &self.sessions[idx];
        self.events.emit(&WorkflowEvent::SessionStatus { session, old, new });
        match new {
            SessionStatus::Completed => {
                self.events.emit(&WorkflowEvent::WorkflowCompleted { session });
            }
            SessionStatus::Failed => {
                let error = session.error.as_deref().unwrap_or_default();
                self.events.emit(&WorkflowEvent::WorkflowFailed { session, error });
            }
            _ => {}
        }
        self.persist();
        Ok(&self.sessions[idx])
    }

    // --- Queries ---

    /// Progress and timing summary for a session.
    pub fn session_stats(&self, id: &str) -> WorkflowResult<SessionStats> {
        let session =
            self.get_session(id).ok_or_else(|| WorkflowError::SessionNotFound(id.to_string()))?;
        Ok(SessionStats::from_session(session, self.now()))
    }

    // --- Internals shared with the task tracker ---

    pub(super) fn session_index(&self, id: &str) -> WorkflowResult<usize> {
        self.sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| WorkflowError::SessionNotFound(id.to_string()))
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Save the full state. Failures are logged, not returned.
    pub(super) fn persist(&self) {
        if let Err(e) = self.store.save(&self.sessions, self.now()) {
            tracing::error!(
                path = %self.store.path().display(),
                error = %e,
                "failed to save workflow state, continuing in memory"
            );
        }
    }
}
