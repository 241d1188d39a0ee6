//! Task tracking within a session.

use uuid::Uuid;

use super::engine::WorkflowEngine;
use super::error::{WorkflowError, WorkflowResult};
use super::events::WorkflowEvent;
use super::model::{Task, TaskDraft, TaskStatus};
use super::phase::Phase;

impl WorkflowEngine {
    /// Append a pending task to a session.
    pub fn add_task(&mut self, session_id: &str, draft: TaskDraft) -> WorkflowResult<&Task> {
        if draft.title.trim().is_empty() {
            return Err(WorkflowError::InvalidInput("task title must not be empty".to_string()));
        }

        let sidx = self.session_index(session_id)?;
        let now = self.now();
        let task = Task::from_draft(Uuid::new_v4().to_string(), draft, now);
        tracing::debug!(session = session_id, task = %task.id, phase = ?task.phase, "added task");

        let session = &mut self.sessions[sidx];
        session.tasks.push(task);
        session.updated_at = now;
        let tidx = session.tasks.len() - 1;

        let session = &self.sessions[sidx];
        self.events.emit(&WorkflowEvent::TaskCreated { session, task: &session.tasks[tidx] });
        self.persist();
        Ok(&self.sessions[sidx].tasks[tidx])
    }

    /// Record an externally reported task status.
    pub fn update_task_status(
        &mut self,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> WorkflowResult<&Task> {
        self.apply_task_status(session_id, task_id, status, None)
    }

    /// Mark a task as failed with an error message.
    pub fn fail_task(
        &mut self,
        session_id: &str,
        task_id: &str,
        error: impl Into<String>,
    ) -> WorkflowResult<&Task> {
        self.apply_task_status(session_id, task_id, TaskStatus::Failed, Some(error.into()))
    }

    fn apply_task_status(
        &mut self,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
        error: Option<String>,
    ) -> WorkflowResult<&Task> {
        let sidx = self.session_index(session_id)?;
        let tidx = self.sessions[sidx].tasks.iter().position(|t| t.id == task_id).ok_or_else(
            || WorkflowError::TaskNotFound {
                session_id: session_id.to_string(),
                task_id: task_id.to_string(),
            },
        )?;
        let now = self.now();

        let session = &mut self.sessions[sidx];
        let task = &mut session.tasks[tidx];
        let old = task.record_status(status, now);
        if status == TaskStatus::Failed && error.is_some() {
            task.error = error;
        }
        session.updated_at = now;
        tracing::debug!(
            session = session_id,
            task = task_id,
            %old,
            new = %status,
            "task status changed"
        );

        let session = &self.sessions[sidx];
        let task = &session.tasks[tidx];
        self.events.emit(&WorkflowEvent::TaskStatus { session, task, old, new: status });
        match status {
            TaskStatus::Completed => {
                self.events.emit(&WorkflowEvent::TaskCompleted { session, task });
            }
            TaskStatus::Failed => {
                let error = task.error.as_deref();
                self.events.emit(&WorkflowEvent::TaskFailed { session, task, error });
            }
            _ => {}
        }
        self.persist();
        Ok(&self.sessions[sidx].tasks[tidx])
    }

    /// Tasks tagged to `phase`.
    pub fn tasks_for_phase(&self, session_id: &str, phase: Phase) -> WorkflowResult<Vec<&Task>> {
        let session = &self.sessions[self.session_index(session_id)?];
        Ok(session.tasks_in_phase(phase).collect())
    }

    /// Tasks not yet picked up.
    pub fn pending_tasks(&self, session_id: &str) -> WorkflowResult<Vec<&Task>> {
        let session = &self.sessions[self.session_index(session_id)?];
        Ok(session.tasks_with_status(TaskStatus::Pending).collect())
    }

    /// Tasks currently being worked on.
    pub fn running_tasks(&self, session_id: &str) -> WorkflowResult<Vec<&Task>> {
        let session = &self.sessions[self.session_index(session_id)?];
        Ok(session.tasks_with_status(TaskStatus::Running).collect())
    }
}
