//! Session progress and timing summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{minutes_between, Session, TaskStatus};
use super::phase::Phase;

/// Minutes spent in one phase, summed over every visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTime {
    pub phase: Phase,
    pub minutes: i64,
    /// How many times the phase was entered
    pub visits: usize,
}

/// Read-only summary of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_tasks: usize,
    pub pending: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Sum of `actual_minutes` over finished tasks
    pub actual_minutes: i64,
    /// Sum of caller estimates
    pub estimated_minutes: u64,
    /// Time per visited phase, in workflow order
    pub phases: Vec<PhaseTime>,
    /// Minutes since the current phase was entered
    pub current_phase_minutes: i64,
    /// Whether the current phase ran past its advisory budget
    pub over_budget: bool,
}

impl SessionStats {
    /// Summarize `session` as of `now`.
    ///
    /// For a finished session, time stops at `completed_at` (or
    /// `updated_at` when it was cancelled).
    pub fn from_session(session: &Session, now: DateTime<Utc>) -> Self {
        let count = |status: TaskStatus| session.tasks_with_status(status).count();

        let end = if session.status.is_terminal() {
            session.completed_at.unwrap_or(session.updated_at)
        } else {
            now
        };

        let mut phases: Vec<PhaseTime> = Vec::new();
        for (i, transition) in session.phase_history.iter().enumerate() {
            let left_at = session.phase_history.get(i + 1).map_or(end, |next| next.timestamp);
            let minutes = minutes_between(transition.timestamp, left_at).max(0);
            match phases.iter_mut().find(|p| p.phase == transition.to) {
                Some(entry) => {
                    entry.minutes += minutes;
                    entry.visits += 1;
                }
                None => phases.push(PhaseTime { phase: transition.to, minutes, visits: 1 }),
            }
        }
        phases.sort_by_key(|p| p.phase);

        let current_phase_minutes = minutes_between(session.phase_entered_at(), end).max(0);
        let budget = i64::from(session.current_phase.definition().max_duration_minutes);
        let over_budget =
            session.status.is_open() && budget > 0 && current_phase_minutes > budget;

        Self {
            total_tasks: session.tasks.len(),
            pending: count(TaskStatus::Pending),
            queued: count(TaskStatus::Queued),
            running: count(TaskStatus::Running),
            completed: count(TaskStatus::Completed),
            failed: count(TaskStatus::Failed),
            cancelled: count(TaskStatus::Cancelled),
            actual_minutes: session.tasks.iter().filter_map(|t| t.actual_minutes).sum(),
            estimated_minutes: session
                .tasks
                .iter()
                .filter_map(|t| t.estimated_minutes)
                .map(u64::from)
                .sum(),
            phases,
            current_phase_minutes,
            over_budget,
        }
    }

    /// Fraction of tasks completed, in `0.0..=1.0`.
    pub fn completion_ratio(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.completed as f64 / self.total_tasks as f64
        }
    }

    /// Minutes recorded for `phase`, zero if never visited.
    pub fn minutes_in(&self, phase: Phase) -> i64 {
        self.phases.iter().find(|p| p.phase == phase).map_or(0, |p| p.minutes)
    }
}
