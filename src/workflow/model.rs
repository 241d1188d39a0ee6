//! Session, task, and transition records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Work is ongoing
    #[default]
    Active,
    /// Temporarily on hold
    Paused,
    /// Finished successfully
    Completed,
    /// Aborted with an error
    Failed,
    /// Abandoned by the user
    Cancelled,
}

impl SessionStatus {
    /// Check if no further status change is permitted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if the session still shows up in the active list.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Recorded, not scheduled
    #[default]
    Pending,
    /// Waiting for an executor
    Queued,
    /// Being worked on
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Abandoned
    Cancelled,
}

impl TaskStatus {
    /// Check if the task has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "running" | "in-progress" => Ok(Self::Running),
            "completed" | "done" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// Who caused a phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredBy {
    /// The engine itself (session creation, auto-advance)
    System,
    /// An explicit caller request
    User,
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::User => "user",
        })
    }
}

/// One entry of a session's phase history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    /// Previous phase; `None` only for the entry written at creation
    pub from: Option<Phase>,
    /// Phase entered
    pub to: Phase,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    /// Free-form reason
    pub reason: String,
    /// Who triggered it
    pub triggered_by: TriggeredBy,
}

/// A unit of work inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task ID
    pub id: String,
    /// Short title
    pub title: String,
    /// Longer description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Phase this task belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Skill expected to carry out the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    /// Current status
    pub status: TaskStatus,
    /// Caller estimate in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    /// Minutes between start and completion, derived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_minutes: Option<i64>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task from a draft.
    pub fn from_draft(id: String, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            phase: draft.phase,
            skill: draft.skill,
            status: TaskStatus::Pending,
            estimated_minutes: draft.estimated_minutes,
            actual_minutes: None,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a status change at `now`, returning the previous status.
    ///
    /// `started_at` is only written the first time the task runs, and
    /// `completed_at`/`actual_minutes` only the first time it finishes.
    pub fn record_status(&mut self, status: TaskStatus, now: DateTime<Utc>) -> TaskStatus {
        let old = self.status;
        self.status = status;

        if status == TaskStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }

        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
            self.actual_minutes = self.started_at.map(|started| minutes_between(started, now));
        }

        old
    }

    /// Check if the task is tagged to `phase`.
    pub fn belongs_to(&self, phase: Phase) -> bool {
        self.phase == Some(phase)
    }
}

/// Rounded minutes from `start` to `end`.
///
/// Halves round toward positive infinity, so -0.5 minutes is 0.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds();
    (millis as f64 / 60_000.0 + 0.5).floor() as i64
}

/// Caller-supplied fields for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub phase: Option<Phase>,
    pub skill: Option<String>,
    pub estimated_minutes: Option<u32>,
}

impl TaskDraft {
    /// Create a draft with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    /// Tag the task to a phase.
    pub fn in_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }

    pub fn with_estimate(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }
}

/// A tracked workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Phase the session is in
    pub current_phase: Phase,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Git branch the work happens on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Skills enabled for the session
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    /// Caller-defined key/value pairs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Tasks in insertion order
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Append-only phase history
    pub phase_history: Vec<PhaseTransition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Session {
    /// Create an active session with its synthetic first transition.
    pub fn new(id: String, name: String, options: SessionOptions, now: DateTime<Utc>) -> Self {
        let phase = options.initial_phase.unwrap_or_default();
        Self {
            id,
            name,
            description: options.description,
            current_phase: phase,
            status: SessionStatus::Active,
            branch: options.branch,
            skills: options.skills,
            metadata: options.metadata,
            tasks: Vec::new(),
            phase_history: vec![PhaseTransition {
                from: None,
                to: phase,
                timestamp: now,
                reason: "Session created".to_string(),
                triggered_by: TriggeredBy::System,
            }],
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
        }
    }

    /// Get a task by ID.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Tasks tagged to `phase`, in insertion order.
    pub fn tasks_in_phase(&self, phase: Phase) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.belongs_to(phase))
    }

    /// Tasks with the given status, in insertion order.
    pub fn tasks_with_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status == status)
    }

    /// The most recent transition.
    pub fn last_transition(&self) -> Option<&PhaseTransition> {
        self.phase_history.last()
    }

    /// When the current phase was entered.
    pub fn phase_entered_at(&self) -> DateTime<Utc> {
        self.last_transition().map(|t| t.timestamp).unwrap_or(self.created_at)
    }
}

/// Optional fields for a new session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub description: Option<String>,
    /// Defaults to brainstorming
    pub initial_phase: Option<Phase>,
    pub branch: Option<String>,
    pub skills: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Start the session in `phase` instead of brainstorming.
    pub fn starting_at(mut self, phase: Phase) -> Self {
        self.initial_phase = Some(phase);
        self
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
