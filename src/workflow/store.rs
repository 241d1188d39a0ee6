//! State file persistence.
//!
//! The whole session set is written to a single JSON file on every save.
//! Writes are not atomic: a crash mid-write can leave a truncated file,
//! which the next load reports as an error.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{WorkflowError, WorkflowResult};
use super::model::Session;

/// Current state file format version.
pub const STATE_VERSION: u32 = 1;

/// On-disk envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Format version for future migrations
    pub version: u32,
    /// Sessions in insertion order
    pub sessions: Vec<Session>,
    /// When the file was written
    pub last_updated: DateTime<Utc>,
}

/// Borrowed form of [`PersistedState`] used when writing.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateRef<'a> {
    version: u32,
    sessions: &'a [Session],
    last_updated: DateTime<Utc>,
}

/// Reads and writes the workflow state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    /// Path to the state file
    path: PathBuf,
}

impl StateStore {
    /// Create a store for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the default state file path.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("flowctl").join("workflows.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all sessions to the state file, stamped with `now`.
    pub fn save(&self, sessions: &[Session], now: DateTime<Utc>) -> WorkflowResult<()> {
        let state = StateRef { version: STATE_VERSION, sessions, last_updated: now };
        let content = serde_json::to_string_pretty(&state)?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    WorkflowError::Persistence(format!(
                        "failed to create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        fs::write(&self.path, content).map_err(|e| {
            WorkflowError::Persistence(format!("failed to write {}: {e}", self.path.display()))
        })?;
        Ok(())
    }

    /// Load sessions from the state file.
    ///
    /// A missing file yields an empty set. A file written by another format
    /// version is loaded as-is; no migration is performed.
    pub fn load(&self) -> WorkflowResult<Vec<Session>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            WorkflowError::Persistence(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let state: PersistedState = serde_json::from_str(&content).map_err(|e| {
            WorkflowError::Persistence(format!("failed to parse {}: {e}", self.path.display()))
        })?;

        if state.version != STATE_VERSION {
            tracing::warn!(
                path = %self.path.display(),
                found = state.version,
                expected = STATE_VERSION,
                "state file version mismatch, loading without migration"
            );
        }

        Ok(state.sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::{SessionOptions, TaskDraft, TaskStatus, Task};
    use crate::workflow::phase::Phase;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn sample_sessions() -> Vec<Session> {
        let now = Utc::now();
        let mut first = Session::new(
            "s1".to_string(),
            "auth refactor".to_string(),
            SessionOptions::new()
                .with_description("split the token service")
                .on_branch("feat/auth")
                .with_skill("tdd")
                .with_metadata("ticket", "ENG-42"),
            now,
        );
        let mut task = Task::from_draft(
            "t1".to_string(),
            TaskDraft::new("extract trait").in_phase(Phase::Brainstorming).with_estimate(20),
            now,
        );
        task.record_status(TaskStatus::Running, now + Duration::milliseconds(1_234));
        task.record_status(TaskStatus::Completed, now + Duration::minutes(7));
        first.tasks.push(task);

        let second =
            Session::new("s2".to_string(), "docs".to_string(), SessionOptions::new(), now);
        vec![first, second]
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nope.json"));

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("workflows.json"));
        let sessions = sample_sessions();

        store.save(&sessions, Utc::now()).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, sessions);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("state.json");
        let store = StateStore::new(&path);

        store.save(&[], Utc::now()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_envelope_fields() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let sessions = sample_sessions();
        let written_at = Utc.with_ymd_and_hms(2025, 3, 14, 16, 45, 0).unwrap();
        store.save(&sessions, written_at).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(json["version"], STATE_VERSION);
        assert_eq!(json["sessions"].as_array().unwrap().len(), 2);
        assert_eq!(json["sessions"][0]["tasks"][0]["actualMinutes"], 7);

        let state: PersistedState = serde_json::from_str(&raw).unwrap();
        assert_eq!(state.last_updated, written_at);
        assert_eq!(state.sessions, sessions);
    }

    #[test]
    fn test_corrupt_file_is_persistence_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = StateStore::new(&path).load().unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_version_mismatch_loads_as_is() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = PersistedState {
            version: STATE_VERSION + 1,
            sessions: sample_sessions(),
            last_updated: Utc::now(),
        };
        fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        let loaded = StateStore::new(&path).load().unwrap();
        assert_eq!(loaded, state.sessions);
    }
}
