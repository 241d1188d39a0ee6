//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Get the binary to test.
fn flowctl() -> Command {
    Command::cargo_bin("flowctl").unwrap()
}

/// Run the binary inside `dir` with its state file kept there.
fn flowctl_in(dir: &TempDir) -> Command {
    let mut cmd = flowctl();
    cmd.current_dir(dir.path())
        .env_remove("FLOWCTL_STATE_FILE")
        .arg("--state-file")
        .arg(dir.child("workflows.json").path());
    cmd
}

/// Create a session and return its ID.
fn create_session(dir: &TempDir, args: &[&str]) -> String {
    let output = flowctl_in(dir).args(["session", "create"]).args(args).output().unwrap();
    assert!(output.status.success(), "create failed: {output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let first = stdout.lines().next().unwrap();
    let start = first.rfind('(').unwrap() + 1;
    let end = first.rfind(')').unwrap();
    first[start..end].to_string()
}

fn add_task(dir: &TempDir, session: &str, title: &str) -> String {
    let output = flowctl_in(dir).args(["task", "add", session, title]).output().unwrap();
    assert!(output.status.success(), "task add failed: {output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let start = stdout.rfind('(').unwrap() + 1;
    let end = stdout.rfind(')').unwrap();
    stdout[start..end].to_string()
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    flowctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("development workflows through phases and tasks"));
}

#[test]
fn test_version_flag() {
    flowctl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_subcommand_fails() {
    flowctl().arg("launch").assert().failure();
}

// ============================================================================
// Session Command Tests
// ============================================================================

#[test]
fn test_session_list_empty() {
    let dir = TempDir::new().unwrap();

    flowctl_in(&dir)
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions found."));
    dir.child("workflows.json").assert(predicate::path::missing());
}

#[test]
fn test_session_create_and_list() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["auth rewrite", "--branch", "feat/auth"]);

    dir.child("workflows.json").assert(predicate::str::contains("\"version\": 1"));
    dir.child("workflows.json").assert(predicate::str::contains("feat/auth"));

    flowctl_in(&dir)
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("auth rewrite"))
        .stdout(predicate::str::contains(&id[..8]))
        .stdout(predicate::str::contains("Total: 1 sessions"));
}

#[test]
fn test_session_show_json() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["json check", "--meta", "owner=infra"]);

    let output = flowctl_in(&dir).args(["session", "show", &id, "--format", "json"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["id"], id.as_str());
    assert_eq!(value["currentPhase"], "brainstorming");
    assert_eq!(value["status"], "active");
    assert_eq!(value["metadata"]["owner"], "infra");
    assert_eq!(value["phaseHistory"][0]["triggeredBy"], "system");
}

#[test]
fn test_session_create_blank_name_fails() {
    let dir = TempDir::new().unwrap();

    flowctl_in(&dir).args(["session", "create", "  "]).assert().failure();
    dir.child("workflows.json").assert(predicate::path::missing());
}

#[test]
fn test_session_create_bad_metadata_fails() {
    let dir = TempDir::new().unwrap();

    flowctl_in(&dir)
        .args(["session", "create", "meta", "--meta", "no-equals"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key=value"));
}

#[test]
fn test_session_prefix_resolution() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["prefixed"]);

    flowctl_in(&dir)
        .args(["session", "pause", &id[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("prefixed is now paused"));
}

#[test]
fn test_session_lifecycle() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["lifecycle"]);

    flowctl_in(&dir).args(["session", "pause", &id]).assert().success();
    flowctl_in(&dir)
        .args(["session", "resume", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now active"));
    flowctl_in(&dir)
        .args(["session", "complete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now completed"));
    flowctl_in(&dir).args(["session", "cancel", &id]).assert().failure();

    flowctl_in(&dir)
        .args(["session", "list", "--active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions found."));
}

#[test]
fn test_session_fail_records_error() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["doomed"]);

    flowctl_in(&dir)
        .args(["session", "fail", &id, "--error", "ci is down"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Error: ci is down"));
}

#[test]
fn test_session_delete() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["short lived"]);

    flowctl_in(&dir)
        .args(["session", "delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted session"));
    flowctl_in(&dir).args(["session", "show", &id]).assert().failure();
}

#[test]
fn test_delete_unknown_session_fails() {
    let dir = TempDir::new().unwrap();

    flowctl_in(&dir)
        .args(["session", "delete", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found: nope"));
    dir.child("workflows.json").assert(predicate::path::missing());
}

// ============================================================================
// Phase Command Tests
// ============================================================================

#[test]
fn test_phase_list() {
    let dir = TempDir::new().unwrap();

    flowctl_in(&dir)
        .args(["phase", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("brainstorming"))
        .stdout(predicate::str::contains("finishing"))
        .stdout(predicate::str::contains("unlimited"));
}

#[test]
fn test_phase_move() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["mover"]);

    flowctl_in(&dir)
        .args(["phase", "move", &id, "plan", "--reason", "ideas settled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mover is now in planning"));
    dir.child("workflows.json").assert(predicate::str::contains("ideas settled"));
}

#[test]
fn test_invalid_phase_move_fails() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["skipper"]);

    flowctl_in(&dir)
        .args(["phase", "move", &id, "review"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not reachable from brainstorming"));
}

#[test]
fn test_unknown_phase_name_rejected() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["typo"]);

    flowctl_in(&dir).args(["phase", "move", &id, "shipping"]).assert().failure();
}

// ============================================================================
// Task Command Tests
// ============================================================================

#[test]
fn test_task_completion_auto_advances() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["builder", "--phase", "implementation"]);
    let task = add_task(&dir, &id, "write handler");

    flowctl_in(&dir).args(["task", "update", &id, &task, "running"]).assert().success();
    flowctl_in(&dir)
        .args(["task", "update", &id, &task, "done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now completed"))
        .stdout(predicate::str::contains("advanced builder to review"));
}

#[test]
fn test_auto_advance_disabled_by_local_config() {
    let dir = TempDir::new().unwrap();
    dir.child(".flowctl.toml").write_str("[workflow]\nauto_advance = false\n").unwrap();
    let id = create_session(&dir, &["manual", "--phase", "implementation"]);
    let task = add_task(&dir, &id, "only task");

    flowctl_in(&dir)
        .args(["task", "update", &id, &task, "completed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("advanced").not());

    flowctl_in(&dir)
        .args(["phase", "advance", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("advanced manual to review"));
}

#[test]
fn test_local_config_default_phase() {
    let dir = TempDir::new().unwrap();
    dir.child(".flowctl.toml").write_str("[workflow]\ndefault_phase = \"planning\"\n").unwrap();

    flowctl_in(&dir)
        .args(["session", "create", "planned"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase: planning"));
}

#[test]
fn test_task_failure_with_error() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["flaky"]);
    let task = add_task(&dir, &id, "run migration");

    flowctl_in(&dir)
        .args(["task", "update", &id, &task, "failed", "--error", "lock timeout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now failed"));
    flowctl_in(&dir)
        .args(["task", "update", &id, &task, "completed", "--error", "oops"])
        .assert()
        .failure();
}

#[test]
fn test_task_list_filters() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["lists"]);
    let first = add_task(&dir, &id, "first");
    add_task(&dir, &id, "second");

    flowctl_in(&dir).args(["task", "update", &id, &first, "running"]).assert().success();

    flowctl_in(&dir)
        .args(["task", "list", &id, "--running"])
        .assert()
        .success()
        .stdout(predicate::str::contains("first"))
        .stdout(predicate::str::contains("second").not());
    flowctl_in(&dir)
        .args(["task", "list", &id, "--pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains("second"));
}

#[test]
fn test_task_on_unknown_session_fails() {
    let dir = TempDir::new().unwrap();

    flowctl_in(&dir).args(["task", "add", "ghost", "anything"]).assert().failure();
}

// ============================================================================
// Stats & Misc Tests
// ============================================================================

#[test]
fn test_stats_json() {
    let dir = TempDir::new().unwrap();
    let id = create_session(&dir, &["measured"]);
    add_task(&dir, &id, "one");

    let output = flowctl_in(&dir).args(["stats", &id, "--format", "json"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["totalTasks"], 1);
    assert_eq!(value["pending"], 1);
    assert_eq!(value["phases"][0]["phase"], "brainstorming");
}

#[test]
fn test_corrupt_state_file_is_tolerated() {
    let dir = TempDir::new().unwrap();
    dir.child("workflows.json").write_str("not json at all").unwrap();

    flowctl_in(&dir)
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions found."));
}

#[test]
fn test_completions_bash() {
    flowctl()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flowctl"));
}
