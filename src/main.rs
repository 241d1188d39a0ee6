//! flowctl - track AI-assisted development workflows from the terminal.
//!
//! Sessions move through brainstorming, planning, implementation, review,
//! and finishing. Task outcomes are reported here; flowctl records them and
//! advances phases when the rules allow it.

#![allow(clippy::single_match_else)]

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flowctl::core::Config;
use flowctl::workflow::{
    Phase, Session, SessionOptions, SessionStats, StateStore, Task, TaskDraft, TaskStatus,
    WorkflowEngine, WorkflowEvent,
};

/// Track development workflow phases and tasks
#[derive(Parser)]
#[command(name = "flowctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path of the workflow state file
    #[arg(long, global = true, env = "FLOWCTL_STATE_FILE")]
    state_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage workflow sessions
    Session {
        /// Session operation
        #[command(subcommand)]
        operation: SessionOperation,
    },

    /// Inspect and move between phases
    Phase {
        /// Phase operation
        #[command(subcommand)]
        operation: PhaseOperation,
    },

    /// Manage tasks within a session
    Task {
        /// Task operation
        #[command(subcommand)]
        operation: TaskOperation,
    },

    /// Show progress and timing for a session
    Stats {
        /// Session ID (or unique prefix)
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Session operations.
#[derive(Subcommand)]
enum SessionOperation {
    /// Start a new session
    Create {
        /// Session name
        name: String,

        /// Short description
        #[arg(short, long)]
        description: Option<String>,

        /// Phase to start in (defaults to the configured default phase)
        #[arg(short, long)]
        phase: Option<Phase>,

        /// Git branch for the work
        #[arg(short, long)]
        branch: Option<String>,

        /// Skill to enable (repeatable)
        #[arg(short, long = "skill")]
        skills: Vec<String>,

        /// Metadata entry as key=value (repeatable)
        #[arg(short, long = "meta")]
        meta: Vec<String>,
    },

    /// List sessions
    List {
        /// Only show active and paused sessions
        #[arg(short, long)]
        active: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one session
    Show {
        /// Session ID (or unique prefix)
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Change a session's name or description
    Rename {
        /// Session ID (or unique prefix)
        id: String,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Pause an active session
    Pause {
        /// Session ID (or unique prefix)
        id: String,
    },

    /// Resume a paused session
    Resume {
        /// Session ID (or unique prefix)
        id: String,
    },

    /// Mark a session as completed
    Complete {
        /// Session ID (or unique prefix)
        id: String,
    },

    /// Mark a session as failed
    Fail {
        /// Session ID (or unique prefix)
        id: String,

        /// What went wrong
        #[arg(short, long)]
        error: String,
    },

    /// Cancel a session
    Cancel {
        /// Session ID (or unique prefix)
        id: String,
    },

    /// Delete a session and its tasks
    Delete {
        /// Session ID (or unique prefix)
        id: String,
    },
}

/// Phase operations.
#[derive(Subcommand)]
enum PhaseOperation {
    /// Show the phase table
    List,

    /// Move a session to another phase
    Move {
        /// Session ID (or unique prefix)
        id: String,

        /// Target phase
        phase: Phase,

        /// Why the move happens
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Advance a session if its current phase is done
    Advance {
        /// Session ID (or unique prefix)
        id: String,
    },
}

/// Task operations.
#[derive(Subcommand)]
enum TaskOperation {
    /// Add a task to a session
    Add {
        /// Session ID (or unique prefix)
        session: String,

        /// Task title
        title: String,

        /// Phase the task belongs to (defaults to the session's current phase)
        #[arg(short, long)]
        phase: Option<Phase>,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Skill expected to handle the task
        #[arg(short, long)]
        skill: Option<String>,

        /// Estimated minutes
        #[arg(short, long)]
        estimate: Option<u32>,
    },

    /// Report a task status
    Update {
        /// Session ID (or unique prefix)
        session: String,

        /// Task ID (or unique prefix)
        task: String,

        /// New status (pending, queued, running, completed, failed, cancelled)
        status: TaskStatus,

        /// Error message for a failed task
        #[arg(short, long)]
        error: Option<String>,
    },

    /// List tasks in a session
    List {
        /// Session ID (or unique prefix)
        session: String,

        /// Only tasks in this phase
        #[arg(short, long)]
        phase: Option<Phase>,

        /// Only pending tasks
        #[arg(long, conflicts_with = "running")]
        pending: bool,

        /// Only running tasks
        #[arg(long)]
        running: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    let state_file = cli.state_file.as_deref();
    match cli.command {
        Commands::Session { operation } => {
            let (config, mut engine) = open_engine(state_file)?;
            cmd_session(&mut engine, &config, operation)
        }
        Commands::Phase { operation } => {
            let (_, mut engine) = open_engine(state_file)?;
            cmd_phase(&mut engine, operation)
        }
        Commands::Task { operation } => {
            let (config, mut engine) = open_engine(state_file)?;
            cmd_task(&mut engine, &config, operation)
        }
        Commands::Stats { id, format } => {
            let (_, engine) = open_engine(state_file)?;
            cmd_stats(&engine, &id, &format)
        }
        Commands::Config { path } => cmd_config(path),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

/// Load configuration and build the engine for this invocation.
fn open_engine(state_file: Option<&Path>) -> Result<(Config, WorkflowEngine)> {
    let config = Config::load()?;
    let path = config.state_file(state_file)?;
    let mut engine = WorkflowEngine::new(StateStore::new(path));
    engine.events_mut().subscribe_all(log_event);
    Ok((config, engine))
}

/// Log every workflow event.
fn log_event(event: &WorkflowEvent<'_>) -> Result<()> {
    let session = event.session();
    tracing::info!(
        event = %event.kind(),
        session = %session.id,
        phase = %session.current_phase,
        status = %session.status,
        "workflow event"
    );
    Ok(())
}

/// Handle session commands.
fn cmd_session(
    engine: &mut WorkflowEngine,
    config: &Config,
    operation: SessionOperation,
) -> Result<()> {
    match operation {
        SessionOperation::Create { name, description, phase, branch, skills, meta } => {
            let options = SessionOptions {
                description,
                initial_phase: Some(phase.unwrap_or(config.workflow.default_phase)),
                branch,
                skills,
                metadata: parse_metadata(&meta)?,
            };
            let session = engine.create_session(&name, options)?;
            println!("Created session {} ({})", session.name, session.id);
            println!("  Phase: {}", session.current_phase);
        }

        SessionOperation::List { active, format } => {
            let sessions: Vec<&Session> = if active {
                engine.list_active()
            } else {
                engine.list_sessions().iter().collect()
            };

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&sessions)?),
                _ => {
                    if sessions.is_empty() {
                        println!("No sessions found.");
                        return Ok(());
                    }
                    for session in &sessions {
                        println!(
                            "{}  {:<10} {:<15} {} ({} tasks)",
                            short_id(&session.id),
                            session.status,
                            session.current_phase,
                            session.name,
                            session.tasks.len()
                        );
                    }
                    println!("\nTotal: {} sessions", sessions.len());
                }
            }
        }

        SessionOperation::Show { id, format } => {
            let id = resolve_session(engine, &id);
            let session = engine
                .get_session(&id)
                .with_context(|| format!("Session not found: {id}"))?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(session)?),
                _ => print_session(session),
            }
        }

        SessionOperation::Rename { id, name, description } => {
            if name.is_none() && description.is_none() {
                anyhow::bail!("Nothing to change: pass --name and/or --description");
            }
            let id = resolve_session(engine, &id);
            let session = engine.update_session(&id, name.as_deref(), description.as_deref())?;
            println!("Updated session {}", session.name);
        }

        SessionOperation::Pause { id } => {
            let id = resolve_session(engine, &id);
            print_status(engine.pause_session(&id)?);
        }

        SessionOperation::Resume { id } => {
            let id = resolve_session(engine, &id);
            print_status(engine.resume_session(&id)?);
        }

        SessionOperation::Complete { id } => {
            let id = resolve_session(engine, &id);
            print_status(engine.complete_session(&id)?);
        }

        SessionOperation::Fail { id, error } => {
            let id = resolve_session(engine, &id);
            print_status(engine.fail_session(&id, error)?);
        }

        SessionOperation::Cancel { id } => {
            let id = resolve_session(engine, &id);
            print_status(engine.cancel_session(&id)?);
        }

        SessionOperation::Delete { id } => {
            let id = resolve_session(engine, &id);
            if !engine.delete_session(&id) {
                anyhow::bail!("Session not found: {id}");
            }
            println!("Deleted session {id}");
        }
    }

    Ok(())
}

/// Handle phase commands.
fn cmd_phase(engine: &mut WorkflowEngine, operation: PhaseOperation) -> Result<()> {
    match operation {
        PhaseOperation::List => {
            for phase in Phase::ALL {
                let def = phase.definition();
                let next: Vec<&str> = def.allowed_transitions.iter().map(|p| p.as_str()).collect();
                let budget = if def.max_duration_minutes == 0 {
                    "unlimited".to_string()
                } else {
                    format!("{}m", def.max_duration_minutes)
                };
                println!("{:<15} {}", phase, def.description);
                println!(
                    "{:<15} next: {}  confirm: {}  budget: {}",
                    "",
                    if next.is_empty() { "-".to_string() } else { next.join(", ") },
                    if def.requires_confirmation { "yes" } else { "no" },
                    budget
                );
            }
        }

        PhaseOperation::Move { id, phase, reason } => {
            let id = resolve_session(engine, &id);
            let session = engine.transition_to(&id, phase, reason.as_deref())?;
            println!("{} is now in {}", session.name, session.current_phase);
            print_skills(session.current_phase);
        }

        PhaseOperation::Advance { id } => {
            let id = resolve_session(engine, &id);
            if engine.get_session(&id).is_none() {
                anyhow::bail!("Session not found: {id}");
            }
            try_advance(engine, &id)?;
        }
    }

    Ok(())
}

/// Handle task commands.
fn cmd_task(engine: &mut WorkflowEngine, config: &Config, operation: TaskOperation) -> Result<()> {
    match operation {
        TaskOperation::Add { session, title, phase, description, skill, estimate } => {
            let session_id = resolve_session(engine, &session);
            let current = engine
                .get_session(&session_id)
                .map(|s| s.current_phase)
                .with_context(|| format!("Session not found: {session_id}"))?;

            let draft = TaskDraft {
                title,
                description,
                phase: Some(phase.unwrap_or(current)),
                skill,
                estimated_minutes: estimate,
            };
            let task = engine.add_task(&session_id, draft)?;
            println!("Added task {} ({})", task.title, task.id);
        }

        TaskOperation::Update { session, task, status, error } => {
            let session_id = resolve_session(engine, &session);
            let task_id = resolve_task(engine, &session_id, &task);

            let task = match (status, error) {
                (TaskStatus::Failed, Some(error)) => engine.fail_task(&session_id, &task_id, error)?,
                (_, Some(_)) => anyhow::bail!("--error is only valid with status 'failed'"),
                (status, None) => engine.update_task_status(&session_id, &task_id, status)?,
            };
            println!("Task {} is now {}", task.title, task.status);
            if let Some(minutes) = task.actual_minutes {
                println!("  Took {minutes} min");
            }

            if config.workflow.auto_advance {
                try_advance(engine, &session_id)?;
            }
        }

        TaskOperation::List { session, phase, pending, running } => {
            let session_id = resolve_session(engine, &session);
            let mut tasks: Vec<&Task> = if pending {
                engine.pending_tasks(&session_id)?
            } else if running {
                engine.running_tasks(&session_id)?
            } else if let Some(phase) = phase {
                engine.tasks_for_phase(&session_id, phase)?
            } else {
                engine
                    .get_session(&session_id)
                    .with_context(|| format!("Session not found: {session_id}"))?
                    .tasks
                    .iter()
                    .collect()
            };
            if let Some(phase) = phase {
                tasks.retain(|t| t.belongs_to(phase));
            }

            if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                for task in &tasks {
                    print_task(task);
                }
            }
        }
    }

    Ok(())
}

/// Show session statistics.
fn cmd_stats(engine: &WorkflowEngine, id: &str, format: &str) -> Result<()> {
    let id = resolve_session(engine, id);
    let stats = engine.session_stats(&id)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => print_stats(&stats),
    }

    Ok(())
}

/// Show configuration.
fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_path() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load()?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "flowctl", &mut io::stdout());
}

// --- Helpers ---

/// Auto-advance and report the outcome.
fn try_advance(engine: &mut WorkflowEngine, id: &str) -> Result<()> {
    if let Some(session) = engine.auto_advance(id)? {
        println!("All tasks done, advanced {} to {}", session.name, session.current_phase);
        print_skills(session.current_phase);
    } else if let Some(session) = engine.get_session(id) {
        println!("{} stays in {}", session.name, session.current_phase);
    }
    Ok(())
}

/// Expand a unique ID prefix to the full session ID.
fn resolve_session(engine: &WorkflowEngine, id: &str) -> String {
    let matches: Vec<&Session> =
        engine.list_sessions().iter().filter(|s| s.id.starts_with(id)).collect();
    match matches.as_slice() {
        [only] => only.id.clone(),
        _ => id.to_string(),
    }
}

/// Expand a unique ID prefix to the full task ID.
fn resolve_task(engine: &WorkflowEngine, session_id: &str, id: &str) -> String {
    let Some(session) = engine.get_session(session_id) else {
        return id.to_string();
    };
    let matches: Vec<&Task> = session.tasks.iter().filter(|t| t.id.starts_with(id)).collect();
    match matches.as_slice() {
        [only] => only.id.clone(),
        _ => id.to_string(),
    }
}

fn parse_metadata(entries: &[String]) -> Result<BTreeMap<String, String>> {
    entries
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .with_context(|| format!("Invalid metadata '{entry}', expected key=value"))
        })
        .collect()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn print_status(session: &Session) {
    println!("{} is now {}", session.name, session.status);
    if let Some(error) = &session.error {
        println!("  Error: {error}");
    }
}

fn print_skills(phase: Phase) {
    let skills = phase.definition().auto_activate_skills;
    if !skills.is_empty() {
        println!("  Suggested skills: {}", skills.join(", "));
    }
}

fn print_session(session: &Session) {
    println!("{} ({})", session.name, session.id);
    if let Some(description) = &session.description {
        println!("  {description}");
    }
    println!();
    println!("  Status:  {}", session.status);
    println!("  Phase:   {}", session.current_phase);
    if let Some(branch) = &session.branch {
        println!("  Branch:  {branch}");
    }
    if !session.skills.is_empty() {
        println!("  Skills:  {}", session.skills.join(", "));
    }
    for (key, value) in &session.metadata {
        println!("  {key}: {value}");
    }
    println!("  Created: {}", session.created_at.to_rfc3339());
    if let Some(error) = &session.error {
        println!("  Error:   {error}");
    }

    println!("\nPhase history:");
    for transition in &session.phase_history {
        let from = transition.from.map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "  {}  {} -> {}  [{}] {}",
            transition.timestamp.format("%Y-%m-%d %H:%M"),
            from,
            transition.to,
            transition.triggered_by,
            transition.reason
        );
    }

    if !session.tasks.is_empty() {
        println!("\nTasks:");
        for task in &session.tasks {
            print_task(task);
        }
    }
}

fn print_task(task: &Task) {
    let phase = task.phase.map_or_else(|| "-".to_string(), |p| p.to_string());
    let minutes = task.actual_minutes.map(|m| format!(" ({m} min)")).unwrap_or_default();
    println!("  {}  {:<10} {:<15} {}{}", short_id(&task.id), task.status, phase, task.title, minutes);
    if let Some(error) = &task.error {
        println!("            error: {error}");
    }
}

fn print_stats(stats: &SessionStats) {
    println!(
        "Tasks: {} total, {} completed, {} running, {} pending, {} failed",
        stats.total_tasks, stats.completed, stats.running, stats.pending, stats.failed
    );
    println!("Progress: {:.0}%", stats.completion_ratio() * 100.0);
    println!("Time: {} min actual, {} min estimated", stats.actual_minutes, stats.estimated_minutes);
    println!("\nTime per phase:");
    for entry in &stats.phases {
        println!("  {:<15} {:>5} min  ({} visits)", entry.phase, entry.minutes, entry.visits);
    }
    println!("\nIn current phase for {} min", stats.current_phase_minutes);
    if stats.over_budget {
        println!("Warning: current phase is over its time budget");
    }
}
