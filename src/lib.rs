#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

//! # flowctl
//!
//! Workflow phase tracking for AI-assisted development sessions.
//!
//! A session moves through brainstorming, planning, implementation, review,
//! and finishing. Each phase holds tasks whose outcomes are reported from
//! outside; the engine records them, enforces which phase transitions are
//! allowed, and advances automatically when a phase's work is done.
//!
//! ## Features
//!
//! - **Phase Registry**: Fixed transition table with confirmation rules
//! - **Task Tracking**: Status lifecycle with derived durations
//! - **Persistence**: Versioned JSON state file, rewritten on every change
//! - **Events**: Synchronous listeners for every lifecycle change
//!
//! ## Quick Start
//!
//! ```bash
//! # Start a session
//! flowctl session create "auth refactor" --branch feat/auth
//!
//! # Record work
//! flowctl task add <session> "extract token service"
//! flowctl task update <session> <task> completed
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::use_self)]

pub mod core;
pub mod workflow;

// Re-export commonly used types
pub use crate::core::Config;
pub use workflow::{
    Phase, Session, SessionOptions, SessionStatus, StateStore, Task, TaskDraft, TaskStatus,
    WorkflowEngine, WorkflowError, WorkflowEvent,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "flowctl";
