//! Core types shared by the library and the command-line front end.
//!
//! Currently this is the application configuration.

mod config;

pub use config::{Config, GeneralConfig, WorkflowConfig};
