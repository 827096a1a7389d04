//! Bugtrail - A bug-report lifecycle tracker for humans and AI agents.
//!
//! This library provides the core functionality for the `bt` CLI tool:
//! a persisted bug-report state machine with role-gated transitions,
//! an append-only progress trail, and per-role queue views.

pub mod action_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod storage;

use models::{BugStatus, Role};


/// Library-level error type for Bugtrail operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not initialized: run `bt system init` first")]
    NotInitialized,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(
        "Invalid transition for {id}: cannot move from '{from}' to '{to}' as {role} (current status must be one of: {})",
        format_statuses(.expected)
    )]
    InvalidTransition {
        id: String,
        from: BugStatus,
        to: BugStatus,
        role: Role,
        expected: Vec<BugStatus>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::Io(_) | Error::Json(_) | Error::Database(_) | Error::Storage(_) => {
                "storage_error"
            }
            Error::NotInitialized => "not_initialized",
            Error::Config(_) => "config_error",
            Error::Other(_) => "error",
        }
    }
}

fn format_statuses(statuses: &[BugStatus]) -> String {
    if statuses.is_empty() {
        return "(none)".to_string();
    }
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for Bugtrail operations.
pub type Result<T> = std::result::Result<T, Error>;
