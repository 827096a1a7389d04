//! Configuration for Bugtrail.
//!
//! ## config.kdl - User preferences
//!
//! Located at:
//! - System: `~/.config/bugtrail/config.kdl`
//! - Session: `~/.local/share/bugtrail/<repo-hash>/config.kdl`
//!
//! Contains:
//! - `output-format` - "json" or "human"
//! - `actor` - Identity recorded for the caller
//! - `list-limit` - Default page size for list views
//! - `busy-timeout-ms` - How long to wait on a locked database
//!
//! ## Precedence
//!
//! CLI flag > session config > system config > defaults
//!
//! Repository key/value settings (`bt config get|set|list`) live in the
//! store's `config` table, not in these files.
//!
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, DEFAULT_LIST_LIMIT, Resolved, ResolvedConfig, UNKNOWN_ACTOR, ValueSource,
    resolve_config, resolve_layers, session_config_path, system_config_path,
};
pub use schema::{BugtrailConfig, OutputFormat};
