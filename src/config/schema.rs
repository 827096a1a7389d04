//! KDL schema for config.kdl.
//!
//! This module provides:
//! - A Rust struct representing the KDL schema
//! - Parsing from KDL documents and files
//! - Validation and merging

use crate::{Error, Result};
use kdl::KdlDocument;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest page size a config file may set.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// output-format "human"  // or "json"
/// actor "alice"
/// list-limit 50
/// busy-timeout-ms 5000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugtrailConfig {
    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,

    /// Identity recorded for the caller when `--as` is not given
    pub actor: Option<String>,

    /// Default number of bugs returned by list views
    pub list_limit: Option<usize>,

    /// How long to wait on a locked database, in milliseconds
    pub busy_timeout_ms: Option<u64>,
}

impl BugtrailConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(limit) = self.list_limit {
            if limit == 0 || limit > MAX_LIST_LIMIT {
                return Err(format!(
                    "list-limit must be 1-{}, got {}",
                    MAX_LIST_LIMIT, limit
                ));
            }
        }
        if let Some(actor) = &self.actor {
            if actor.trim().is_empty() {
                return Err("actor cannot be empty".to_string());
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Unknown nodes and values of the wrong type are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(s) = first_string(doc, "output-format") {
            config.output_format = OutputFormat::parse(s);
        }

        if let Some(s) = first_string(doc, "actor") {
            config.actor = Some(s.to_string());
        }

        if let Some(i) = first_integer(doc, "list-limit") {
            if i > 0 {
                config.list_limit = usize::try_from(i).ok();
            }
        }

        if let Some(i) = first_integer(doc, "busy-timeout-ms") {
            config.busy_timeout_ms = u64::try_from(i).ok();
        }

        config
    }

    /// Load config from a KDL file. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let doc: KdlDocument = content.parse().map_err(|e| {
            Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e))
        })?;

        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }
}

fn first_string<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a str> {
    doc.get(name)?.entries().first()?.value().as_string()
}

fn first_integer(doc: &KdlDocument, name: &str) -> Option<i128> {
    doc.get(name)?.entries().first()?.value().as_integer()
}
