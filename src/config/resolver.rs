//! Precedence resolution for configuration.
//!
//! ## Config Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Session config.kdl (`<data dir>/<repo-hash>/config.kdl`)
//! 3. System config.kdl (`~/.config/bugtrail/config.kdl`)
//! 4. Built-in defaults
//!
//! The caller identity has one more step between the config files and the
//! default: the `USER` / `USERNAME` environment variables.

use crate::Result;
use crate::config::{BugtrailConfig, OutputFormat};
use crate::storage::DEFAULT_BUSY_TIMEOUT_MS;
use std::path::{Path, PathBuf};

/// Default page size for list views.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Identity used when nothing else names the caller.
pub const UNKNOWN_ACTOR: &str = "unknown";

const CONFIG_FILE: &str = "config.kdl";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from session-level config
    Session,
    /// Value from system-level config
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Session => write!(f, "session"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub output_format: Resolved<OutputFormat>,
    pub actor: Resolved<String>,
    pub list_limit: Resolved<usize>,
    pub busy_timeout_ms: Resolved<u64>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            actor: Resolved::new(UNKNOWN_ACTOR.to_string(), ValueSource::Default),
            list_limit: Resolved::new(DEFAULT_LIST_LIMIT, ValueSource::Default),
            busy_timeout_ms: Resolved::new(DEFAULT_BUSY_TIMEOUT_MS, ValueSource::Default),
        }
    }
}

impl ResolvedConfig {
    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    pub fn actor(&self) -> &str {
        &self.actor.value
    }

    pub fn list_limit(&self) -> usize {
        self.list_limit.value
    }

    pub fn busy_timeout_ms(&self) -> u64 {
        self.busy_timeout_ms.value
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Output format override from CLI flag
    pub output_format: Option<OutputFormat>,
    /// Caller identity from `--as` / `BT_ACTOR`
    pub actor: Option<String>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output format override.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Set actor override.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Path of the system-wide config file, if a config directory exists.
pub fn system_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bugtrail").join(CONFIG_FILE))
}

/// Path of the per-repository config file inside a storage directory.
pub fn session_config_path(storage_root: &Path) -> PathBuf {
    storage_root.join(CONFIG_FILE)
}

/// Resolve configuration with full precedence chain.
///
/// `storage_root` is the repository's storage directory; it does not need to
/// be initialized.
pub fn resolve_config(
    storage_root: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ResolvedConfig> {
    let system_config = match system_config_path() {
        Some(path) => BugtrailConfig::load(&path)?,
        None => BugtrailConfig::new(),
    };
    let session_config = match storage_root {
        Some(root) => BugtrailConfig::load(&session_config_path(root))?,
        None => BugtrailConfig::new(),
    };

    Ok(resolve_layers(
        &system_config,
        &session_config,
        overrides,
        login_name(),
    ))
}

fn login_name() -> Option<(String, String)> {
    ["USER", "USERNAME"].iter().find_map(|var| {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| (var.to_string(), v))
    })
}

fn pick<T: Clone>(cli: Option<&T>, session: Option<&T>, system: Option<&T>) -> Option<Resolved<T>> {
    if let Some(v) = cli {
        Some(Resolved::new(v.clone(), ValueSource::CliFlag))
    } else if let Some(v) = session {
        Some(Resolved::new(v.clone(), ValueSource::Session))
    } else {
        system.map(|v| Resolved::new(v.clone(), ValueSource::System))
    }
}

/// Apply precedence to already-loaded layers.
///
/// `login` is the `(variable, value)` pair naming the OS user, if any.
pub fn resolve_layers(
    system: &BugtrailConfig,
    session: &BugtrailConfig,
    overrides: &ConfigOverrides,
    login: Option<(String, String)>,
) -> ResolvedConfig {
    let mut result = ResolvedConfig::default();

    if let Some(format) = pick(
        overrides.output_format.as_ref(),
        session.output_format.as_ref(),
        system.output_format.as_ref(),
    ) {
        result.output_format = format;
    }

    let cli_actor = overrides
        .actor
        .as_ref()
        .filter(|a| !a.trim().is_empty());
    if let Some(actor) = pick(cli_actor, session.actor.as_ref(), system.actor.as_ref()) {
        result.actor = actor;
    } else if let Some((var, name)) = login {
        result.actor = Resolved::new(name, ValueSource::EnvVar(var));
    }

    if let Some(limit) = pick(None, session.list_limit.as_ref(), system.list_limit.as_ref()) {
        result.list_limit = limit;
    }

    if let Some(timeout) = pick(
        None,
        session.busy_timeout_ms.as_ref(),
        system.busy_timeout_ms.as_ref(),
    ) {
        result.busy_timeout_ms = timeout;
    }

    result
}
