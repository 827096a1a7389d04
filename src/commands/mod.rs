//! Command implementations for the `bt` CLI.
//!
//! Each command opens the repository's store, runs one engine operation as
//! the resolved actor, and returns a result that can be printed as JSON or
//! as text. Commands are grouped by role:
//! - this module: init, report, show, config
//! - [`manager`] - triage, assignment, overrides, dashboards
//! - [`developer`] - progress updates and the personal queue
//! - [`ai`] - the structured queue and fixes for AI agents
//! - [`tester`] - verification queue, verdicts and audit

pub mod ai;
pub mod developer;
pub mod manager;
pub mod tester;

use crate::models::{Actor, BugReport, NewBugReport, Role, ScreenshotRef, Severity};
use crate::storage::Storage;
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Everything a command needs to know about where and as whom it runs.
#[derive(Debug, Clone)]
pub struct Context {
    pub repo_path: PathBuf,
    /// Canonical identity of the caller
    pub actor_id: String,
    /// Default page size for list views
    pub list_limit: usize,
    pub busy_timeout_ms: u64,
    /// Explicit data directory; `None` uses `BT_DATA_DIR` or the platform default
    pub data_dir: Option<PathBuf>,
}

impl Context {
    pub fn new(repo_path: impl Into<PathBuf>, actor_id: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            actor_id: actor_id.into(),
            list_limit: crate::config::DEFAULT_LIST_LIMIT,
            busy_timeout_ms: crate::storage::DEFAULT_BUSY_TIMEOUT_MS,
            data_dir: None,
        }
    }

    /// The caller acting in `role`.
    pub fn actor(&self, role: Role) -> Actor {
        Actor::new(self.actor_id.clone(), role)
    }

    /// Open the repository's store.
    pub fn open(&self) -> Result<Storage> {
        let storage = match &self.data_dir {
            Some(dir) => Storage::open_with_data_dir(&self.repo_path, dir)?,
            None => Storage::open(&self.repo_path)?,
        };
        storage.set_busy_timeout(self.busy_timeout_ms)?;
        Ok(storage)
    }
}

pub(crate) fn severity_label(severity: Option<Severity>) -> &'static str {
    severity.map(|s| s.as_str()).unwrap_or("untriaged")
}

/// One-line summary used by the list views.
pub(crate) fn summary_line(bug: &BugReport) -> String {
    let mut line = format!(
        "  {} [{}] [{}] {}",
        bug.id,
        bug.status,
        severity_label(bug.severity),
        bug.title
    );
    if let Some(assignee) = &bug.assigned_to {
        line.push_str(&format!(" -> {}", assignee));
    }
    line
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Output for BugReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} [{}] {}", self.id, self.status, self.title),
            format!(
                "  Severity: {}  Category: {}",
                severity_label(self.severity),
                self.category.as_deref().unwrap_or("-")
            ),
        ];

        if self.reporter.display_name == self.reporter.user_id {
            lines.push(format!("  Reporter: {}", self.reporter.user_id));
        } else {
            lines.push(format!(
                "  Reporter: {} ({})",
                self.reporter.display_name, self.reporter.user_id
            ));
        }
        if let Some(assignee) = &self.assigned_to {
            match self.assigned_at {
                Some(at) => lines.push(format!(
                    "  Assigned: {} (since {})",
                    assignee,
                    at.format("%Y-%m-%d %H:%M")
                )),
                None => lines.push(format!("  Assigned: {}", assignee)),
            }
        }
        lines.push(format!(
            "  Reported: {}  Updated: {}",
            self.reported_at.format("%Y-%m-%d %H:%M"),
            self.updated_at.format("%Y-%m-%d %H:%M")
        ));

        lines.push("  Description:".to_string());
        lines.push(indent(&self.description));
        if let Some(steps) = &self.reproduction_steps {
            lines.push("  Steps to reproduce:".to_string());
            lines.push(indent(steps));
        }
        if let Some(info) = &self.system_info {
            lines.push(format!("  System: {}", info));
        }
        if let Some(logs) = &self.log_context {
            lines.push("  Logs:".to_string());
            lines.push(indent(logs));
        }
        if let Some(shot) = &self.screenshot_ref {
            lines.push(format!("  Screenshot: {} ({})", shot.name, shot.path));
        }
        if !self.progress_notes.is_empty() {
            lines.push(format!("  Progress notes ({}):", self.progress_notes.len()));
            lines.push(indent(&self.render_notes()));
        }

        lines.join("\n")
    }
}

/// A list of bugs.
#[derive(Serialize)]
pub struct BugList {
    pub count: usize,
    pub bugs: Vec<BugReport>,
}

impl From<Vec<BugReport>> for BugList {
    fn from(bugs: Vec<BugReport>) -> Self {
        Self {
            count: bugs.len(),
            bugs,
        }
    }
}

impl Output for BugList {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.bugs.is_empty() {
            return "No bugs found.".to_string();
        }
        let mut lines = vec![format!("{} bug(s):", self.count)];
        lines.extend(self.bugs.iter().map(summary_line));
        lines.join("\n")
    }
}

// === System ===

#[derive(Serialize)]
pub struct InitResult {
    pub initialized: bool,
    pub storage_path: String,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.initialized {
            format!("Initialized bugtrail at {}", self.storage_path)
        } else {
            format!("Already initialized at {}", self.storage_path)
        }
    }
}

/// Initialize storage for the repository. Safe to run twice.
pub fn init(ctx: &Context) -> Result<InitResult> {
    let already = match &ctx.data_dir {
        Some(dir) => Storage::exists_in(&ctx.repo_path, dir)?,
        None => Storage::exists(&ctx.repo_path)?,
    };
    let storage = match &ctx.data_dir {
        Some(dir) => Storage::init_with_data_dir(&ctx.repo_path, dir)?,
        None => Storage::init(&ctx.repo_path)?,
    };
    Ok(InitResult {
        initialized: !already,
        storage_path: storage.root().display().to_string(),
    })
}

// === User ===

/// Arguments for filing a report from the command line.
#[derive(Debug, Clone, Default)]
pub struct ReportArgs {
    pub title: String,
    pub description: String,
    pub reproduction_steps: Option<String>,
    pub system_info: Option<String>,
    pub log_context: Option<String>,
    pub screenshot: Option<String>,
    pub screenshot_name: Option<String>,
    pub session: Option<String>,
    pub display_name: Option<String>,
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// File a bug report as the current actor.
pub fn report(ctx: &Context, args: ReportArgs) -> Result<BugReport> {
    let mut storage = ctx.open()?;

    let screenshot_ref = args.screenshot.map(|path| ScreenshotRef {
        name: args.screenshot_name.unwrap_or_else(|| file_name(&path)),
        path,
    });
    let input = NewBugReport {
        title: args.title,
        description: args.description,
        reproduction_steps: args.reproduction_steps,
        system_info: args.system_info,
        log_context: args.log_context,
        screenshot_ref,
        session_ref: args.session,
        display_name: args.display_name,
    };

    storage.report_bug(&ctx.actor(Role::User), input)
}

/// Full record for one bug.
pub fn show(ctx: &Context, id: &str) -> Result<BugReport> {
    ctx.open()?.get_details(id)
}

// === Config ===

#[derive(Serialize)]
pub struct ConfigValue {
    pub key: String,
    pub value: Option<String>,
}

impl Output for ConfigValue {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        match &self.value {
            Some(v) => format!("{} = {}", self.key, v),
            None => format!("{} is not set", self.key),
        }
    }
}

#[derive(Serialize)]
pub struct ConfigList {
    pub count: usize,
    pub configs: std::collections::BTreeMap<String, String>,
}

impl Output for ConfigList {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.configs.is_empty() {
            return "No configuration values set.".to_string();
        }
        self.configs
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn config_get(ctx: &Context, key: &str) -> Result<ConfigValue> {
    let storage = ctx.open()?;
    Ok(ConfigValue {
        key: key.to_string(),
        value: storage.get_config(key)?,
    })
}

pub fn config_set(ctx: &Context, key: &str, value: &str) -> Result<ConfigValue> {
    if key.trim().is_empty() {
        return Err(crate::Error::Validation("Config key cannot be empty".to_string()));
    }
    let mut storage = ctx.open()?;
    storage.set_config(key, value)?;
    Ok(ConfigValue {
        key: key.to_string(),
        value: Some(value.to_string()),
    })
}

pub fn config_list(ctx: &Context) -> Result<ConfigList> {
    let configs: std::collections::BTreeMap<String, String> =
        ctx.open()?.list_configs()?.into_iter().collect();
    Ok(ConfigList {
        count: configs.len(),
        configs,
    })
}
