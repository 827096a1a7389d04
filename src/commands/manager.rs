//! Manager commands: triage, assignment, overrides and the workload dashboard.

use super::{BugList, Context, Output, severity_label};
use crate::models::{BugReport, BugStatus, Role, Severity};
use crate::storage::{AssignOutcome, AssigneeWorkload, BatchOutcome, BugFilter, BugSort, BugUpdate};
use crate::{Error, Result};
use serde::Serialize;
use std::io::Read;

/// Arguments for `manager list`.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub status: Option<BugStatus>,
    pub severity: Option<Severity>,
    pub all: bool,
    pub sort: BugSort,
    pub limit: Option<usize>,
}

pub fn list(ctx: &Context, args: ListArgs) -> Result<BugList> {
    let filter = BugFilter {
        status: args.status,
        severity: args.severity,
        include_closed: args.all,
        sort: args.sort,
        limit: Some(args.limit.unwrap_or(ctx.list_limit)),
    };
    Ok(ctx.open()?.list(&filter)?.into())
}

pub fn set_severity(ctx: &Context, id: &str, severity: Severity) -> Result<BugReport> {
    ctx.open()?
        .set_severity(&ctx.actor(Role::Manager), id, severity)
}

pub fn set_category(ctx: &Context, id: &str, category: &str) -> Result<BugReport> {
    ctx.open()?
        .set_category(&ctx.actor(Role::Manager), id, category)
}

pub fn set_status(
    ctx: &Context,
    id: &str,
    status: BugStatus,
    reason: Option<&str>,
) -> Result<BugReport> {
    ctx.open()?
        .set_status(&ctx.actor(Role::Manager), id, status, reason)
}

pub fn dismiss(ctx: &Context, id: &str, reason: Option<&str>) -> Result<BugReport> {
    ctx.open()?.dismiss(&ctx.actor(Role::Manager), id, reason)
}

pub fn triage(
    ctx: &Context,
    id: &str,
    severity: Severity,
    category: &str,
    note: Option<&str>,
) -> Result<BugReport> {
    ctx.open()?
        .triage(&ctx.actor(Role::Manager), id, severity, category, note)
}

impl Output for AssignOutcome {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Assigned {} bug(s) to {}",
            self.succeeded.len(),
            self.assignee
        )];
        lines.extend(self.succeeded.iter().map(|id| format!("  {}", id)));
        if !self.skipped.is_empty() {
            lines.push(format!("Skipped {}:", self.skipped.len()));
            for skip in &self.skipped {
                lines.push(format!("  {}: {}", skip.bug_id, skip.reason));
            }
        }
        lines.join("\n")
    }
}

/// Assign each bug to `to`, or to the caller when no assignee is given.
pub fn assign(ctx: &Context, ids: &[String], to: Option<&str>) -> Result<AssignOutcome> {
    let assignee = to.unwrap_or(ctx.actor_id.as_str());
    ctx.open()?
        .assign(&ctx.actor(Role::Manager), ids, assignee)
}

#[derive(Serialize)]
pub struct Workload {
    pub assignees: Vec<AssigneeWorkload>,
}

impl Output for Workload {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.assignees.is_empty() {
            return "No open assigned work.".to_string();
        }
        let mut lines = Vec::new();
        for load in &self.assignees {
            lines.push(format!(
                "{}: {} open ({} assigned, {} in progress, {} good-to-test; {} critical, {} high)",
                load.assignee,
                load.total,
                load.assigned,
                load.in_progress,
                load.good_to_test,
                load.critical,
                load.high
            ));
            for bug in &load.bugs {
                lines.push(format!(
                    "  {} [{}] [{}] {}",
                    bug.id,
                    bug.status,
                    severity_label(bug.severity),
                    bug.title
                ));
            }
        }
        lines.join("\n")
    }
}

pub fn workload(ctx: &Context) -> Result<Workload> {
    Ok(Workload {
        assignees: ctx.open()?.workload()?,
    })
}

impl Output for BatchOutcome {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Applied {} update(s), {} failed",
            self.applied.len(),
            self.failed.len()
        )];
        for failure in &self.failed {
            lines.push(format!("  {}: {}", failure.bug_id, failure.error));
        }
        lines.join("\n")
    }
}

/// Parse a JSON array of updates.
pub fn parse_updates(content: &str) -> Result<Vec<BugUpdate>> {
    serde_json::from_str(content)
        .map_err(|e| Error::Validation(format!("Invalid update list: {}", e)))
}

/// Apply updates read from `source` (a file path, or `-` for stdin).
pub fn apply(ctx: &Context, source: &str) -> Result<BatchOutcome> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)?
    };
    let updates = parse_updates(&content)?;
    ctx.open()?
        .apply_updates(&ctx.actor(Role::Manager), &updates)
}
