//! Tester commands: the verification queue, verdicts and the audit view.

use super::{BugList, Context, Output};
use crate::Result;
use crate::models::{BugReport, Role};
use crate::storage::AuditEntry;
use serde::Serialize;

pub fn queue(ctx: &Context) -> Result<BugList> {
    Ok(ctx.open()?.testing_queue()?.into())
}

pub fn resolve(ctx: &Context, id: &str, note: Option<&str>) -> Result<BugReport> {
    ctx.open()?.resolve(&ctx.actor(Role::Tester), id, note)
}

pub fn send_back(ctx: &Context, id: &str, notes: &str) -> Result<BugReport> {
    ctx.open()?.send_back(&ctx.actor(Role::Tester), id, notes)
}

#[derive(Serialize)]
pub struct AuditList {
    pub count: usize,
    pub bugs: Vec<AuditEntry>,
}

impl Output for AuditList {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.bugs.is_empty() {
            return "No resolved bugs.".to_string();
        }
        let mut lines = vec![format!("{} resolved bug(s):", self.count)];
        for entry in &self.bugs {
            lines.push(format!(
                "  {} {} (fixed by {}, verified by {})",
                entry.bug.id,
                entry.bug.title,
                entry.fixed_by.as_deref().unwrap_or("-"),
                entry.resolved_by.as_deref().unwrap_or("-")
            ));
        }
        lines.join("\n")
    }
}

/// Resolved bugs, most recent first, with who fixed and who verified them.
pub fn audit(ctx: &Context, limit: Option<usize>) -> Result<AuditList> {
    let bugs = ctx.open()?.audit_resolved(limit.unwrap_or(ctx.list_limit))?;
    Ok(AuditList {
        count: bugs.len(),
        bugs,
    })
}
