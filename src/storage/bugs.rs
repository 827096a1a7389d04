//! Bug lifecycle operations.
//!
//! Every mutation here is one call to [`Storage::transition`] (or
//! [`Storage::create_bug`] for new reports), so a status change and the notes
//! that go with it commit together or not at all.

use super::Storage;
use crate::models::lifecycle::check_transition;
use crate::models::{
    Actor, BugReport, BugStatus, NewBugReport, NoteKind, Reporter, Role, Severity,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_VERIFIED_NOTE: &str = "Verified fix";

/// Result of a bulk assignment.
#[derive(Debug, Clone, Serialize)]
pub struct AssignOutcome {
    pub assignee: String,
    pub succeeded: Vec<String>,
    pub skipped: Vec<SkippedAssignment>,
}

/// A bug that bulk assignment left untouched, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedAssignment {
    pub bug_id: String,
    pub code: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<BugStatus>,
}

/// One item of a batch triage request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BugUpdate {
    pub bug_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BugStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Result of a batch triage request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub applied: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub bug_id: String,
    pub code: String,
    pub error: String,
}

fn require_role(actor: &Actor, allowed: &[Role], operation: &str) -> Result<()> {
    if allowed.contains(&actor.role) {
        return Ok(());
    }
    Err(Error::Validation(format!(
        "{} is not available to the {} role",
        operation, actor.role
    )))
}

fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} cannot be empty", field)));
    }
    Ok(trimmed)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn default_system_info() -> String {
    format!(
        "{} {} - bugtrail {}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        env!("CARGO_PKG_VERSION")
    )
}

/// Audited status write outside the edge table.
fn apply_override(
    bug: &mut BugReport,
    actor: &Actor,
    status: BugStatus,
    reason: Option<&str>,
) -> Result<()> {
    if bug.status == status {
        return Ok(());
    }
    if status.requires_assignee() && bug.assigned_to.is_none() {
        return Err(Error::InvalidTransition {
            id: bug.id.clone(),
            from: bug.status,
            to: status,
            role: actor.role,
            expected: vec![BugStatus::Assigned, BugStatus::InProgress, BugStatus::GoodToTest],
        });
    }
    let mut text = format!("Status changed from '{}' to '{}'", bug.status, status);
    if let Some(reason) = non_empty(reason) {
        text.push_str(": ");
        text.push_str(reason);
    }
    bug.append_note(actor, NoteKind::Override, text);
    bug.status = status;
    Ok(())
}

impl Storage {
    // === User ===

    /// File a new bug report. The caller becomes the reporter.
    pub fn report_bug(&mut self, actor: &Actor, input: NewBugReport) -> Result<BugReport> {
        let title = require_text(&input.title, "Title")?.to_string();
        let description = require_text(&input.description, "Description")?.to_string();
        let reporter = Reporter {
            user_id: actor.id.clone(),
            display_name: non_empty(input.display_name.as_deref())
                .unwrap_or(actor.id.as_str())
                .to_string(),
        };
        let system_info = non_empty(input.system_info.as_deref())
            .map(str::to_string)
            .unwrap_or_else(default_system_info);

        let bug = self.create_bug(|id| {
            let mut bug =
                BugReport::new(id, reporter.clone(), title.clone(), description.clone());
            bug.session_ref = input.session_ref.clone();
            bug.reproduction_steps = non_empty(input.reproduction_steps.as_deref()).map(str::to_string);
            bug.system_info = Some(system_info.clone());
            bug.log_context = input.log_context.clone();
            bug.screenshot_ref = input.screenshot_ref.clone();
            bug
        })?;

        tracing::info!(bug = %bug.id, actor = %actor.id, "bug reported");
        Ok(bug)
    }

    // === Manager ===

    /// Set severity. Idempotent; never appends a note.
    pub fn set_severity(&mut self, actor: &Actor, id: &str, severity: Severity) -> Result<BugReport> {
        require_role(actor, &[Role::Manager], "set_severity")?;
        let bug = self.transition(id, |bug| {
            bug.severity = Some(severity);
            Ok(())
        })?;
        tracing::info!(bug = %id, actor = %actor.id, %severity, "severity set");
        Ok(bug)
    }

    /// Set category. Idempotent; never appends a note.
    pub fn set_category(&mut self, actor: &Actor, id: &str, category: &str) -> Result<BugReport> {
        require_role(actor, &[Role::Manager], "set_category")?;
        let category = require_text(category, "Category")?.to_string();
        let bug = self.transition(id, |bug| {
            bug.category = Some(category);
            Ok(())
        })?;
        tracing::info!(bug = %id, actor = %actor.id, "category set");
        Ok(bug)
    }

    /// Manager override: write any status, bypassing the edge table.
    ///
    /// Every effective change appends an `Override` note. Setting the current
    /// status again only refreshes `updated_at`.
    pub fn set_status(
        &mut self,
        actor: &Actor,
        id: &str,
        status: BugStatus,
        reason: Option<&str>,
    ) -> Result<BugReport> {
        require_role(actor, &[Role::Manager], "set_status")?;
        let mut from = status;
        let bug = self.transition(id, |bug| {
            from = bug.status;
            apply_override(bug, actor, status, reason)
        })?;
        tracing::info!(bug = %id, actor = %actor.id, %from, to = %status, "status overridden");
        Ok(bug)
    }

    /// Dismiss a bug (override to Dismissed).
    pub fn dismiss(&mut self, actor: &Actor, id: &str, reason: Option<&str>) -> Result<BugReport> {
        self.set_status(actor, id, BugStatus::Dismissed, reason)
    }

    /// Set severity and category and move New to Triaged.
    pub fn triage(
        &mut self,
        actor: &Actor,
        id: &str,
        severity: Severity,
        category: &str,
        note: Option<&str>,
    ) -> Result<BugReport> {
        let category = require_text(category, "Category")?.to_string();
        let bug = self.transition(id, |bug| {
            check_transition(&bug.id, bug.status, BugStatus::Triaged, actor.role)?;
            bug.severity = Some(severity);
            bug.category = Some(category);
            bug.status = BugStatus::Triaged;
            if let Some(note) = non_empty(note) {
                bug.append_note(actor, NoteKind::Triage, note);
            }
            Ok(())
        })?;
        tracing::info!(bug = %id, actor = %actor.id, from = "New", to = "Triaged", "bug triaged");
        Ok(bug)
    }

    /// Assign bugs to `assignee`, one transaction per id.
    ///
    /// Triaged bugs move to Assigned; Assigned bugs are reassigned. Anything
    /// else is skipped with the reason, and the rest still go through.
    pub fn assign(&mut self, actor: &Actor, ids: &[String], assignee: &str) -> Result<AssignOutcome> {
        require_role(actor, &[Role::Manager], "assign")?;
        let assignee = require_text(assignee, "Assignee")?.to_string();

        let mut outcome = AssignOutcome {
            assignee: assignee.clone(),
            succeeded: Vec::new(),
            skipped: Vec::new(),
        };

        for id in ids {
            let result = self.transition(id, |bug| {
                if bug.status != BugStatus::Assigned {
                    check_transition(&bug.id, bug.status, BugStatus::Assigned, actor.role)?;
                }
                if bug.assigned_at.is_none() {
                    bug.assigned_at = Some(crate::models::now());
                }
                bug.assigned_to = Some(assignee.clone());
                bug.status = BugStatus::Assigned;
                Ok(())
            });

            match result {
                Ok(_) => {
                    tracing::info!(bug = %id, actor = %actor.id, assignee = %assignee, "bug assigned");
                    outcome.succeeded.push(id.clone());
                }
                Err(e) => {
                    tracing::warn!(bug = %id, error = %e, "assignment skipped");
                    let current_status = match &e {
                        Error::InvalidTransition { from, .. } => Some(*from),
                        _ => None,
                    };
                    outcome.skipped.push(SkippedAssignment {
                        bug_id: id.clone(),
                        code: e.code().to_string(),
                        reason: e.to_string(),
                        current_status,
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Apply a batch of triage updates, each in its own transaction.
    ///
    /// Status changes go through the audited override and notes are appended
    /// as comments. One failing item does not stop the others.
    pub fn apply_updates(&mut self, actor: &Actor, updates: &[BugUpdate]) -> Result<BatchOutcome> {
        require_role(actor, &[Role::Manager, Role::Ai], "apply_updates")?;
        let mut outcome = BatchOutcome::default();

        for update in updates {
            let result = self.apply_update(actor, update);
            match result {
                Ok(_) => outcome.applied.push(update.bug_id.clone()),
                Err(e) => {
                    tracing::warn!(bug = %update.bug_id, error = %e, "batch update failed");
                    outcome.failed.push(BatchFailure {
                        bug_id: update.bug_id.clone(),
                        code: e.code().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    fn apply_update(&mut self, actor: &Actor, update: &BugUpdate) -> Result<BugReport> {
        let category = match update.category.as_deref() {
            Some(category) => Some(require_text(category, "Category")?.to_string()),
            None => None,
        };
        let note = non_empty(update.note.as_deref());
        if update.severity.is_none() && category.is_none() && update.status.is_none() && note.is_none() {
            return Err(Error::Validation(format!(
                "No changes given for {}",
                update.bug_id
            )));
        }

        let bug = self.transition(&update.bug_id, |bug| {
            if let Some(severity) = update.severity {
                bug.severity = Some(severity);
            }
            if let Some(category) = category {
                bug.category = Some(category);
            }
            if let Some(status) = update.status {
                apply_override(bug, actor, status, None)?;
            }
            if let Some(note) = note {
                bug.append_note(actor, NoteKind::Comment, note);
            }
            Ok(())
        })?;
        tracing::info!(bug = %bug.id, actor = %actor.id, status = %bug.status, "batch update applied");
        Ok(bug)
    }

    // === Developer / AI ===

    /// Move a bug along the developer/AI edges, optionally with a note.
    ///
    /// Passing the current status (Assigned or In Progress) with a note
    /// records a progress comment without changing status.
    pub fn update_progress(
        &mut self,
        actor: &Actor,
        id: &str,
        new_status: BugStatus,
        note: Option<&str>,
    ) -> Result<BugReport> {
        require_role(actor, &[Role::Developer, Role::Ai], "update_progress")?;
        let mut from = new_status;
        let bug = self.transition(id, |bug| {
            from = bug.status;
            let comment_only = bug.status == new_status
                && matches!(bug.status, BugStatus::Assigned | BugStatus::InProgress);

            if comment_only {
                let note = non_empty(note).ok_or_else(|| {
                    Error::Validation(format!(
                        "{} is already '{}'; a note is required to record progress",
                        bug.id, bug.status
                    ))
                })?;
                bug.append_note(actor, NoteKind::Progress, note);
                return Ok(());
            }

            check_transition(&bug.id, bug.status, new_status, actor.role)?;
            bug.status = new_status;
            if let Some(note) = non_empty(note) {
                let kind = if new_status == BugStatus::GoodToTest {
                    NoteKind::Fix
                } else {
                    NoteKind::Progress
                };
                bug.append_note(actor, kind, note);
            }
            Ok(())
        })?;
        tracing::info!(bug = %id, actor = %actor.id, %from, to = %bug.status, "progress updated");
        Ok(bug)
    }

    /// AI agent marks a fix: Assigned or In Progress to Good-to-Test, with notes.
    pub fn ai_fix_bug(&mut self, actor: &Actor, id: &str, fix_notes: &str) -> Result<BugReport> {
        let fix_notes = require_text(fix_notes, "Fix notes")?.to_string();
        let mut from = BugStatus::GoodToTest;
        let bug = self.transition(id, |bug| {
            from = bug.status;
            check_transition(&bug.id, bug.status, BugStatus::GoodToTest, actor.role)?;
            bug.status = BugStatus::GoodToTest;
            bug.append_note(actor, NoteKind::Fix, fix_notes);
            Ok(())
        })?;
        tracing::info!(bug = %id, actor = %actor.id, %from, to = "Good-to-Test", "fix recorded");
        Ok(bug)
    }

    // === Tester ===

    /// Verify a fix: Good-to-Test to Resolved.
    pub fn resolve(&mut self, actor: &Actor, id: &str, note: Option<&str>) -> Result<BugReport> {
        let bug = self.transition(id, |bug| {
            check_transition(&bug.id, bug.status, BugStatus::Resolved, actor.role)?;
            bug.status = BugStatus::Resolved;
            bug.append_note(
                actor,
                NoteKind::Verified,
                non_empty(note).unwrap_or(DEFAULT_VERIFIED_NOTE),
            );
            Ok(())
        })?;
        tracing::info!(bug = %id, actor = %actor.id, from = "Good-to-Test", to = "Resolved", "bug resolved");
        Ok(bug)
    }

    /// Reject a fix: Good-to-Test back to Assigned, keeping the assignee.
    pub fn send_back(&mut self, actor: &Actor, id: &str, notes: &str) -> Result<BugReport> {
        let notes = require_text(notes, "Send-back notes")?.to_string();
        let bug = self.transition(id, |bug| {
            check_transition(&bug.id, bug.status, BugStatus::Assigned, actor.role)?;
            bug.status = BugStatus::Assigned;
            bug.append_note(actor, NoteKind::SendBack, notes);
            Ok(())
        })?;
        tracing::info!(bug = %id, actor = %actor.id, from = "Good-to-Test", to = "Assigned", "bug sent back");
        Ok(bug)
    }
}
