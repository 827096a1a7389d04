//! Data models for Bugtrail entities.
//!
//! This module defines the core data structures:
//! - `BugReport` - The persisted record for one reported defect
//! - `BugStatus` - Lifecycle status (see [`lifecycle`] for the edge table)
//! - `Severity` - Triage severity
//! - `ProgressNote` - One entry in a bug's append-only progress trail
//! - `Actor` / `Role` - The canonical caller identity and the role it acts in

pub mod lifecycle;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current time at the precision timestamps are stored with (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Bug status in the workflow.
///
/// The serialized form is the exact status literal; "Good-to-Test" is a single token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BugStatus {
    #[default]
    New,
    Triaged,
    Assigned,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Good-to-Test")]
    GoodToTest,
    Resolved,
    Dismissed,
}

impl BugStatus {
    /// The status literal as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            BugStatus::New => "New",
            BugStatus::Triaged => "Triaged",
            BugStatus::Assigned => "Assigned",
            BugStatus::InProgress => "In Progress",
            BugStatus::GoodToTest => "Good-to-Test",
            BugStatus::Resolved => "Resolved",
            BugStatus::Dismissed => "Dismissed",
        }
    }

    /// Get all statuses in lifecycle order.
    pub fn all() -> &'static [BugStatus] {
        &[
            BugStatus::New,
            BugStatus::Triaged,
            BugStatus::Assigned,
            BugStatus::InProgress,
            BugStatus::GoodToTest,
            BugStatus::Resolved,
            BugStatus::Dismissed,
        ]
    }

    /// Returns true for statuses no regular transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BugStatus::Resolved | BugStatus::Dismissed)
    }

    /// Returns true for statuses that require an assignee.
    pub fn requires_assignee(&self) -> bool {
        matches!(
            self,
            BugStatus::Assigned | BugStatus::InProgress | BugStatus::GoodToTest
        )
    }
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BugStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BugStatus::all()
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Unknown status: '{}' (expected one of: New, Triaged, Assigned, In Progress, Good-to-Test, Resolved, Dismissed)",
                    s
                )
            })
    }
}

/// Bug severity, set during triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// The severity literal as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    /// Sort rank, most severe first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 1,
            Severity::High => 2,
            Severity::Medium => 3,
            Severity::Low => 4,
        }
    }

    /// Sort rank for an optional severity; untriaged bugs sort last.
    pub fn rank_of(severity: Option<Severity>) -> u8 {
        severity.map(|s| s.rank()).unwrap_or(5)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Critical" => Ok(Severity::Critical),
            "High" => Ok(Severity::High),
            "Medium" => Ok(Severity::Medium),
            "Low" => Ok(Severity::Low),
            _ => Err(format!(
                "Unknown severity: '{}' (expected one of: Critical, High, Medium, Low)",
                s
            )),
        }
    }
}

/// The role an actor is acting in for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Manager,
    Developer,
    Ai,
    Tester,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Developer => "developer",
            Role::Ai => "ai",
            Role::Tester => "tester",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "manager" => Ok(Role::Manager),
            "developer" => Ok(Role::Developer),
            "ai" => Ok(Role::Ai),
            "tester" => Ok(Role::Tester),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// The caller of an operation: one canonical identity plus the role it acts in.
///
/// Identity is resolved once at the boundary (CLI flag, env, config) and is the
/// only key the store records for that caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Identity of the user who filed a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporter {
    /// Canonical user identifier
    pub user_id: String,
    /// Name shown in views
    pub display_name: String,
}

/// Reference to a screenshot attached at report time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotRef {
    /// Where the image lives
    pub path: String,
    /// Display name of the image
    pub name: String,
}

/// What produced a progress note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Developer progress comment
    Progress,
    /// Fix description (developer or AI marking Good-to-Test)
    Fix,
    /// Tester rejected the fix
    SendBack,
    /// Tester verified the fix
    Verified,
    /// Manager triage remark
    Triage,
    /// Manager status override
    Override,
    /// Free-form remark from batch triage
    Comment,
}

impl NoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::Progress => "progress",
            NoteKind::Fix => "fix",
            NoteKind::SendBack => "send_back",
            NoteKind::Verified => "verified",
            NoteKind::Triage => "triage",
            NoteKind::Override => "override",
            NoteKind::Comment => "comment",
        }
    }

    /// Verb used in the text rendering of the trail.
    fn verb(&self) -> &'static str {
        match self {
            NoteKind::Progress => "Update by",
            NoteKind::Fix => "Fixed by",
            NoteKind::SendBack => "Sent back by",
            NoteKind::Verified => "Verified by",
            NoteKind::Triage => "Triaged by",
            NoteKind::Override => "Status overridden by",
            NoteKind::Comment => "Note by",
        }
    }
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NoteKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "progress" => Ok(NoteKind::Progress),
            "fix" => Ok(NoteKind::Fix),
            "send_back" => Ok(NoteKind::SendBack),
            "verified" => Ok(NoteKind::Verified),
            "triage" => Ok(NoteKind::Triage),
            "override" => Ok(NoteKind::Override),
            "comment" => Ok(NoteKind::Comment),
            _ => Err(format!("Unknown note kind: {}", s)),
        }
    }
}

/// One entry in a bug's progress trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressNote {
    /// Position in the trail, starting at 1
    pub seq: u32,

    /// When the note was recorded
    pub timestamp: DateTime<Utc>,

    /// Canonical identity of the author
    pub author: String,

    /// Role the author acted in
    pub role: Role,

    pub kind: NoteKind,

    pub text: String,
}

impl ProgressNote {
    /// Render as a `[timestamp] Verb by author:` block.
    pub fn render(&self) -> String {
        format!(
            "[{}] {} {}:\n{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.kind.verb(),
            self.author,
            self.text
        )
    }
}

/// A reported defect and its resolution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugReport {
    /// Unique identifier (e.g., "bug-1a2b3c4d")
    pub id: String,

    /// Who filed the report
    pub reporter: Reporter,

    /// Host session the report came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_ref: Option<String>,

    pub title: String,

    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reproduction_steps: Option<String>,

    /// Unset until triage
    pub severity: Option<Severity>,

    /// Unset until triage
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_info: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_context: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_ref: Option<ScreenshotRef>,

    /// Current lifecycle status
    #[serde(default)]
    pub status: BugStatus,

    /// Developer username or AI-agent name currently holding the bug
    pub assigned_to: Option<String>,

    /// When the current assignment started
    pub assigned_at: Option<DateTime<Utc>>,

    /// Append-only progress trail, oldest first
    #[serde(default)]
    pub progress_notes: Vec<ProgressNote>,

    pub reported_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl BugReport {
    /// Create a new report in status New with an empty trail.
    pub fn new(id: String, reporter: Reporter, title: String, description: String) -> Self {
        let created = now();
        Self {
            id,
            reporter,
            session_ref: None,
            title,
            description,
            reproduction_steps: None,
            severity: None,
            category: None,
            system_info: None,
            log_context: None,
            screenshot_ref: None,
            status: BugStatus::New,
            assigned_to: None,
            assigned_at: None,
            progress_notes: Vec::new(),
            reported_at: created,
            updated_at: created,
        }
    }

    /// Append a note to the trail. Existing entries are never touched.
    pub fn append_note(&mut self, author: &Actor, kind: NoteKind, text: impl Into<String>) {
        let seq = self.progress_notes.len() as u32 + 1;
        self.progress_notes.push(ProgressNote {
            seq,
            timestamp: now(),
            author: author.id.clone(),
            role: author.role,
            kind,
            text: text.into(),
        });
    }

    /// Author of the most recent note written in one of `roles`.
    pub fn last_author_in(&self, roles: &[Role]) -> Option<&str> {
        self.progress_notes
            .iter()
            .rev()
            .find(|note| roles.contains(&note.role))
            .map(|note| note.author.as_str())
    }

    /// The trail as one text blob, entries separated by blank lines.
    pub fn render_notes(&self) -> String {
        self.progress_notes
            .iter()
            .map(ProgressNote::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Input for filing a new bug report.
#[derive(Debug, Clone, Default)]
pub struct NewBugReport {
    pub title: String,
    pub description: String,
    pub reproduction_steps: Option<String>,
    pub system_info: Option<String>,
    pub log_context: Option<String>,
    pub screenshot_ref: Option<ScreenshotRef>,
    pub session_ref: Option<String>,
    /// Display name for the reporter; defaults to the actor identity
    pub display_name: Option<String>,
}

impl NewBugReport {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }
}
