//! Read-only projections over the bug store.
//!
//! Each role gets its own view: the manager's filtered list and workload
//! dashboard, the developer's own queue, the tester's queue and audit, and a
//! plain structured view for AI agents.

use super::{BUG_COLUMNS, SEVERITY_RANK_SQL, Storage, row_to_bug};
use crate::models::{BugReport, BugStatus, ProgressNote, Role, ScreenshotRef, Severity};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of records `list_for_ai` returns.
pub const DEFAULT_AI_LIMIT: usize = 10;

/// Sort order for [`Storage::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BugSort {
    /// Newest report first
    #[default]
    Reported,
    /// Most recently changed first
    Updated,
}

/// Filter for [`Storage::list`].
#[derive(Debug, Clone, Default)]
pub struct BugFilter {
    pub status: Option<BugStatus>,
    pub severity: Option<Severity>,
    /// Include Resolved and Dismissed bugs when no status is given
    pub include_closed: bool,
    pub sort: BugSort,
    pub limit: Option<usize>,
}

/// Query for [`Storage::list_for_ai`].
#[derive(Debug, Clone)]
pub struct AiQuery {
    pub statuses: Vec<BugStatus>,
    pub severity: Option<Severity>,
    pub limit: usize,
}

impl Default for AiQuery {
    fn default() -> Self {
        Self {
            statuses: vec![BugStatus::Assigned],
            severity: None,
            limit: DEFAULT_AI_LIMIT,
        }
    }
}

/// Bug data for AI agents: plain fields, notes as structured entries.
#[derive(Debug, Clone, Serialize)]
pub struct AiBugView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reproduction_steps: Option<String>,
    pub severity: Option<Severity>,
    pub category: Option<String>,
    pub status: BugStatus,
    pub assigned_to: Option<String>,
    pub system_info: Option<String>,
    pub log_context: Option<String>,
    pub screenshot: Option<ScreenshotRef>,
    pub progress_notes: Vec<ProgressNote>,
    pub reported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BugReport> for AiBugView {
    fn from(bug: BugReport) -> Self {
        Self {
            id: bug.id,
            title: bug.title,
            description: bug.description,
            reproduction_steps: bug.reproduction_steps,
            severity: bug.severity,
            category: bug.category,
            status: bug.status,
            assigned_to: bug.assigned_to,
            system_info: bug.system_info,
            log_context: bug.log_context,
            screenshot: bug.screenshot_ref,
            progress_notes: bug.progress_notes,
            reported_at: bug.reported_at,
            updated_at: bug.updated_at,
        }
    }
}

/// One bug in the workload dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadItem {
    pub id: String,
    pub title: String,
    pub severity: Option<Severity>,
    pub status: BugStatus,
    pub assigned_at: Option<DateTime<Utc>>,
}

/// Open work held by one assignee.
#[derive(Debug, Clone, Serialize)]
pub struct AssigneeWorkload {
    pub assignee: String,
    pub total: usize,
    pub assigned: usize,
    pub in_progress: usize,
    pub good_to_test: usize,
    pub critical: usize,
    pub high: usize,
    pub bugs: Vec<WorkloadItem>,
}

impl AssigneeWorkload {
    fn new(assignee: String) -> Self {
        Self {
            assignee,
            total: 0,
            assigned: 0,
            in_progress: 0,
            good_to_test: 0,
            critical: 0,
            high: 0,
            bugs: Vec::new(),
        }
    }

    fn push(&mut self, item: WorkloadItem) {
        self.total += 1;
        match item.status {
            BugStatus::Assigned => self.assigned += 1,
            BugStatus::InProgress => self.in_progress += 1,
            BugStatus::GoodToTest => self.good_to_test += 1,
            _ => {}
        }
        match item.severity {
            Some(Severity::Critical) => self.critical += 1,
            Some(Severity::High) => self.high += 1,
            _ => {}
        }
        self.bugs.push(item);
    }
}

/// A resolved bug with who fixed and who verified it.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    #[serde(flatten)]
    pub bug: BugReport,
    /// Author of the last tester note
    pub resolved_by: Option<String>,
    /// Author of the last developer or AI note
    pub fixed_by: Option<String>,
}

impl From<BugReport> for AuditEntry {
    fn from(bug: BugReport) -> Self {
        let resolved_by = bug.last_author_in(&[Role::Tester]).map(str::to_string);
        let fixed_by = bug
            .last_author_in(&[Role::Developer, Role::Ai])
            .map(str::to_string);
        Self {
            bug,
            resolved_by,
            fixed_by,
        }
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl Storage {
    /// Run a `SELECT {BUG_COLUMNS} ...` query and attach each bug's notes.
    fn query_bugs(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<BugReport>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, row_to_bug)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|bug| Self::attach_notes(&self.conn, bug))
            .collect()
    }

    /// Full record for one bug.
    pub fn get_details(&self, id: &str) -> Result<BugReport> {
        Self::load_bug(&self.conn, id)
    }

    /// List bugs matching `filter`, newest first.
    ///
    /// Without a status filter, Resolved and Dismissed bugs are left out
    /// unless `include_closed` is set.
    pub fn list(&self, filter: &BugFilter) -> Result<Vec<BugReport>> {
        let mut sql = format!("SELECT {} FROM bug_reports WHERE 1=1", BUG_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        match filter.status {
            Some(status) => {
                sql.push_str(" AND status = ?");
                params_vec.push(Box::new(status.as_str()));
            }
            None if !filter.include_closed => {
                sql.push_str(" AND status NOT IN ('Resolved', 'Dismissed')");
            }
            None => {}
        }
        if let Some(severity) = filter.severity {
            sql.push_str(" AND severity = ?");
            params_vec.push(Box::new(severity.as_str()));
        }

        match filter.sort {
            BugSort::Reported => sql.push_str(" ORDER BY reported_at DESC, rowid DESC"),
            BugSort::Updated => sql.push_str(" ORDER BY updated_at DESC, rowid DESC"),
        }

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params_vec.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let bugs = self.query_bugs(&sql, &params_refs)?;
        tracing::debug!(count = bugs.len(), ?filter, "listed bugs");
        Ok(bugs)
    }

    /// Open bugs assigned to `assignee`, most severe first, then oldest assignment.
    pub fn list_mine(&self, assignee: &str) -> Result<Vec<BugReport>> {
        let sql = format!(
            "SELECT {} FROM bug_reports
             WHERE assigned_to = ?1 AND status NOT IN ('Resolved', 'Dismissed')
             ORDER BY {} ASC, assigned_at ASC, rowid ASC",
            BUG_COLUMNS, SEVERITY_RANK_SQL
        );
        let bugs = self.query_bugs(&sql, &[&assignee])?;
        tracing::debug!(assignee, count = bugs.len(), "listed assigned bugs");
        Ok(bugs)
    }

    /// Open work per assignee, ordered by assignee then severity.
    pub fn workload(&self) -> Result<Vec<AssigneeWorkload>> {
        let sql = format!(
            "SELECT assigned_to, bug_id, title, severity, status, assigned_at
             FROM bug_reports
             WHERE assigned_to IS NOT NULL AND status NOT IN ('Resolved', 'Dismissed')
             ORDER BY assigned_to ASC, {} ASC, assigned_at ASC, rowid ASC",
            SEVERITY_RANK_SQL
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut dashboard: Vec<AssigneeWorkload> = Vec::new();
        for (assignee, id, title, severity, status, assigned_at) in rows {
            let item = WorkloadItem {
                severity: severity
                    .map(|s| s.parse::<Severity>())
                    .transpose()
                    .map_err(Error::Storage)?,
                status: status.parse::<BugStatus>().map_err(Error::Storage)?,
                assigned_at: assigned_at
                    .map(|ts| DateTime::parse_from_rfc3339(&ts).map(|dt| dt.with_timezone(&Utc)))
                    .transpose()
                    .map_err(|e| Error::Storage(format!("Bad timestamp for {}: {}", id, e)))?,
                id,
                title,
            };
            match dashboard.last_mut() {
                Some(entry) if entry.assignee == assignee => entry.push(item),
                _ => {
                    let mut entry = AssigneeWorkload::new(assignee);
                    entry.push(item);
                    dashboard.push(entry);
                }
            }
        }

        tracing::debug!(assignees = dashboard.len(), "computed workload");
        Ok(dashboard)
    }

    /// Bugs awaiting verification, most severe first, then oldest fix first.
    pub fn testing_queue(&self) -> Result<Vec<BugReport>> {
        let sql = format!(
            "SELECT {} FROM bug_reports
             WHERE status = 'Good-to-Test'
             ORDER BY {} ASC, updated_at ASC, rowid ASC",
            BUG_COLUMNS, SEVERITY_RANK_SQL
        );
        let bugs = self.query_bugs(&sql, &[])?;
        tracing::debug!(count = bugs.len(), "listed testing queue");
        Ok(bugs)
    }

    /// Resolved bugs, most recently resolved first.
    pub fn audit_resolved(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let sql = format!(
            "SELECT {} FROM bug_reports
             WHERE status = 'Resolved'
             ORDER BY updated_at DESC, rowid DESC
             LIMIT ?1",
            BUG_COLUMNS
        );
        let limit = limit as i64;
        let entries: Vec<AuditEntry> = self
            .query_bugs(&sql, &[&limit])?
            .into_iter()
            .map(AuditEntry::from)
            .collect();
        tracing::debug!(count = entries.len(), "listed resolved bugs");
        Ok(entries)
    }

    /// Structured bug list for AI agents, most severe first, then newest.
    pub fn list_for_ai(&self, query: &AiQuery) -> Result<Vec<AiBugView>> {
        let statuses = if query.statuses.is_empty() {
            vec![BugStatus::Assigned]
        } else {
            query.statuses.clone()
        };

        let mut sql = format!(
            "SELECT {} FROM bug_reports WHERE status IN ({})",
            BUG_COLUMNS,
            placeholders(statuses.len())
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = statuses
            .iter()
            .map(|s| Box::new(s.as_str()) as Box<dyn rusqlite::ToSql>)
            .collect();

        if let Some(severity) = query.severity {
            sql.push_str(" AND severity = ?");
            params_vec.push(Box::new(severity.as_str()));
        }
        sql.push_str(&format!(
            " ORDER BY {} ASC, reported_at DESC, rowid DESC LIMIT ?",
            SEVERITY_RANK_SQL
        ));
        params_vec.push(Box::new(query.limit as i64));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let views: Vec<AiBugView> = self
            .query_bugs(&sql, &params_refs)?
            .into_iter()
            .map(AiBugView::from)
            .collect();
        tracing::debug!(count = views.len(), "listed bugs for AI");
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBugReport;
    use crate::test_utils::{TestEnv, ai, developer, manager, tester, user};

    fn report(storage: &mut Storage, title: &str) -> String {
        storage
            .report_bug(&user("alice"), NewBugReport::new(title, "details"))
            .unwrap()
            .id
    }

    fn assign(storage: &mut Storage, title: &str, severity: Severity, assignee: &str) -> String {
        let id = report(storage, title);
        storage
            .triage(&manager("mona"), &id, severity, "General", None)
            .unwrap();
        storage
            .assign(&manager("mona"), &[id.clone()], assignee)
            .unwrap();
        id
    }

    fn titles(bugs: &[BugReport]) -> Vec<&str> {
        bugs.iter().map(|b| b.title.as_str()).collect()
    }

    #[test]
    fn test_get_details_unknown_id() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        assert!(matches!(
            storage.get_details("bug-12345678"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_newest_first_and_hides_closed() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        report(&mut storage, "First");
        let second = report(&mut storage, "Second");
        report(&mut storage, "Third");
        storage.dismiss(&manager("mona"), &second, None).unwrap();

        let open = storage.list(&BugFilter::default()).unwrap();
        assert_eq!(titles(&open), vec!["Third", "First"]);

        let all = storage
            .list(&BugFilter {
                include_closed: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&all), vec!["Third", "Second", "First"]);

        let dismissed = storage
            .list(&BugFilter {
                status: Some(BugStatus::Dismissed),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&dismissed), vec!["Second"]);
    }

    #[test]
    fn test_list_filters_by_status_and_severity() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let fixed = assign(&mut storage, "Fixed", Severity::High, "ai_agent_1");
        assign(&mut storage, "Waiting", Severity::Low, "ai_agent_1");
        report(&mut storage, "Fresh");
        storage
            .ai_fix_bug(&ai("ai_agent_1"), &fixed, "patched")
            .unwrap();

        let in_test = storage
            .list(&BugFilter {
                status: Some(BugStatus::GoodToTest),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&in_test), vec!["Fixed"]);
        assert!(in_test.iter().all(|b| b.status == BugStatus::GoodToTest));

        let low = storage
            .list(&BugFilter {
                severity: Some(Severity::Low),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&low), vec!["Waiting"]);

        let limited = storage
            .list(&BugFilter {
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_list_sorted_by_activity() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let older = report(&mut storage, "Older");
        report(&mut storage, "Newer");
        storage
            .set_severity(&manager("mona"), &older, Severity::Medium)
            .unwrap();

        let bugs = storage
            .list(&BugFilter {
                sort: BugSort::Updated,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&bugs), vec!["Older", "Newer"]);
    }

    #[test]
    fn test_list_mine_orders_by_severity() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        assign(&mut storage, "Low one", Severity::Low, "dave");
        assign(&mut storage, "Critical one", Severity::Critical, "dave");
        assign(&mut storage, "Someone else", Severity::Critical, "erin");
        let done = assign(&mut storage, "Medium one", Severity::Medium, "dave");
        storage
            .update_progress(&developer("dave"), &done, BugStatus::InProgress, None)
            .unwrap();

        let mine = storage.list_mine("dave").unwrap();
        assert_eq!(titles(&mine), vec!["Critical one", "Medium one", "Low one"]);
        assert!(storage.list_mine("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_workload_groups_by_assignee() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        assign(&mut storage, "A1", Severity::Low, "dave");
        let a2 = assign(&mut storage, "A2", Severity::Critical, "dave");
        assign(&mut storage, "B1", Severity::High, "ai_agent_1");
        storage
            .update_progress(&developer("dave"), &a2, BugStatus::InProgress, None)
            .unwrap();
        report(&mut storage, "Unassigned");

        let dashboard = storage.workload().unwrap();
        assert_eq!(dashboard.len(), 2);

        let agent = &dashboard[0];
        assert_eq!(agent.assignee, "ai_agent_1");
        assert_eq!(agent.total, 1);
        assert_eq!(agent.high, 1);

        let dave = &dashboard[1];
        assert_eq!(dave.assignee, "dave");
        assert_eq!(dave.total, 2);
        assert_eq!(dave.assigned, 1);
        assert_eq!(dave.in_progress, 1);
        assert_eq!(dave.critical, 1);
        assert_eq!(dave.bugs[0].title, "A2");
        assert_eq!(dave.bugs[1].title, "A1");
    }

    #[test]
    fn test_testing_queue_order() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let agent = ai("ai_agent_1");
        let low = assign(&mut storage, "Low fix", Severity::Low, "ai_agent_1");
        let first_high = assign(&mut storage, "First high fix", Severity::High, "ai_agent_1");
        let second_high = assign(&mut storage, "Second high fix", Severity::High, "ai_agent_1");
        assign(&mut storage, "Not fixed", Severity::Critical, "ai_agent_1");

        storage.ai_fix_bug(&agent, &low, "fix").unwrap();
        storage.ai_fix_bug(&agent, &first_high, "fix").unwrap();
        storage.ai_fix_bug(&agent, &second_high, "fix").unwrap();

        let queue = storage.testing_queue().unwrap();
        assert_eq!(
            titles(&queue),
            vec!["First high fix", "Second high fix", "Low fix"]
        );
    }

    #[test]
    fn test_audit_resolved_names_resolver_and_fixer() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let id = assign(&mut storage, "Audited", Severity::Medium, "ai_agent_1");
        storage
            .ai_fix_bug(&ai("ai_agent_1"), &id, "first attempt")
            .unwrap();
        storage
            .send_back(&tester("tess"), &id, "still failing")
            .unwrap();
        storage
            .ai_fix_bug(&ai("ai_agent_1"), &id, "second attempt")
            .unwrap();
        storage.resolve(&tester("theo"), &id, None).unwrap();
        assign(&mut storage, "Open", Severity::Low, "dave");

        let audit = storage.audit_resolved(20).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].resolved_by.as_deref(), Some("theo"));
        assert_eq!(audit[0].fixed_by.as_deref(), Some("ai_agent_1"));
        assert_eq!(audit[0].bug.progress_notes.len(), 4);

        let json = serde_json::to_value(&audit[0]).unwrap();
        assert_eq!(json["status"], "Resolved");
        assert_eq!(json["resolved_by"], "theo");

        assert!(storage.audit_resolved(0).unwrap().is_empty());
    }

    #[test]
    fn test_list_for_ai_defaults_to_assigned() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        assign(&mut storage, "Low", Severity::Low, "ai_agent_1");
        assign(&mut storage, "Critical", Severity::Critical, "ai_agent_1");
        report(&mut storage, "New one");

        let views = storage.list_for_ai(&AiQuery::default()).unwrap();
        let names: Vec<&str> = views.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(names, vec!["Critical", "Low"]);
        assert!(views.iter().all(|v| v.status == BugStatus::Assigned));
    }

    #[test]
    fn test_list_for_ai_multiple_statuses_severity_and_limit() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let fixed = assign(&mut storage, "Fixed high", Severity::High, "ai_agent_1");
        assign(&mut storage, "Open high", Severity::High, "ai_agent_1");
        assign(&mut storage, "Open low", Severity::Low, "ai_agent_1");
        storage
            .ai_fix_bug(&ai("ai_agent_1"), &fixed, "patched")
            .unwrap();

        let query = AiQuery {
            statuses: vec![BugStatus::Assigned, BugStatus::GoodToTest],
            severity: Some(Severity::High),
            limit: 10,
        };
        let views = storage.list_for_ai(&query).unwrap();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.severity == Some(Severity::High)));
        // Same severity: newest report first
        assert_eq!(views[0].title, "Open high");

        let fixed_view = views.iter().find(|v| v.id == fixed).unwrap();
        assert_eq!(fixed_view.progress_notes[0].text, "patched");

        let limited = storage
            .list_for_ai(&AiQuery {
                limit: 1,
                ..AiQuery::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }
}
