//! AI agent commands.
//!
//! Output is always the structured view; agents read notes as entries rather
//! than rendered text.

use super::{Context, Output};
use crate::Result;
use crate::models::{BugReport, BugStatus, Role, Severity};
use crate::storage::{AiBugView, AiQuery};
use serde::Serialize;

#[derive(Serialize)]
pub struct AiBugList {
    pub count: usize,
    pub bugs: Vec<AiBugView>,
}

impl Output for AiBugList {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.bugs.is_empty() {
            return "No bugs for AI agents.".to_string();
        }
        let mut lines = vec![format!("{} bug(s):", self.count)];
        for bug in &self.bugs {
            lines.push(format!(
                "  {} [{}] [{}] {}",
                bug.id,
                bug.status,
                super::severity_label(bug.severity),
                bug.title
            ));
        }
        lines.join("\n")
    }
}

impl Output for AiBugView {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Bugs waiting for an agent, most severe first.
pub fn list(
    ctx: &Context,
    statuses: Vec<BugStatus>,
    severity: Option<Severity>,
    limit: usize,
) -> Result<AiBugList> {
    let mut query = AiQuery {
        severity,
        limit,
        ..Default::default()
    };
    if !statuses.is_empty() {
        query.statuses = statuses;
    }
    let bugs = ctx.open()?.list_for_ai(&query)?;
    Ok(AiBugList {
        count: bugs.len(),
        bugs,
    })
}

pub fn show(ctx: &Context, id: &str) -> Result<AiBugView> {
    Ok(ctx.open()?.get_details(id)?.into())
}

/// Record a fix and hand the bug to testers.
pub fn fix(ctx: &Context, id: &str, notes: &str) -> Result<BugReport> {
    ctx.open()?.ai_fix_bug(&ctx.actor(Role::Ai), id, notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use crate::commands::{ReportArgs, init, manager, report};
    use crate::test_utils::TestEnv;

    fn assigned_bug(env: &TestEnv, title: &str, severity: Severity) -> String {
        let mona = context(env, "mona");
        let id = report(
            &context(env, "alice"),
            ReportArgs {
                title: title.to_string(),
                description: "details".to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id;
        manager::triage(&mona, &id, severity, "Backend", None).unwrap();
        manager::assign(&mona, &[id.clone()], Some("ai_agent_1")).unwrap();
        id
    }

    #[test]
    fn test_list_defaults_to_assigned() {
        let env = TestEnv::new();
        let agent = context(&env, "ai_agent_1");
        init(&agent).unwrap();

        let low = assigned_bug(&env, "Typo", Severity::Low);
        let critical = assigned_bug(&env, "Data loss", Severity::Critical);
        report(
            &agent,
            ReportArgs {
                title: "Still new".to_string(),
                description: "x".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let listed = list(&agent, Vec::new(), None, 10).unwrap();
        let ids: Vec<&str> = listed.bugs.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec![critical.as_str(), low.as_str()]);

        let only_low = list(&agent, Vec::new(), Some(Severity::Low), 10).unwrap();
        assert_eq!(only_low.count, 1);
    }

    #[test]
    fn test_fix_moves_to_testing() {
        let env = TestEnv::new();
        let agent = context(&env, "ai_agent_1");
        init(&agent).unwrap();
        let id = assigned_bug(&env, "Login crash", Severity::Critical);

        let bug = fix(&agent, &id, "Added null check").unwrap();
        assert_eq!(bug.status, BugStatus::GoodToTest);

        let view = show(&agent, &id).unwrap();
        assert_eq!(view.progress_notes.len(), 1);
        assert_eq!(view.progress_notes[0].author, "ai_agent_1");
        assert!(list(&agent, Vec::new(), None, 10).unwrap().bugs.is_empty());
        assert_eq!(list(&agent, vec![BugStatus::GoodToTest], None, 10).unwrap().count, 1);
    }
}
