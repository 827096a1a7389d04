//! Lifecycle edge table for bug reports.
//!
//! Every regular status change is checked here before it reaches storage.
//! The manager override (`Storage::set_status`) is the only write that
//! bypasses this table, and it is audited with its own note.

use super::{BugStatus, Role};
use crate::{Error, Result};

/// One legal edge: `from` (None = any status) to `to`, for the listed roles.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub from: Option<BugStatus>,
    pub to: BugStatus,
    pub roles: &'static [Role],
    pub trigger: &'static str,
}

/// The full edge table.
pub const EDGES: &[Edge] = &[
    Edge {
        from: Some(BugStatus::New),
        to: BugStatus::Triaged,
        roles: &[Role::Manager],
        trigger: "triage",
    },
    Edge {
        from: Some(BugStatus::Triaged),
        to: BugStatus::Assigned,
        roles: &[Role::Manager],
        trigger: "assignment",
    },
    Edge {
        from: Some(BugStatus::Assigned),
        to: BugStatus::InProgress,
        roles: &[Role::Developer],
        trigger: "progress update",
    },
    Edge {
        from: Some(BugStatus::InProgress),
        to: BugStatus::GoodToTest,
        roles: &[Role::Developer, Role::Ai],
        trigger: "fix complete",
    },
    Edge {
        from: Some(BugStatus::Assigned),
        to: BugStatus::GoodToTest,
        roles: &[Role::Ai],
        trigger: "direct fix",
    },
    Edge {
        from: Some(BugStatus::GoodToTest),
        to: BugStatus::Resolved,
        roles: &[Role::Tester],
        trigger: "verify pass",
    },
    Edge {
        from: Some(BugStatus::GoodToTest),
        to: BugStatus::Assigned,
        roles: &[Role::Tester],
        trigger: "send back",
    },
    Edge {
        from: None,
        to: BugStatus::Dismissed,
        roles: &[Role::Manager],
        trigger: "dismiss",
    },
];

/// Returns true if `role` may move a bug from `from` to `to`.
pub fn is_allowed(from: BugStatus, to: BugStatus, role: Role) -> bool {
    EDGES.iter().any(|edge| {
        edge.to == to && edge.roles.contains(&role) && edge.from.is_none_or(|f| f == from)
    })
}

/// Statuses from which `role` may move a bug into `to`.
pub fn sources_for(to: BugStatus, role: Role) -> Vec<BugStatus> {
    let mut sources = Vec::new();
    for edge in EDGES
        .iter()
        .filter(|edge| edge.to == to && edge.roles.contains(&role))
    {
        match edge.from {
            Some(from) => {
                if !sources.contains(&from) {
                    sources.push(from);
                }
            }
            None => return BugStatus::all().to_vec(),
        }
    }
    // Keep lifecycle order regardless of table order
    sources.sort_by_key(|status| {
        BugStatus::all()
            .iter()
            .position(|s| s == status)
            .unwrap_or(usize::MAX)
    });
    sources
}

/// Validate a regular transition for bug `id`.
pub fn check_transition(id: &str, from: BugStatus, to: BugStatus, role: Role) -> Result<()> {
    if is_allowed(from, to, role) {
        return Ok(());
    }
    Err(Error::InvalidTransition {
        id: id.to_string(),
        from,
        to,
        role,
        expected: sources_for(to, role),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_edges() {
        assert!(is_allowed(BugStatus::New, BugStatus::Triaged, Role::Manager));
        assert!(is_allowed(BugStatus::Triaged, BugStatus::Assigned, Role::Manager));
        assert!(is_allowed(BugStatus::Assigned, BugStatus::InProgress, Role::Developer));
        assert!(is_allowed(BugStatus::InProgress, BugStatus::GoodToTest, Role::Developer));
        assert!(is_allowed(BugStatus::InProgress, BugStatus::GoodToTest, Role::Ai));
        assert!(is_allowed(BugStatus::Assigned, BugStatus::GoodToTest, Role::Ai));
        assert!(is_allowed(BugStatus::GoodToTest, BugStatus::Resolved, Role::Tester));
        assert!(is_allowed(BugStatus::GoodToTest, BugStatus::Assigned, Role::Tester));
    }

    #[test]
    fn test_role_gating() {
        // Only AI may skip In Progress
        assert!(!is_allowed(BugStatus::Assigned, BugStatus::GoodToTest, Role::Developer));
        assert!(!is_allowed(BugStatus::New, BugStatus::Triaged, Role::Developer));
        assert!(!is_allowed(BugStatus::GoodToTest, BugStatus::Resolved, Role::Developer));
        assert!(!is_allowed(BugStatus::GoodToTest, BugStatus::Resolved, Role::Manager));
        assert!(!is_allowed(BugStatus::New, BugStatus::Dismissed, Role::Tester));
    }

    #[test]
    fn test_dismiss_from_any_status() {
        for status in BugStatus::all() {
            assert!(is_allowed(*status, BugStatus::Dismissed, Role::Manager));
        }
    }

    #[test]
    fn test_no_edges_leave_resolved() {
        for to in BugStatus::all() {
            if *to == BugStatus::Dismissed {
                continue;
            }
            for role in [Role::User, Role::Manager, Role::Developer, Role::Ai, Role::Tester] {
                assert!(!is_allowed(BugStatus::Resolved, *to, role));
            }
        }
    }

    #[test]
    fn test_check_transition_reports_expected_sources() {
        let err = check_transition("bug-0000abcd", BugStatus::New, BugStatus::GoodToTest, Role::Ai)
            .unwrap_err();
        match err {
            Error::InvalidTransition { from, expected, .. } => {
                assert_eq!(from, BugStatus::New);
                assert_eq!(expected, vec![BugStatus::Assigned, BugStatus::InProgress]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sources_for_unreachable_is_empty() {
        assert!(sources_for(BugStatus::Resolved, Role::User).is_empty());
    }
}
