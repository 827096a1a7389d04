//! Developer commands.

use super::{BugList, Context};
use crate::Result;
use crate::models::{BugReport, BugStatus, Role};

/// Move a bug forward, or record a note without changing status.
pub fn progress(ctx: &Context, id: &str, status: BugStatus, note: Option<&str>) -> Result<BugReport> {
    ctx.open()?
        .update_progress(&ctx.actor(Role::Developer), id, status, note)
}

/// Open bugs assigned to `assignee`, or to the caller.
pub fn mine(ctx: &Context, assignee: Option<&str>) -> Result<BugList> {
    let assignee = assignee.unwrap_or(ctx.actor_id.as_str());
    Ok(ctx.open()?.list_mine(assignee)?.into())
}
