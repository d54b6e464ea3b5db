//! `update_task:` effector

use tracing::{debug, info};

use super::ToolResult;
use crate::action::TaskUpdate;
use crate::tasks::TaskList;

/// Apply an oracle-requested status change. Returns the tool result and
/// whether the list changed (and so must be saved).
pub fn apply(tasks: &mut TaskList, update: Option<TaskUpdate>) -> (ToolResult, bool) {
    let Some(update) = update else {
        debug!("Ignoring malformed update_task");
        return (
            ToolResult::error("Ignored update_task: expected '<index> [status]'"),
            false,
        );
    };

    let Some(index) = update
        .position
        .checked_sub(1)
        .filter(|&index| index < tasks.len())
    else {
        debug!(position = update.position, len = tasks.len(), "Ignoring out-of-range update_task");
        return (
            ToolResult::error(format!(
                "Ignored update_task: no task at position {}",
                update.position
            )),
            false,
        );
    };

    let before = tasks.clone();
    tasks.set_status(index, update.status);
    let changed = *tasks != before;
    let stored = tasks.get(index).map(|t| t.status).unwrap_or(update.status);

    if stored != update.status {
        debug!(
            position = update.position,
            requested = %update.status,
            stored = %stored,
            "update_task overridden by ordering"
        );
        return (
            ToolResult::error(format!(
                "Task {} stays {}: only the first open task can be in_progress",
                update.position, stored
            )),
            changed,
        );
    }

    info!(position = update.position, status = %update.status, "Task updated by agent");
    (
        ToolResult::success(format!("Task {} set to {}", update.position, stored)),
        changed,
    )
}
