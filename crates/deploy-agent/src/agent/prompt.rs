//! Per-iteration oracle prompt

use deploy_core::truncate_chars;
use std::fmt::Write;

use super::agent_loop::Environment;
use super::state::History;
use crate::action::ActionKind;
use crate::tasks::{TaskList, TaskStatus};

const HISTORY_ENTRY_CHARS: usize = 200;
const LAST_OUTPUT_CHARS: usize = 800;

fn menu_line(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Bash => "bash: <command> - run a shell command for the current task",
        ActionKind::Read => "read: <path> - read a file or list a directory",
        ActionKind::Ls => "ls: <path> - list a directory, skipping build output",
        ActionKind::WebSearch => "websearch: <query> - search the web for current documentation",
        ActionKind::AskUser => "ask_user: <question> - ask the user a free-text question",
        ActionKind::AskUserYesNo => "ask_user_yesno: <question> - ask the user a yes/no question",
        ActionKind::WaitUser => "wait_user: <instructions> - wait for the user to do a manual step",
        ActionKind::UpdateTask => "update_task: <number> <status> - set a task's status",
        ActionKind::Done => "done: <summary> - the whole deployment is finished",
    }
}

/// Assemble the prompt for one oracle call
pub fn build_prompt(
    tasks: &TaskList,
    current: usize,
    history: &History,
    environment: &Environment,
    history_window: usize,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "You are a deployment agent working through a task list.");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", environment.cloud_status);
    let _ = writeln!(out, "{}", environment.search_status);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Tasks: {} total, {} completed, {} pending, {} failed",
        tasks.len(),
        tasks.count(TaskStatus::Completed),
        tasks.count(TaskStatus::Pending) + tasks.count(TaskStatus::InProgress),
        tasks.count(TaskStatus::Failed),
    );

    if let Some(task) = tasks.get(current) {
        let _ = writeln!(out, "Current task ({}): {}", current + 1, task.content);
    }

    let open: Vec<_> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.status.is_open())
        .collect();
    if !open.is_empty() {
        let _ = writeln!(out, "\nPending tasks:");
        for (i, task) in open {
            let marker = if i == current { " (current)" } else { "" };
            let _ = writeln!(out, "{}. {}{}", i + 1, task.content, marker);
        }
    }

    if !history.is_empty() {
        let _ = writeln!(out, "\nRecent history:");
        let _ = writeln!(out, "{}", history.render_recent(history_window, HISTORY_ENTRY_CHARS));
    }

    if let Some(output) = history.last_tool_result() {
        let _ = writeln!(out, "\nLast tool output:");
        let _ = writeln!(out, "{}", truncate_chars(output, LAST_OUTPUT_CHARS));
    }

    let _ = writeln!(out, "\nRespond with exactly one action line:");
    for (i, kind) in ActionKind::ALL.into_iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, menu_line(kind));
    }
    let _ = writeln!(
        out,
        "\nIf you give no action line, the current task is run as a shell command."
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effectors::ToolResult;
    use crate::tasks::Task;

    fn environment() -> Environment {
        Environment {
            cloud_status: "AWS config not detected (no credentials or region found).".to_string(),
            cloud_configured: false,
            search_status: "OpenAI websearch unavailable (set OPENAI_API_KEY).".to_string(),
        }
    }

    #[test]
    fn test_prompt_sections() {
        let tasks = TaskList::new(vec![
            Task::new("npm run build").with_status(TaskStatus::Completed),
            Task::new("aws s3 sync ./dist s3://site").with_status(TaskStatus::InProgress),
            Task::new("aws cloudfront create-invalidation"),
        ]);
        let mut history = History::default();
        history.push_assistant("bash: npm run build");
        history.push_tool(
            ActionKind::Bash,
            "npm run build",
            &ToolResult::success("Exit code: 0\nOutput: built"),
        );

        let prompt = build_prompt(&tasks, 1, &history, &environment(), 5);
        assert!(prompt.contains("AWS config not detected"));
        assert!(prompt.contains("OpenAI websearch unavailable"));
        assert!(prompt.contains("Tasks: 3 total, 1 completed, 2 pending, 0 failed"));
        assert!(prompt.contains("Current task (2): aws s3 sync ./dist s3://site"));
        assert!(prompt.contains("Pending tasks:\n2. aws s3 sync ./dist s3://site (current)\n3. aws cloudfront create-invalidation\n"));
        assert!(!prompt.contains("1. npm run build"));
        assert!(prompt.contains("tool (bash): npm run build"));
        assert!(prompt.contains("Exit code: 0\nOutput: built"));
        assert!(prompt.contains("9. done: <summary>"));
    }

    #[test]
    fn test_prompt_truncates_long_output() {
        let tasks = TaskList::new(vec![Task::new("cat big.log")]);
        let mut history = History::default();
        history.push_tool(ActionKind::Bash, "cat big.log", &ToolResult::success("x".repeat(5000)));

        let prompt = build_prompt(&tasks, 0, &history, &environment(), 5);
        assert!(prompt.contains(&"x".repeat(800)));
        assert!(!prompt.contains(&"x".repeat(801)));
    }

    #[test]
    fn test_pending_list_includes_current_task() {
        let tasks = TaskList::new(vec![Task::new("echo current-task"), Task::new("echo next")]);
        let prompt = build_prompt(&tasks, 0, &History::default(), &environment(), 5);

        let pending = prompt.split("Pending tasks:\n").nth(1).unwrap();
        assert!(pending.starts_with("1. echo current-task (current)\n2. echo next\n"));
    }
}
