//! Agent state management

use deploy_core::{truncate_chars, LoopConfig};
use std::path::PathBuf;
use std::time::Duration;

use super::governor::RetryGovernor;
use crate::action::{parse_action, Action, ActionKind};
use crate::effectors::ToolResult;
use crate::tasks::TaskList;

/// Substrings that end the run when the oracle gives no directive
pub const COMPLETION_PHRASES: [&str; 2] = ["deployment complete", "all done"];

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum oracle calls before stopping
    pub max_iterations: usize,
    /// Failures of one task before the human is asked whether to continue
    pub max_task_attempts: u32,
    /// History entries shown to the oracle each iteration
    pub history_window: usize,
    /// Directory commands run in and relative paths resolve against
    pub working_dir: PathBuf,
    /// Kill shell commands after this long
    pub command_timeout: Option<Duration>,
    /// Whether to print progress to stdout
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_task_attempts: 100,
            history_window: 5,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            command_timeout: None,
            verbose: true,
        }
    }
}

impl AgentConfig {
    pub fn from_loop_config(config: &LoopConfig, working_dir: PathBuf) -> Self {
        Self {
            max_iterations: config.max_iterations,
            max_task_attempts: config.max_task_attempts,
            history_window: config.history_window,
            working_dir,
            command_timeout: config.command_timeout_secs.map(Duration::from_secs),
            verbose: true,
        }
    }

    #[cfg(test)]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    #[cfg(test)]
    pub fn with_max_task_attempts(mut self, max: u32) -> Self {
        self.max_task_attempts = max;
        self
    }

    #[cfg(test)]
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    #[cfg(test)]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub tool_name: Option<ActionKind>,
    pub tool_result: Option<String>,
}

/// Append-only record of oracle replies and effector results
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.entries.push(HistoryEntry {
            role: Role::Assistant,
            content: content.into(),
            tool_name: None,
            tool_result: None,
        });
    }

    pub fn push_tool(&mut self, tool: ActionKind, input: impl Into<String>, result: &ToolResult) {
        self.entries.push(HistoryEntry {
            role: Role::Tool,
            content: input.into(),
            tool_name: Some(tool),
            tool_result: Some(result.output.clone()),
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The last `n` entries, oldest first
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }

    pub fn last_tool_result(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|e| e.tool_result.as_deref())
    }

    /// One line per entry for the prompt, each capped at `max_chars`
    pub fn render_recent(&self, n: usize, max_chars: usize) -> String {
        self.recent(n)
            .iter()
            .map(|e| {
                let label = match e.tool_name {
                    Some(tool) => format!("{} ({})", e.role.as_str(), tool),
                    None => e.role.as_str().to_string(),
                };
                format!("{}: {}", label, truncate_chars(&e.content, max_chars))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What the loop does with one oracle reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Directive(Action),
    /// No directive, but the reply claims the work is finished
    ImplicitCompletion,
    /// No directive: run the current task's content literally
    Fallback,
}

impl Decision {
    pub fn from_response(response: &str) -> Self {
        if let Some(action) = parse_action(response) {
            return Decision::Directive(action);
        }
        if COMPLETION_PHRASES.iter().any(|p| response.contains(p)) {
            Decision::ImplicitCompletion
        } else {
            Decision::Fallback
        }
    }
}

/// Why a yes/no question is being asked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YesNoPurpose {
    /// `ask_user_yesno:` from the oracle
    Oracle,
    /// The retry ceiling was crossed for the task at `index`
    Escalation { index: usize, attempts: u32 },
}

/// Loop phases. Each step consumes one phase and yields the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    SelectTask,
    QueryOracle { current: usize },
    ParseAction { current: usize, response: String },
    Dispatch { current: usize, decision: Decision },
    /// A shell command finished for the task at `current`
    UpdateState { current: usize, result: ToolResult },
    AwaitingHumanInput { question: String },
    AwaitingHumanYesNo { question: String, purpose: YesNoPurpose },
    AwaitingHumanAck { message: String, reminded: bool },
    Terminate(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    AllTasksComplete,
    AgentDone { message: String },
    ImplicitCompletion,
    /// The human declined to keep retrying this task
    Declined { task: String },
    MaxIterations { limit: usize },
}

impl StopReason {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StopReason::AllTasksComplete | StopReason::AgentDone { .. } | StopReason::ImplicitCompletion
        )
    }

    pub fn describe(&self) -> String {
        match self {
            StopReason::AllTasksComplete => "all tasks completed".to_string(),
            StopReason::AgentDone { message } if message.is_empty() => "agent reported done".to_string(),
            StopReason::AgentDone { message } => format!("agent reported done: {}", message),
            StopReason::ImplicitCompletion => "agent reported the deployment complete".to_string(),
            StopReason::Declined { task } => format!("stopped retrying task: {}", task),
            StopReason::MaxIterations { limit } => format!("reached maximum iterations ({})", limit),
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub completed: bool,
    pub stop: StopReason,
    pub iterations: usize,
    pub history: History,
    pub tasks: TaskList,
}

/// State of the agent during execution
#[derive(Debug)]
pub struct AgentState {
    pub tasks: TaskList,
    pub history: History,
    /// Oracle calls made so far
    pub iteration: usize,
    pub governor: RetryGovernor,
}

impl AgentState {
    pub fn new(tasks: TaskList, max_task_attempts: u32) -> Self {
        Self {
            tasks,
            history: History::default(),
            iteration: 0,
            governor: RetryGovernor::new(max_task_attempts),
        }
    }

    pub fn increment_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn into_outcome(self, stop: StopReason) -> RunOutcome {
        RunOutcome {
            completed: stop.is_success(),
            stop,
            iterations: self.iteration,
            history: self.history,
            tasks: self.tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_builder() {
        let config = AgentConfig::default()
            .with_max_iterations(7)
            .with_max_task_attempts(2)
            .with_working_dir(PathBuf::from("/tmp"))
            .with_verbose(false);
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.max_task_attempts, 2);
        assert_eq!(config.working_dir, PathBuf::from("/tmp"));
        assert!(!config.verbose);
    }

    #[test]
    fn test_from_loop_config() {
        let mut loop_config = LoopConfig::default();
        loop_config.command_timeout_secs = Some(30);
        let config = AgentConfig::from_loop_config(&loop_config, PathBuf::from("/srv"));
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.max_task_attempts, 100);
        assert_eq!(config.command_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_decision_rules() {
        assert_eq!(
            Decision::from_response("bash: echo ok"),
            Decision::Directive(Action::Bash { command: "echo ok".to_string() })
        );
        assert_eq!(
            Decision::from_response("The deployment complete message was printed."),
            Decision::ImplicitCompletion
        );
        assert_eq!(Decision::from_response("all done here"), Decision::ImplicitCompletion);
        assert_eq!(Decision::from_response("Thinking..."), Decision::Fallback);
        // A directive always wins over the phrase heuristic
        assert_eq!(
            Decision::from_response("all done\nbash: exit 1"),
            Decision::Directive(Action::Bash { command: "exit 1".to_string() })
        );
    }

    #[test]
    fn test_history_window() {
        let mut history = History::default();
        for i in 0..8 {
            history.push_assistant(format!("reply {}", i));
        }
        history.push_tool(ActionKind::Bash, "ls", &ToolResult::success("Exit code: 0"));

        let recent = history.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "reply 4");
        assert_eq!(history.len(), 9);
        assert_eq!(history.last_tool_result(), Some("Exit code: 0"));

        let rendered = history.render_recent(2, 3);
        assert_eq!(rendered, "assistant: rep\ntool (bash): ls");
    }

    #[test]
    fn test_stop_reasons() {
        assert!(StopReason::AllTasksComplete.is_success());
        assert!(StopReason::ImplicitCompletion.is_success());
        assert!(!StopReason::MaxIterations { limit: 50 }.is_success());
        assert!(!StopReason::Declined { task: "x".into() }.is_success());

        let outcome = AgentState::new(TaskList::default(), 3).into_outcome(StopReason::AgentDone {
            message: "deployed".into(),
        });
        assert!(outcome.completed);
        assert_eq!(outcome.iterations, 0);
    }
}
