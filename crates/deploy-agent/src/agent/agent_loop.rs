//! Agent loop implementation

use std::sync::Arc;

use anyhow::{Context, Result};
use deploy_core::{truncate_chars, Oracle, Searcher};
use tracing::{debug, info, instrument, warn};

use super::prompt::build_prompt;
use super::state::{AgentConfig, AgentState, Decision, Phase, RunOutcome, StopReason, YesNoPurpose};
use crate::action::{Action, ActionKind};
use crate::console::{parse_yes_no, question_prompt, yes_no_prompt, HumanConsole};
use crate::effectors::shell::ShellRunner;
use crate::effectors::{files, human, task_update, web_search, ToolResult};
use crate::progress::Spinner;
use crate::tasks::{TaskList, TaskStatus, TaskStore};

// ANSI colors
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const RED: &str = "\x1b[91m";
const CYAN: &str = "\x1b[96m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Environment facts probed once at startup
#[derive(Debug, Clone)]
pub struct Environment {
    pub cloud_status: String,
    /// Credentials and region were both found
    pub cloud_configured: bool,
    pub search_status: String,
}

/// Everything one run needs, built once at startup
pub struct RunContext {
    pub oracle: Arc<dyn Oracle>,
    pub searcher: Arc<dyn Searcher>,
    pub console: Arc<dyn HumanConsole>,
    pub store: TaskStore,
    pub config: AgentConfig,
    pub environment: Environment,
}

/// The loop controller: owns the run and drives it phase by phase
pub struct AgentLoop {
    ctx: RunContext,
    shell: ShellRunner,
}

impl AgentLoop {
    pub fn new(ctx: RunContext) -> Self {
        let shell = ShellRunner::new(ctx.config.working_dir.clone()).with_timeout(ctx.config.command_timeout);
        Self { ctx, shell }
    }

    /// Run until every task is closed, the agent stops, or the iteration
    /// ceiling is hit. Only oracle and persistence failures are errors.
    #[instrument(skip(self, tasks), fields(tasks = tasks.len()))]
    pub async fn run(&self, tasks: TaskList) -> Result<RunOutcome> {
        info!(
            max_iterations = self.ctx.config.max_iterations,
            max_task_attempts = self.ctx.config.max_task_attempts,
            "Starting agent loop"
        );

        let mut state = AgentState::new(tasks, self.ctx.config.max_task_attempts);
        let mut phase = Phase::SelectTask;

        let stop = loop {
            phase = match phase {
                Phase::Terminate(stop) => break stop,
                other => self.step(&mut state, other).await?,
            };
        };

        info!(
            completed = stop.is_success(),
            iterations = state.iteration,
            reason = %stop.describe(),
            "Agent loop finished"
        );

        if self.ctx.config.verbose {
            let color = if stop.is_success() { GREEN } else { YELLOW };
            println!();
            println!("{}[Stopped]{} {}", color, RESET, stop.describe());
            println!("{}{}{}", DIM, state.tasks.summary(), RESET);
        }

        Ok(state.into_outcome(stop))
    }

    async fn step(&self, state: &mut AgentState, phase: Phase) -> Result<Phase> {
        match phase {
            Phase::SelectTask => self.select_task(state),
            Phase::QueryOracle { current } => self.query_oracle(state, current).await,
            Phase::ParseAction { current, response } => {
                let decision = Decision::from_response(&response);
                debug!(?decision, "Parsed oracle response");
                Ok(Phase::Dispatch { current, decision })
            }
            Phase::Dispatch { current, decision } => self.dispatch(state, current, decision).await,
            Phase::UpdateState { current, result } => self.update_state(state, current, result),
            Phase::AwaitingHumanInput { question } => {
                let reply = self.ctx.console.read_line(&question_prompt(&question)).await?;
                let result = human::answer_text(&reply);
                state.history.push_tool(ActionKind::AskUser, question, &result);
                Ok(Phase::SelectTask)
            }
            Phase::AwaitingHumanYesNo { question, purpose } => {
                let reply = self.ctx.console.read_line(&yes_no_prompt(&question)).await?;
                match purpose {
                    YesNoPurpose::Oracle => {
                        let result = human::answer_yes_no(&reply);
                        state.history.push_tool(ActionKind::AskUserYesNo, question, &result);
                        Ok(Phase::SelectTask)
                    }
                    YesNoPurpose::Escalation { index, attempts } => {
                        self.resolve_escalation(state, index, attempts, parse_yes_no(&reply))
                    }
                }
            }
            Phase::AwaitingHumanAck { message, reminded } => {
                let reply = self.ctx.console.read_line(&human::ack_prompt(&message, reminded)).await?;
                match human::answer_ack(&reply) {
                    Some(result) => {
                        state.history.push_tool(ActionKind::WaitUser, message, &result);
                        Ok(Phase::SelectTask)
                    }
                    None => Ok(Phase::AwaitingHumanAck { message, reminded: true }),
                }
            }
            Phase::Terminate(stop) => Ok(Phase::Terminate(stop)),
        }
    }

    fn select_task(&self, state: &mut AgentState) -> Result<Phase> {
        let Some(current) = state.tasks.current_index() else {
            info!("No open tasks remain");
            return Ok(Phase::Terminate(StopReason::AllTasksComplete));
        };

        let limit = self.ctx.config.max_iterations;
        if state.iteration >= limit {
            warn!(max_iterations = limit, "Agent reached maximum iterations");
            return Ok(Phase::Terminate(StopReason::MaxIterations { limit }));
        }

        state.increment_iteration();
        state.tasks.set_status(current, TaskStatus::InProgress);
        self.ctx.store.save(&state.tasks)?;

        if self.ctx.config.verbose {
            if let Some(task) = state.tasks.get(current) {
                println!();
                println!(
                    "{}[Iteration {}]{} {}{}{}",
                    DIM, state.iteration, RESET, CYAN, task.content, RESET
                );
            }
        }
        debug!(iteration = state.iteration, current, "Selected task");

        Ok(Phase::QueryOracle { current })
    }

    async fn query_oracle(&self, state: &mut AgentState, current: usize) -> Result<Phase> {
        let prompt = build_prompt(
            &state.tasks,
            current,
            &state.history,
            &self.ctx.environment,
            self.ctx.config.history_window,
        );
        debug!(prompt_len = prompt.len(), "Calling oracle");

        let spinner = Spinner::start("Thinking...", self.ctx.config.verbose);
        let response = self.ctx.oracle.complete(&prompt).await;
        spinner.finish();

        let response = response.context("Oracle request failed")?.trim().to_string();
        if self.ctx.config.verbose {
            println!("{}Agent: {}{}", DIM, truncate_chars(&response, 300), RESET);
        }

        state.history.push_assistant(response.clone());
        Ok(Phase::ParseAction { current, response })
    }

    async fn dispatch(&self, state: &mut AgentState, current: usize, decision: Decision) -> Result<Phase> {
        let task_content = state
            .tasks
            .get(current)
            .map(|t| t.content.clone())
            .unwrap_or_default();

        match decision {
            Decision::ImplicitCompletion => {
                info!("Oracle reported completion without a directive");
                Ok(Phase::Terminate(StopReason::ImplicitCompletion))
            }
            Decision::Fallback => {
                debug!("No directive, running task content");
                self.run_shell(state, current, &task_content).await
            }
            Decision::Directive(action) => self.dispatch_action(state, current, action, &task_content).await,
        }
    }

    async fn dispatch_action(
        &self,
        state: &mut AgentState,
        current: usize,
        action: Action,
        task_content: &str,
    ) -> Result<Phase> {
        let working_dir = &self.ctx.config.working_dir;
        debug!(action = %action.kind(), "Dispatching action");

        match action {
            Action::Bash { command } => {
                let command = if command.is_empty() { task_content.to_string() } else { command };
                self.run_shell(state, current, &command).await
            }
            Action::Read { path } => {
                let result = files::read(working_dir, &path);
                self.record(state, ActionKind::Read, path, result);
                Ok(Phase::SelectTask)
            }
            Action::Ls { path } => {
                let result = files::ls(working_dir, &path);
                self.record(state, ActionKind::Ls, path, result);
                Ok(Phase::SelectTask)
            }
            Action::WebSearch { query } => {
                let spinner = Spinner::start("Searching...", self.ctx.config.verbose);
                let result = web_search(self.ctx.searcher.as_ref(), &query).await;
                spinner.finish();
                self.record(state, ActionKind::WebSearch, query, result);
                Ok(Phase::SelectTask)
            }
            Action::AskUser { question } => {
                match human::auto_answer(&question, self.ctx.environment.cloud_configured) {
                    Some(result) => {
                        debug!("Answered configuration question from the probe");
                        self.record(state, ActionKind::AskUser, question, result);
                        Ok(Phase::SelectTask)
                    }
                    None => Ok(Phase::AwaitingHumanInput { question }),
                }
            }
            Action::AskUserYesNo { question } => Ok(Phase::AwaitingHumanYesNo {
                question,
                purpose: YesNoPurpose::Oracle,
            }),
            Action::WaitUser { message } => Ok(Phase::AwaitingHumanAck {
                message,
                reminded: false,
            }),
            Action::UpdateTask(update) => {
                let (result, changed) = task_update::apply(&mut state.tasks, update);
                if changed {
                    self.ctx.store.save(&state.tasks)?;
                }
                let input = update
                    .map(|u| format!("{} {}", u.position, u.status))
                    .unwrap_or_default();
                self.record(state, ActionKind::UpdateTask, input, result);
                Ok(Phase::SelectTask)
            }
            Action::Done { message } => {
                info!(message = %message, "Agent reported done");
                Ok(Phase::Terminate(StopReason::AgentDone { message }))
            }
        }
    }

    async fn run_shell(&self, state: &mut AgentState, current: usize, command: &str) -> Result<Phase> {
        if self.ctx.config.verbose {
            println!("{}$ {}{}", CYAN, command, RESET);
        }
        let result = self.shell.run(command).await;
        if let Some(error) = &result.error {
            debug!(exit_code = ?result.exit_code, error = %error, "Command failed");
        }
        if self.ctx.config.verbose {
            println!("{}{}{}", DIM, truncate_chars(&result.output, 800), RESET);
        }
        state.history.push_tool(ActionKind::Bash, command, &result);
        Ok(Phase::UpdateState { current, result })
    }

    fn update_state(&self, state: &mut AgentState, current: usize, result: ToolResult) -> Result<Phase> {
        let content = state
            .tasks
            .get(current)
            .map(|t| t.content.clone())
            .unwrap_or_default();

        if result.success {
            state.tasks.set_status(current, TaskStatus::Completed);
            self.ctx.store.save(&state.tasks)?;
            info!(task = %content, "Task completed");
            if self.ctx.config.verbose {
                println!("{}✓ Task complete{}", GREEN, RESET);
            }
            return Ok(Phase::SelectTask);
        }

        state.tasks.set_status(current, TaskStatus::Pending);
        let verdict = state.governor.record_failure(&content);
        self.ctx.store.save(&state.tasks)?;

        if self.ctx.config.verbose {
            println!("{}✗ Task failed (attempt {}){}", RED, verdict.attempts, RESET);
        }

        if verdict.escalate {
            return Ok(Phase::AwaitingHumanYesNo {
                question: format!("Task failed {} times. Continue trying?", verdict.attempts),
                purpose: YesNoPurpose::Escalation {
                    index: current,
                    attempts: verdict.attempts,
                },
            });
        }
        Ok(Phase::SelectTask)
    }

    fn resolve_escalation(&self, state: &mut AgentState, index: usize, attempts: u32, keep_trying: bool) -> Result<Phase> {
        if keep_trying {
            info!(attempts, "Human chose to keep retrying");
            return Ok(Phase::SelectTask);
        }

        let content = state
            .tasks
            .get(index)
            .map(|t| t.content.clone())
            .unwrap_or_default();
        state.tasks.set_status(index, TaskStatus::Failed);
        self.ctx.store.save(&state.tasks)?;
        warn!(task = %content, attempts, "Task marked failed after escalation");
        Ok(Phase::Terminate(StopReason::Declined { task: content }))
    }

    fn record(&self, state: &mut AgentState, kind: ActionKind, input: String, result: ToolResult) {
        if self.ctx.config.verbose {
            let color = if result.success { GREEN } else { YELLOW };
            println!("{}[Tool: {}]{} {}", color, kind, RESET, truncate_chars(&result.output, 300));
        }
        state.history.push_tool(kind, input, &result);
    }
}
