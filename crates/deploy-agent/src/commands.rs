//! Command implementations

use anyhow::{Context, Result};
use deploy_core::{CloudStatus, Config, OllamaClient, Oracle, ProbeInputs, Searcher, WebSearchClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::{AgentConfig, AgentLoop, Environment, RunContext, StopReason};
use crate::console::{ask_yes_no, is_interactive, HumanConsole, TerminalConsole};
use crate::planning::{self, Requirements};
use crate::progress::Spinner;
use crate::tasks::{TaskList, TaskStatus, TaskStore};

// ANSI color codes
const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

fn print_status(ok: bool, msg: &str) {
    let icon = if ok {
        format!("{}✓{}", GREEN, RESET)
    } else {
        format!("{}✗{}", RED, RESET)
    };
    println!("  {} {}", icon, msg);
}

fn print_section(title: &str, body: &str) {
    println!("\n{}", "=".repeat(50));
    println!("{}=== {} ==={}\n", BOLD, title, RESET);
    println!("{}", body);
}

fn task_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "[ ]",
        TaskStatus::InProgress => "[~]",
        TaskStatus::Completed => "[x]",
        TaskStatus::Failed => "[!]",
    }
}

fn print_tasks(tasks: &TaskList) {
    for (i, task) in tasks.iter().enumerate() {
        println!("  {} {}. {}", task_marker(task.status), i + 1, task.content);
    }
}

/// Options for the `deploy` command
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub path: Option<PathBuf>,
    pub resume: bool,
    pub max_iterations: Option<usize>,
    pub config: Option<PathBuf>,
}

fn project_dir(path: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match path {
        Some(p) => p,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("Project directory not found: {}", dir.display()))
}

/// An explicit `--config` file wins over discovery; env overrides apply to both
fn load_config(dir: &Path, explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            Ok(config)
        }
        None => Config::load(dir).context("Failed to load deploy-agent.toml"),
    }
}

fn probe_environment(config: &Config) -> (Environment, WebSearchClient) {
    let cloud = CloudStatus::probe(&ProbeInputs::from_environment());
    let searcher = WebSearchClient::from_config(&config.search);
    let environment = Environment {
        cloud_status: cloud.status_line(),
        cloud_configured: cloud.is_configured(),
        search_status: searcher.status(),
    };
    (environment, searcher)
}

/// Plan a new deployment. `None` when the human rejects the architecture.
async fn plan(dir: &Path, oracle: &dyn Oracle, console: &dyn HumanConsole) -> Result<Option<TaskList>> {
    let requirements = Requirements::gather(console).await?;

    println!("\n{}Analyzing:{} {}\n", DIM, RESET, dir.display());
    let analysis = planning::analyze_codebase(dir)?;
    println!("{}", analysis);

    let spinner = Spinner::start("Generating architecture...", true);
    let architecture = planning::propose_architecture(oracle, &requirements, &analysis).await;
    spinner.finish();
    let architecture = architecture?;
    print_section("PROPOSED ARCHITECTURE", &architecture);

    let spinner = Spinner::start("Calculating costs...", true);
    let cost = planning::estimate_cost(oracle, &architecture).await;
    spinner.finish();
    print_section("COST ESTIMATION", &cost?);

    if !ask_yes_no(console, "Approve this architecture?").await? {
        println!("Not approved. Exiting.");
        info!("Architecture rejected");
        return Ok(None);
    }

    let spinner = Spinner::start("Generating deployment tasks...", true);
    let tasks = planning::generate_tasks(oracle, &architecture).await;
    spinner.finish();
    Ok(Some(tasks))
}

/// Plan (or resume) and run a deployment
pub async fn deploy(options: DeployOptions) -> Result<()> {
    let dir = project_dir(options.path)?;
    let mut config = load_config(&dir, options.config.as_deref())?;
    if let Some(max) = options.max_iterations {
        config.agent.max_iterations = max;
    }

    println!("\n{}=== Deployment Agent ==={}\n", BOLD, RESET);
    println!("Project: {}\n", dir.display());

    let (environment, searcher) = probe_environment(&config);
    println!("{}\n", environment.cloud_status);
    println!("{}\n", environment.search_status);

    let client = OllamaClient::from_config(&config.oracle)?;
    if !client.health_check().await {
        warn!(url = %config.oracle.base_url, "Oracle health check failed");
        println!(
            "{}Warning:{} oracle not reachable at {} (model {})",
            YELLOW,
            RESET,
            config.oracle.base_url,
            client.model()
        );
    }
    if !is_interactive() {
        debug!("stdin is not a terminal, answers will be read from the pipe");
    }

    let oracle: Arc<dyn Oracle> = Arc::new(client);
    let console: Arc<dyn HumanConsole> = Arc::new(TerminalConsole::new());
    let store = TaskStore::new(config.task_file_in(&dir));

    let resumed = if options.resume {
        let tasks = store.load();
        if tasks.has_open_tasks() {
            println!("{}Resuming:{} {}", DIM, RESET, tasks.summary());
            Some(tasks)
        } else {
            println!("No open tasks in {}; planning a new deployment.", store.path().display());
            None
        }
    } else {
        None
    };

    let tasks = match resumed {
        Some(tasks) => tasks,
        None => match plan(&dir, oracle.as_ref(), console.as_ref()).await? {
            Some(tasks) => tasks,
            None => return Ok(()),
        },
    };

    println!("\nTasks to execute:");
    print_tasks(&tasks);
    store.save(&tasks)?;

    println!("\n{}Starting agent loop...{}", CYAN, RESET);
    let agent = AgentLoop::new(RunContext {
        oracle: oracle.clone(),
        searcher: Arc::new(searcher),
        console,
        store,
        config: AgentConfig::from_loop_config(&config.agent, dir),
        environment,
    });
    let outcome = agent.run(tasks).await?;

    if outcome.completed {
        let spinner = Spinner::start("Summarizing deployment...", true);
        let summary = planning::summarize_deployment(oracle.as_ref(), &outcome.tasks, &outcome.history).await;
        spinner.finish();
        match summary {
            Ok(summary) => print_section("DEPLOYMENT SUMMARY", &summary),
            Err(e) => {
                warn!(error = %e, "Deployment summary failed");
                println!("{}Summary unavailable: {:#}{}", YELLOW, e, RESET);
            }
        }
    }

    let (color, label) = if outcome.completed {
        (GREEN, "DEPLOYMENT FINISHED")
    } else {
        (YELLOW, "DEPLOYMENT STOPPED")
    };
    println!("\n{}{}=== {} ==={}", BOLD, color, label, RESET);
    println!("{}\n", run_report(&outcome.stop, outcome.iterations, &outcome.tasks));
    Ok(())
}

fn run_report(stop: &StopReason, iterations: usize, tasks: &TaskList) -> String {
    format!(
        "Stopped: {} after {} iteration{}. {}",
        stop.describe(),
        iterations,
        if iterations == 1 { "" } else { "s" },
        tasks.summary()
    )
}

/// Status lines for the probed cloud and search backends
fn environment_checks(environment: &Environment, searcher: &WebSearchClient) -> [(bool, String); 2] {
    [
        (environment.cloud_configured, environment.cloud_status.clone()),
        (searcher.is_available(), environment.search_status.clone()),
    ]
}

/// Show environment probes and the persisted task list
pub async fn status(path: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let dir = project_dir(path)?;
    let config = load_config(&dir, config_path.as_deref())?;
    let (environment, searcher) = probe_environment(&config);

    println!("{}Environment{}", BOLD, RESET);
    for (ok, line) in environment_checks(&environment, &searcher) {
        print_status(ok, &line);
    }

    let client = OllamaClient::from_config(&config.oracle)?;
    print_status(
        client.health_check().await,
        &format!("Oracle: {} (model {})", config.oracle.base_url, client.model()),
    );

    let store = TaskStore::new(config.task_file_in(&dir));
    let tasks = store.load();
    println!("\n{}Tasks{} {}({}){}", BOLD, RESET, DIM, store.path().display(), RESET);
    if tasks.is_empty() {
        println!("  {}No tasks recorded{}", YELLOW, RESET);
    } else {
        print_tasks(&tasks);
        println!("\n  {}", tasks.summary());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_config_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        std::fs::write(&path, "[agent]\nmax_iterations = 12\ntask_file = \"plan.json\"\n").unwrap();

        let config = load_config(temp.path(), Some(&path)).unwrap();
        assert_eq!(config.agent.max_iterations, 12);
        assert_eq!(config.task_file_in(temp.path()), temp.path().join("plan.json"));
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(load_config(temp.path(), Some(&temp.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_discovered_config_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), None).unwrap();
        assert_eq!(config.agent.max_task_attempts, 100);
    }

    #[test]
    fn test_project_dir() {
        let temp = TempDir::new().unwrap();
        let dir = project_dir(Some(temp.path().to_path_buf())).unwrap();
        assert!(dir.is_absolute());
        assert!(project_dir(Some(temp.path().join("missing"))).is_err());
    }

    #[test]
    fn test_task_markers() {
        assert_eq!(task_marker(TaskStatus::Completed), "[x]");
        assert_eq!(task_marker(TaskStatus::Failed), "[!]");
        assert_ne!(task_marker(TaskStatus::Pending), task_marker(TaskStatus::InProgress));
    }

    #[test]
    fn test_search_check_follows_client_availability() {
        let mut config = Config::default();
        config.search.api_key = None;
        let (environment, searcher) = probe_environment(&config);
        let [_, (ok, line)] = environment_checks(&environment, &searcher);
        assert!(!ok);
        assert_eq!(line, environment.search_status);

        config.search.api_key = Some("sk-test".to_string());
        let (environment, searcher) = probe_environment(&config);
        let [_, (ok, _)] = environment_checks(&environment, &searcher);
        assert!(ok);
    }

    #[test]
    fn test_run_report() {
        let tasks = TaskList::new(vec![
            crate::tasks::Task::new("a").with_status(TaskStatus::Completed),
            crate::tasks::Task::new("b"),
        ]);
        assert_eq!(
            run_report(&StopReason::MaxIterations { limit: 3 }, 3, &tasks),
            "Stopped: reached maximum iterations (3) after 3 iterations. 1 of 2 tasks remaining"
        );
        assert_eq!(
            run_report(&StopReason::AllTasksComplete, 1, &TaskList::default()),
            "Stopped: all tasks completed after 1 iteration. 0 of 0 tasks remaining"
        );
    }
}
