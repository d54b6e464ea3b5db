//! deploy-agent: oracle-driven deployment runner
//!
//! Plans a deployment with a language model, then works through the task
//! list one shell command at a time until every task is done.

mod action;
mod agent;
mod commands;
mod console;
mod effectors;
mod planning;
mod progress;
mod tasks;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::DeployOptions;

#[derive(Debug, Parser)]
#[command(name = "deploy-agent")]
#[command(about = "Plan and run a cloud deployment with a language model", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: deploy-agent.toml in the project or its parents)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project directory (default: current directory)
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Continue the open tasks in the task file instead of planning
    #[arg(long, global = true)]
    resume: bool,

    /// Maximum oracle calls in the task loop
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Plan and run a deployment (default)
    Deploy,

    /// Show environment probes and the task file
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Status) => commands::status(cli.path, cli.config).await,
        Some(Commands::Deploy) | None => {
            commands::deploy(DeployOptions {
                path: cli.path,
                resume: cli.resume,
                max_iterations: cli.max_iterations,
                config: cli.config,
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_flags() {
        let cli = Cli::parse_from([
            "deploy-agent",
            "deploy",
            "--resume",
            "--max-iterations",
            "5",
            "--path",
            "/srv/app",
        ]);
        assert!(matches!(cli.command, Some(Commands::Deploy)));
        assert!(cli.resume);
        assert_eq!(cli.max_iterations, Some(5));
        assert_eq!(cli.path, Some(PathBuf::from("/srv/app")));
    }

    #[test]
    fn test_no_subcommand_defaults_to_deploy() {
        let cli = Cli::parse_from(["deploy-agent", "-v", "--resume"]);
        assert!(cli.verbose);
        assert!(cli.resume);
        assert!(cli.command.is_none());
    }
}
