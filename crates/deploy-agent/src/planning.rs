//! Planning before the loop and the summary after it
//!
//! Requirements come from the human, the architecture and cost estimate from
//! the oracle, and the task plan from one more oracle call. Plan generation
//! never fails the run: anything unusable becomes a single fallback task.

use anyhow::{Context, Result};
use deploy_core::{truncate_chars, Oracle};
use regex::Regex;
use serde_json::Value;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, instrument, warn};

use crate::agent::{History, Role};
use crate::console::{ask_choice, HumanConsole};
use crate::effectors::files::IGNORE_PATTERNS;
use crate::tasks::{Priority, Task, TaskList};

pub const FALLBACK_TASK: &str = "echo 'Setup deployment'";

const SCALE_OPTIONS: [&str; 3] = ["Hobby (<1k)", "Startup (1k-50k)", "High scale (50k+)"];
const DOWNTIME_OPTIONS: [&str; 2] = ["Yes - simple", "No - zero-downtime"];
const DATA_OPTIONS: [&str; 4] = ["No sensitive", "PII", "Financial", "Enterprise"];
const OPTIMIZE_OPTIONS: [&str; 3] = ["Lowest cost", "Balanced", "Performance"];

const SUMMARY_OUTPUT_CHARS: usize = 1200;

/// Deployment requirements gathered from the human
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirements {
    pub scale: String,
    pub zero_downtime: bool,
    pub data_type: String,
    pub optimization: String,
}

impl Requirements {
    /// Ask the four planning questions. Unrecognised answers take a default.
    pub async fn gather(console: &dyn HumanConsole) -> Result<Self> {
        let scale = ask_choice(console, "What scale?", &SCALE_OPTIONS).await?;
        let downtime = ask_choice(console, "Zero downtime?", &DOWNTIME_OPTIONS).await?;
        let data = ask_choice(console, "Data type?", &DATA_OPTIONS).await?;
        let optimize = ask_choice(console, "Optimize for?", &OPTIMIZE_OPTIONS).await?;

        let requirements = Self {
            scale: scale.map_or("Hobby", |i| SCALE_OPTIONS[i]).to_string(),
            zero_downtime: downtime == Some(1),
            data_type: data.map_or("No sensitive", |i| DATA_OPTIONS[i]).to_string(),
            optimization: optimize.map_or("Balanced", |i| OPTIMIZE_OPTIONS[i]).to_string(),
        };
        debug!(?requirements, "Gathered requirements");
        Ok(requirements)
    }
}

/// Summarize `package.json` and the top-level layout of `project`
pub fn analyze_codebase(project: &Path) -> Result<String> {
    let mut out = String::new();

    let manifest = fs::read_to_string(project.join("package.json"))
        .ok()
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok());

    match manifest {
        Some(pkg) => {
            let _ = writeln!(out, "## Package.json");
            let _ = writeln!(out, "Name: {}", pkg["name"].as_str().unwrap_or("unknown"));
            let _ = writeln!(out, "Type: {}", pkg["type"].as_str().unwrap_or("commonjs"));
            let _ = writeln!(out, "\n### Dependencies");
            if let Some(deps) = pkg["dependencies"].as_object() {
                let _ = writeln!(out, "{}", deps.keys().cloned().collect::<Vec<_>>().join(", "));
            }
            if let Some(deps) = pkg["devDependencies"].as_object() {
                let _ = writeln!(out, "\n### Dev Dependencies");
                let _ = writeln!(out, "{}", deps.keys().cloned().collect::<Vec<_>>().join(", "));
            }
        }
        None => {
            let _ = writeln!(out, "No package.json found");
        }
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(project).with_context(|| format!("Failed to read {}", project.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || IGNORE_PATTERNS.contains(&name.as_str()) {
            continue;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        entries.push(if is_dir { format!("{}/", name) } else { name });
    }
    entries.sort();

    let _ = writeln!(out, "\n## Directory Structure");
    out.push_str(&entries.join("\n"));
    Ok(out)
}

#[instrument(skip_all)]
pub async fn propose_architecture(oracle: &dyn Oracle, requirements: &Requirements, analysis: &str) -> Result<String> {
    let prompt = format!(
        "You are an expert software architect. Based on the codebase analysis and user \
         requirements, recommend an AWS deployment architecture.\n\n\
         ## User Requirements\n\
         - Scale: {}\n\
         - Zero-downtime: {}\n\
         - Data type: {}\n\
         - Optimization: {}\n\n\
         ## Codebase Analysis\n{}\n\n\
         Provide:\n\
         1. Project Overview\n\
         2. Recommended AWS Services\n\
         3. Architecture Description\n\
         4. Key AWS Resources to create\n\
         5. Deployment approach with specific AWS CLI commands",
        requirements.scale,
        if requirements.zero_downtime { "Required" } else { "Not required" },
        requirements.data_type,
        requirements.optimization,
        analysis
    );
    oracle.complete(&prompt).await.context("Failed to generate architecture")
}

#[instrument(skip_all)]
pub async fn estimate_cost(oracle: &dyn Oracle, architecture: &str) -> Result<String> {
    let prompt = format!(
        "Calculate the monthly cost for this AWS architecture.\n\n\
         ## Architecture\n{}\n\n\
         Provide in this format:\n\
         ## Cost Summary\n\
         **Total Monthly Cost: $XX.XX USD**\n\n\
         ## Service Breakdown\n\
         | Service | Config | Cost |",
        architecture
    );
    oracle.complete(&prompt).await.context("Failed to estimate cost")
}

fn json_array_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("array pattern is valid"))
}

/// Pull a task array out of free text: first `[` through last `]`
pub fn parse_task_plan(text: &str) -> Option<Vec<Task>> {
    let candidate = json_array_regex().find(text)?;
    match serde_json::from_str::<Vec<Task>>(candidate.as_str()) {
        Ok(tasks) => Some(tasks),
        Err(e) => {
            warn!(error = %e, "Generated plan is not a valid task array");
            None
        }
    }
}

pub fn fallback_tasks() -> TaskList {
    TaskList::new(vec![Task::new(FALLBACK_TASK).with_priority(Priority::High)])
}

/// Ask the oracle for the task plan; oracle and parse failures fall back
#[instrument(skip_all)]
pub async fn generate_tasks(oracle: &dyn Oracle, architecture: &str) -> TaskList {
    let prompt = format!(
        "Based on this architecture, generate deployment tasks as a JSON array:\n{}\n\n\
         Format:\n\
         [\n  {{\"content\": \"aws <command>\", \"status\": \"pending\", \"priority\": \"high/medium/low\"}}\n]\n\n\
         Constraints:\n\
         - Use region us-east-1 for all AWS commands.\n\
         - If creating S3 buckets in us-east-1, do NOT include \
         --create-bucket-configuration LocationConstraint=us-east-1.\n\n\
         Output ONLY valid JSON, no other text.",
        architecture
    );

    let text = match oracle.complete(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Task generation failed, using fallback task");
            return fallback_tasks();
        }
    };

    match parse_task_plan(&text) {
        Some(tasks) => {
            info!(count = tasks.len(), "Generated task plan");
            TaskList::new(tasks)
        }
        None => {
            warn!(response_len = text.len(), "No usable task plan, using fallback task");
            fallback_tasks()
        }
    }
}

/// Ask the oracle to summarize a completed deployment from the tool outputs
#[instrument(skip_all)]
pub async fn summarize_deployment(oracle: &dyn Oracle, tasks: &TaskList, history: &History) -> Result<String> {
    let task_lines: Vec<String> = tasks
        .iter()
        .map(|t| format!("- {} [{}]", t.content, t.status))
        .collect();

    let tool_outputs: Vec<String> = history
        .entries()
        .iter()
        .filter(|e| e.role == Role::Tool)
        .map(|e| {
            let name = e.tool_name.map_or("tool".to_string(), |k| k.to_string());
            let result = e.tool_result.as_deref().unwrap_or_default();
            format!("{}: {}\n{}", name, e.content, truncate_chars(result, SUMMARY_OUTPUT_CHARS))
        })
        .collect();

    let prompt = format!(
        "Summarize the completed deployment for the user.\n\n\
         Requirements:\n\
         - Provide a short summary of what was deployed.\n\
         - List any discovered endpoints/URLs (app URL, API URL, database endpoint, etc.).\n\
         - If an endpoint is not present in the logs, say \"Not found\" for that item.\n\
         - Keep it concise (bulleted list is fine).\n\n\
         Tasks:\n{}\n\n\
         Tool outputs:\n{}\n",
        task_lines.join("\n"),
        tool_outputs.join("\n\n")
    );

    oracle.complete(&prompt).await.context("Failed to summarize deployment")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::console::ScriptedConsole;
    use crate::effectors::ToolResult;
    use crate::tasks::TaskStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Returns a fixed reply and remembers the last prompt
    struct FixedOracle {
        reply: Result<String, String>,
        last_prompt: Mutex<String>,
    }

    impl FixedOracle {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                last_prompt: Mutex::new(String::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err("model not loaded".to_string()),
                last_prompt: Mutex::new(String::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.last_prompt.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Oracle for FixedOracle {
        async fn complete(&self, prompt: &str) -> Result<String> {
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    #[tokio::test]
    async fn test_gather_requirements() {
        let console = ScriptedConsole::new(["3", "2", "nonsense", "1"]);
        let requirements = Requirements::gather(&console).await.unwrap();
        assert_eq!(
            requirements,
            Requirements {
                scale: "High scale (50k+)".to_string(),
                zero_downtime: true,
                data_type: "No sensitive".to_string(),
                optimization: "Lowest cost".to_string(),
            }
        );
        assert_eq!(console.prompts().len(), 4);
    }

    #[test]
    fn test_analyze_codebase() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("package.json"),
            r#"{"name": "shop", "type": "module", "dependencies": {"express": "^4"}, "devDependencies": {"vitest": "^1"}}"#,
        )
        .unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::create_dir(temp.path().join("node_modules")).unwrap();
        fs::write(temp.path().join(".env"), "SECRET=1").unwrap();

        let analysis = analyze_codebase(temp.path()).unwrap();
        assert!(analysis.contains("Name: shop"));
        assert!(analysis.contains("Type: module"));
        assert!(analysis.contains("express"));
        assert!(analysis.contains("### Dev Dependencies\nvitest"));
        assert!(analysis.contains("## Directory Structure\npackage.json\nsrc/"));
        assert!(!analysis.contains("node_modules"));
        assert!(!analysis.contains(".env"));
    }

    #[test]
    fn test_analyze_without_manifest() {
        let temp = TempDir::new().unwrap();
        let analysis = analyze_codebase(temp.path()).unwrap();
        assert!(analysis.starts_with("No package.json found"));
    }

    #[test]
    fn test_parse_task_plan() {
        let text = "Here you go:\n```json\n[\n  {\"content\": \"aws s3 mb s3://shop\", \"status\": \"pending\", \"priority\": \"high\"},\n  {\"content\": \"aws s3 sync ./dist s3://shop\"}\n]\n```";
        let tasks = parse_task_plan(text).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].priority, Some(Priority::High));
        assert_eq!(tasks[1].status, TaskStatus::Pending);

        assert!(parse_task_plan("no plan today").is_none());
        assert!(parse_task_plan("[not json]").is_none());
    }

    #[tokio::test]
    async fn test_generate_tasks_falls_back() {
        let tasks = generate_tasks(&FixedOracle::ok("I cannot do that."), "arch").await;
        assert_eq!(tasks, fallback_tasks());

        let tasks = generate_tasks(&FixedOracle::failing(), "arch").await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks.get(0).unwrap().content, FALLBACK_TASK);
        assert_eq!(tasks.get(0).unwrap().priority, Some(Priority::High));
    }

    #[tokio::test]
    async fn test_generate_tasks_uses_plan() {
        let oracle = FixedOracle::ok(r#"[{"content": "aws sts get-caller-identity", "priority": "high/medium/low"}]"#);
        let tasks = generate_tasks(&oracle, "S3 + CloudFront").await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks.get(0).unwrap().priority, None);
        assert!(oracle.last_prompt().contains("S3 + CloudFront"));
    }

    #[tokio::test]
    async fn test_architecture_errors_propagate() {
        let requirements = Requirements {
            scale: "Hobby".into(),
            zero_downtime: false,
            data_type: "PII".into(),
            optimization: "Balanced".into(),
        };
        assert!(propose_architecture(&FixedOracle::failing(), &requirements, "").await.is_err());

        let oracle = FixedOracle::ok("Use S3");
        assert_eq!(propose_architecture(&oracle, &requirements, "").await.unwrap(), "Use S3");
        assert!(oracle.last_prompt().contains("- Zero-downtime: Not required"));
        assert!(oracle.last_prompt().contains("- Data type: PII"));

        assert_eq!(estimate_cost(&oracle, "Use S3").await.unwrap(), "Use S3");
        assert!(oracle.last_prompt().contains("Total Monthly Cost"));
    }

    #[tokio::test]
    async fn test_summary_prompt_includes_capped_tool_output() {
        let tasks = TaskList::new(vec![Task::new("aws s3 ls").with_status(TaskStatus::Completed)]);
        let mut history = History::default();
        history.push_assistant("bash: aws s3 ls");
        history.push_tool(ActionKind::Bash, "aws s3 ls", &ToolResult::success("y".repeat(2000)));

        let oracle = FixedOracle::ok("- Site: Not found");
        let summary = summarize_deployment(&oracle, &tasks, &history).await.unwrap();
        assert_eq!(summary, "- Site: Not found");

        let prompt = oracle.last_prompt();
        assert!(prompt.contains("- aws s3 ls [completed]"));
        assert!(prompt.contains("bash: aws s3 ls\n"));
        assert!(prompt.contains(&"y".repeat(1200)));
        assert!(!prompt.contains(&"y".repeat(1201)));
    }
}
