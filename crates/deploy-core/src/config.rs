//! Configuration management for deploy-agent.toml
//!
//! Every field has a default, so a missing file behaves like an empty one.
//! Environment variables are applied on top of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name searched for in the working directory and its parents
pub const CONFIG_FILE_NAME: &str = "deploy-agent.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub agent: LoopConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Text-generation service consulted once per iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    /// Per-request timeout; generations can be slow
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

/// Limits for the task-execution loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Hard ceiling on oracle calls per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Failures of one task content tolerated before asking the human
    #[serde(default = "default_max_task_attempts")]
    pub max_task_attempts: u32,
    /// History entries surfaced back to the oracle
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Persisted task list, relative to the working directory
    #[serde(default = "default_task_file")]
    pub task_file: PathBuf,
    /// Kill shell commands after this many seconds (unset: wait forever)
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

/// Search-augmented generation endpoint used by `websearch:`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_model")]
    pub model: String,
    #[serde(default = "default_search_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_search_max_sources")]
    pub max_sources: usize,
    /// Normally taken from OPENAI_API_KEY
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_oracle_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_oracle_model() -> String {
    "llama3.2".to_string()
}

fn default_oracle_timeout() -> u64 {
    300
}

fn default_max_iterations() -> usize {
    50
}

fn default_max_task_attempts() -> u32 {
    100
}

fn default_history_window() -> usize {
    5
}

fn default_task_file() -> PathBuf {
    PathBuf::from(".ai-todos.json")
}

fn default_search_endpoint() -> String {
    "https://api.openai.com/v1/responses".to_string()
}

fn default_search_model() -> String {
    "o4-mini".to_string()
}

fn default_search_max_chars() -> usize {
    2000
}

fn default_search_max_sources() -> usize {
    5
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            model: default_oracle_model(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_task_attempts: default_max_task_attempts(),
            history_window: default_history_window(),
            task_file: default_task_file(),
            command_timeout_secs: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            model: default_search_model(),
            max_chars: default_search_max_chars(),
            max_sources: default_search_max_sources(),
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration for `dir`, falling back to defaults when no file exists,
    /// then apply environment overrides
    pub fn load(dir: &Path) -> Result<Self> {
        let mut config = match Self::find_config_path(dir) {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path (no environment overrides)
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Find deploy-agent.toml by searching `start` and its parents
    pub fn find_config_path(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        for _ in 0..10 {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Apply environment-style overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(model) = non_empty("OPENAI_WEBSEARCH_MODEL") {
            self.search.model = model;
        }
        if let Some(url) = non_empty("DEPLOY_AGENT_ORACLE_URL") {
            self.oracle.base_url = url;
        }
        if let Some(model) = non_empty("DEPLOY_AGENT_MODEL") {
            self.oracle.model = model;
        }
    }

    /// Absolute task file location for a run rooted at `working_dir`
    pub fn task_file_in(&self, working_dir: &Path) -> PathBuf {
        if self.agent.task_file.is_absolute() {
            self.agent.task_file.clone()
        } else {
            working_dir.join(&self.agent.task_file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 50);
        assert_eq!(config.agent.max_task_attempts, 100);
        assert_eq!(config.agent.history_window, 5);
        assert_eq!(config.agent.task_file, PathBuf::from(".ai-todos.json"));
        assert_eq!(config.search.model, "o4-mini");
        assert!(config.search.api_key.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[oracle]
model = "qwen2.5-coder:7b"

[agent]
max_iterations = 10
command_timeout_secs = 600
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.oracle.model, "qwen2.5-coder:7b");
        assert_eq!(config.oracle.base_url, "http://127.0.0.1:11434");
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.max_task_attempts, 100);
        assert_eq!(config.agent.command_timeout_secs, Some(600));
        assert_eq!(config.search.max_sources, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_WEBSEARCH_MODEL", "gpt-4.1"),
            ("DEPLOY_AGENT_MODEL", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.search.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.search.model, "gpt-4.1");
        // Blank values are ignored
        assert_eq!(config.oracle.model, "llama3.2");
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[agent]\nmax_iterations = 7\n",
        )
        .unwrap();

        let found = Config::find_config_path(&nested).unwrap();
        let config = Config::load_from(found).unwrap();
        assert_eq!(config.agent.max_iterations, 7);
    }

    #[test]
    fn test_task_file_resolution() {
        let config = Config::default();
        let dir = Path::new("/srv/app");
        assert_eq!(config.task_file_in(dir), PathBuf::from("/srv/app/.ai-todos.json"));
    }
}
