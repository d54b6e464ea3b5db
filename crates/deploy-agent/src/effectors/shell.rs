//! Shell command execution
//!
//! Success is exit status exactly 0; the output text never influences it.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::ToolResult;

/// Runs commands through `sh -c` in a fixed working directory
#[derive(Debug, Clone)]
pub struct ShellRunner {
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ShellRunner {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            timeout: None,
        }
    }

    /// Kill commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[instrument(skip(self), fields(working_dir = %self.working_dir.display()))]
    pub async fn run(&self, command: &str) -> ToolResult {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "Command timed out");
                    return ToolResult::error(format!(
                        "Command timed out after {} seconds",
                        limit.as_secs()
                    ));
                }
            },
            None => cmd.output().await,
        };

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "Failed to spawn command");
                return ToolResult::error(format!("Failed to execute command: {}", e));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut combined = stdout.into_owned();
        if !stderr.is_empty() {
            combined.push_str("\nStderr: ");
            combined.push_str(&stderr);
        }

        let code = output.status.code();
        let code_text = code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "terminated by signal".to_string());
        let text = format!("Exit code: {}\nOutput: {}", code_text, combined);

        debug!(exit_code = ?code, output_len = combined.len(), "Command finished");

        if output.status.success() {
            ToolResult::success(text).with_exit_code(code)
        } else {
            ToolResult::failure(text, format!("Command exited with code {}", code_text))
                .with_exit_code(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner() -> ShellRunner {
        ShellRunner::new(std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_exit_zero_is_success() {
        let result = runner().run("echo 'hello world'").await;
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.output.starts_with("Exit code: 0\nOutput: hello world"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let result = runner().run("exit 3").await;
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert!(result.output.starts_with("Exit code: 3"));
        assert_eq!(result.error.as_deref(), Some("Command exited with code 3"));
    }

    #[tokio::test]
    async fn test_output_content_does_not_decide_success() {
        let result = runner().run("echo 'Error: everything failed' >&2; true").await;
        assert!(result.success);
        assert!(result.output.contains("Stderr: Error: everything failed"));

        let result = runner().run("echo 'Exit code: 0'; false").await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "x").unwrap();
        let result = ShellRunner::new(temp.path().to_path_buf()).run("ls").await;
        assert!(result.success);
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let result = runner()
            .with_timeout(Some(Duration::from_secs(1)))
            .run("sleep 10")
            .await;
        assert!(!result.success);
        assert!(result.output.contains("timed out"));
        assert_eq!(result.exit_code, None);
    }
}
