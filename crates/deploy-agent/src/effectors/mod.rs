//! Effectors: one side effect per action kind
//!
//! Each effector takes the action's argument and returns a [`ToolResult`],
//! which the loop appends to the history as a tool entry. Expected failures
//! (non-zero exits, missing files) are values here, never errors.

pub mod files;
pub mod human;
pub mod search;
pub mod shell;
pub mod task_update;

pub use search::web_search;

/// Result of running an effector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// Whether the side effect succeeded
    pub success: bool,
    /// Text surfaced back to the oracle
    pub output: String,
    /// Error message if failed
    pub error: Option<String>,
    /// Process exit status, for shell commands that ran to completion
    pub exit_code: Option<i32>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            exit_code: None,
        }
    }

    /// Create a failed result with no output
    pub fn error(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            output: error.clone(),
            error: Some(error),
            exit_code: None,
        }
    }

    /// Create a failed result with output
    pub fn failure(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
            exit_code: None,
        }
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let err = ToolResult::error("boom");
        assert!(!err.success);
        assert_eq!(err.output, "boom");
        assert_eq!(err.error.as_deref(), Some("boom"));

        let failed = ToolResult::failure("out", "exit 2").with_exit_code(Some(2));
        assert_eq!(failed.exit_code, Some(2));
        assert_eq!(failed.output, "out");
    }
}
