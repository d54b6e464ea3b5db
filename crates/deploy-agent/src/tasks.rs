//! Task list model and its on-disk store
//!
//! The list is ordered: position is both priority and dependency order.
//! The store rewrites the whole file on every save and treats a missing or
//! corrupt file as an empty list.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Lifecycle of a single task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Still eligible to be selected as the current task
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => anyhow::bail!("unknown task status: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Generated plans sometimes carry placeholders like "high/medium/low";
/// anything unrecognised becomes "no priority" instead of rejecting the plan.
fn lenient_priority<'de, D>(deserializer: D) -> std::result::Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Shell command or description; also the task's identity
    pub content: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_priority"
    )]
    pub priority: Option<Priority>,
}

impl Task {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: TaskStatus::Pending,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[cfg(test)]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

/// Ordered task list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut list = Self { tasks };
        list.normalize();
        list
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Index of the first pending or in-progress task
    pub fn current_index(&self) -> Option<usize> {
        self.tasks.iter().position(|t| t.status.is_open())
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn has_open_tasks(&self) -> bool {
        self.current_index().is_some()
    }

    /// Set a task's status. Returns false when `index` is out of range.
    pub fn set_status(&mut self, index: usize, status: TaskStatus) -> bool {
        let Some(task) = self.tasks.get_mut(index) else {
            return false;
        };
        task.status = status;
        self.normalize();
        true
    }

    /// Keep at most one task in progress: only the first open task may be.
    pub fn normalize(&mut self) {
        let current = self.current_index();
        for (i, task) in self.tasks.iter_mut().enumerate() {
            if task.status == TaskStatus::InProgress && Some(i) != current {
                debug!(index = i, content = %task.content, "Demoting out-of-order in-progress task");
                task.status = TaskStatus::Pending;
            }
        }
    }

    /// "N of M tasks remaining" (anything not completed counts as remaining)
    pub fn summary(&self) -> String {
        let remaining = self
            .tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .count();
        format!("{} of {} tasks remaining", remaining, self.tasks.len())
    }
}

impl From<Vec<Task>> for TaskList {
    fn from(tasks: Vec<Task>) -> Self {
        Self::new(tasks)
    }
}

/// Durable record of the task list
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted list. Missing or unparsable files yield an empty list.
    pub fn load(&self) -> TaskList {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No task file, starting empty");
                return TaskList::default();
            }
        };

        match serde_json::from_str::<Vec<Task>>(&content) {
            Ok(tasks) => TaskList::new(tasks),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unparsable task file");
                TaskList::default()
            }
        }
    }

    /// Overwrite the persisted list
    pub fn save(&self, tasks: &TaskList) -> Result<()> {
        let mut content = serde_json::to_string_pretty(tasks)?;
        content.push('\n');
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!(path = %self.path.display(), summary = %tasks.summary(), "Saved tasks");
        Ok(())
    }
}
