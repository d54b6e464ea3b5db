//! Per-task retry accounting
//!
//! Counters are keyed by task content and never reset within a run. Crossing
//! the ceiling escalates to the human at most once per content.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureVerdict {
    /// Failures recorded for this content, including this one
    pub attempts: u32,
    /// Ask the human whether to keep trying
    pub escalate: bool,
}

#[derive(Debug, Default)]
pub struct RetryGovernor {
    max_attempts: u32,
    attempts: HashMap<String, u32>,
    escalated: HashSet<String>,
}

impl RetryGovernor {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: HashMap::new(),
            escalated: HashSet::new(),
        }
    }

    /// Record a failed run of `content`
    pub fn record_failure(&mut self, content: &str) -> FailureVerdict {
        let count = self.attempts.entry(content.to_string()).or_insert(0);
        *count += 1;
        let attempts = *count;

        let escalate = attempts > self.max_attempts && self.escalated.insert(content.to_string());
        if escalate {
            warn!(task = %content, attempts, "Task crossed the retry ceiling");
        } else {
            debug!(task = %content, attempts, "Task failed");
        }

        FailureVerdict { attempts, escalate }
    }

    #[cfg(test)]
    pub fn attempts(&self, content: &str) -> u32 {
        self.attempts.get(content).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_escalated(&self, content: &str) -> bool {
        self.escalated.contains(content)
    }
}
