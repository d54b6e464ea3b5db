//! Oracle-driven task execution
//!
//! Each iteration selects the first open task, asks the oracle for one
//! action, runs it, and records the outcome.

mod agent_loop;
mod governor;
mod prompt;
mod state;

pub use agent_loop::{AgentLoop, Environment, RunContext};
pub use state::{AgentConfig, History, Role, StopReason};
