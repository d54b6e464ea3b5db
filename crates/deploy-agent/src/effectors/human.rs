//! Human-interaction effectors
//!
//! The loop suspends on these prompts; the functions here only render the
//! prompt text and turn one console reply into a tool result.

use regex::Regex;
use std::sync::OnceLock;

use super::ToolResult;
use crate::console::{is_ack, parse_yes_no};

pub const DEFAULT_WAIT_MESSAGE: &str = "Please complete the required manual step.";
pub const ACK_REMINDER: &str = "Type 'done' or 'ready' to continue.";
pub const AUTO_CONFIGURED_ANSWER: &str =
    "AWS configuration is already present on this machine (credentials and region detected).";

fn configure_question_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)aws configure|configure aws").expect("configure pattern is valid"))
}

/// Answer a free-text question without asking, when the machine state already
/// answers it
pub fn auto_answer(question: &str, cloud_configured: bool) -> Option<ToolResult> {
    (cloud_configured && configure_question_regex().is_match(question))
        .then(|| ToolResult::success(AUTO_CONFIGURED_ANSWER))
}

/// Prompt for a `wait_user` suspension; `reminded` after a non-ack reply
pub fn ack_prompt(message: &str, reminded: bool) -> String {
    if reminded {
        format!("{} ", ACK_REMINDER)
    } else {
        let message = if message.trim().is_empty() {
            DEFAULT_WAIT_MESSAGE
        } else {
            message
        };
        format!("\n{}\nType 'done' or 'ready' when finished: ", message)
    }
}

pub fn answer_text(reply: &str) -> ToolResult {
    ToolResult::success(reply.trim())
}

pub fn answer_yes_no(reply: &str) -> ToolResult {
    ToolResult::success(if parse_yes_no(reply) { "yes" } else { "no" })
}

/// `None` keeps the loop waiting
pub fn answer_ack(reply: &str) -> Option<ToolResult> {
    is_ack(reply).then(|| ToolResult::success(reply.trim().to_ascii_lowercase()))
}
