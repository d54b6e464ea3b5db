//! Human interaction on the terminal
//!
//! Every human prompt in the agent goes through [`HumanConsole`], so tests can
//! script the answers and the loop never touches stdin directly.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::{self, IsTerminal, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Tokens accepted by `wait_user` to resume the run
pub const ACK_TOKENS: [&str; 2] = ["done", "ready"];

/// Check if stdin is connected to a terminal
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// A source of human answers
#[async_trait]
pub trait HumanConsole: Send + Sync {
    /// Show `prompt` and block until the human answers one line
    async fn read_line(&self, prompt: &str) -> Result<String>;
}

/// Exact `yes`/`y` (any case) is true, everything else is false
pub fn parse_yes_no(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "yes" | "y")
}

/// `done`/`ready` (any case) acknowledge a wait
pub fn is_ack(answer: &str) -> bool {
    let answer = answer.trim().to_ascii_lowercase();
    ACK_TOKENS.iter().any(|t| *t == answer)
}

pub fn question_prompt(question: &str) -> String {
    format!("\n{}\n> ", question)
}

pub fn yes_no_prompt(question: &str) -> String {
    format!("\n{} (yes/no): ", question)
}

/// Ask a yes/no question
pub async fn ask_yes_no(console: &dyn HumanConsole, question: &str) -> Result<bool> {
    let answer = console.read_line(&yes_no_prompt(question)).await?;
    Ok(parse_yes_no(&answer))
}

/// Ask a numbered multiple-choice question. Returns `None` for an answer
/// that is not one of the listed numbers.
pub async fn ask_choice(console: &dyn HumanConsole, question: &str, options: &[&str]) -> Result<Option<usize>> {
    let mut text = format!("\n{}\n", question);
    for (i, option) in options.iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", i + 1, option));
    }
    text.push_str("\nEnter your choice: ");

    let answer = console.read_line(&text).await?;
    Ok(parse_choice(&answer, options.len()))
}

fn parse_choice(answer: &str, len: usize) -> Option<usize> {
    let digits: String = answer.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    let n = digits.parse::<usize>().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

/// Default terminal-backed console
pub struct TerminalConsole {
    // One reader for the whole run so piped answers are not lost between prompts
    reader: tokio::sync::Mutex<BufReader<tokio::io::Stdin>>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            reader: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanConsole for TerminalConsole {
    async fn read_line(&self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut reader = self.reader.lock().await;
        let mut input = String::new();

        let read = reader
            .read_line(&mut input)
            .await
            .context("Failed to read from stdin")?;
        if read == 0 {
            bail!("stdin closed while waiting for an answer");
        }

        debug!(answer_len = input.trim().len(), "Read console answer");
        Ok(input.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Console that replays canned answers
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    answers: std::sync::Mutex<std::collections::VecDeque<String>>,
    prompts: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedConsole {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: std::sync::Mutex::new(answers.into_iter().map(Into::into).collect()),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl HumanConsole for ScriptedConsole {
    async fn read_line(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .answers
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted console poisoned"))?
            .pop_front();
        match next {
            Some(answer) => Ok(answer),
            None => bail!("scripted console ran out of answers"),
        }
    }
}
