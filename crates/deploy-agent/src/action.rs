//! Action directive grammar
//!
//! The oracle answers in free text. Exactly one line of the form
//! `verb: argument` is actionable; it is lifted here into [`Action`] and
//! nothing downstream inspects raw strings again.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::tasks::TaskStatus;

/// The nine verbs of the action menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Bash,
    Read,
    Ls,
    WebSearch,
    AskUser,
    AskUserYesNo,
    WaitUser,
    UpdateTask,
    Done,
}

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [
        ActionKind::Bash,
        ActionKind::Read,
        ActionKind::Ls,
        ActionKind::WebSearch,
        ActionKind::AskUser,
        ActionKind::AskUserYesNo,
        ActionKind::WaitUser,
        ActionKind::UpdateTask,
        ActionKind::Done,
    ];

    pub fn verb(&self) -> &'static str {
        match self {
            ActionKind::Bash => "bash",
            ActionKind::Read => "read",
            ActionKind::Ls => "ls",
            ActionKind::WebSearch => "websearch",
            ActionKind::AskUser => "ask_user",
            ActionKind::AskUserYesNo => "ask_user_yesno",
            ActionKind::WaitUser => "wait_user",
            ActionKind::UpdateTask => "update_task",
            ActionKind::Done => "done",
        }
    }

    pub fn from_verb(verb: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.verb() == verb)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// A validated `update_task:` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskUpdate {
    /// 1-based position in the task list
    pub position: usize,
    pub status: TaskStatus,
}

/// One executable action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Bash { command: String },
    Read { path: String },
    Ls { path: String },
    WebSearch { query: String },
    AskUser { question: String },
    AskUserYesNo { question: String },
    WaitUser { message: String },
    /// `None` when the argument was malformed; ignored like an out-of-range index
    UpdateTask(Option<TaskUpdate>),
    Done { message: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Bash { .. } => ActionKind::Bash,
            Action::Read { .. } => ActionKind::Read,
            Action::Ls { .. } => ActionKind::Ls,
            Action::WebSearch { .. } => ActionKind::WebSearch,
            Action::AskUser { .. } => ActionKind::AskUser,
            Action::AskUserYesNo { .. } => ActionKind::AskUserYesNo,
            Action::WaitUser { .. } => ActionKind::WaitUser,
            Action::UpdateTask(_) => ActionKind::UpdateTask,
            Action::Done { .. } => ActionKind::Done,
        }
    }

    fn from_parts(kind: ActionKind, argument: &str) -> Self {
        let arg = argument.to_string();
        match kind {
            ActionKind::Bash => Action::Bash { command: arg },
            ActionKind::Read => Action::Read { path: arg },
            ActionKind::Ls => Action::Ls { path: arg },
            ActionKind::WebSearch => Action::WebSearch { query: arg },
            ActionKind::AskUser => Action::AskUser { question: arg },
            ActionKind::AskUserYesNo => Action::AskUserYesNo { question: arg },
            ActionKind::WaitUser => Action::WaitUser { message: arg },
            ActionKind::UpdateTask => Action::UpdateTask(parse_task_update(argument)),
            ActionKind::Done => Action::Done { message: arg },
        }
    }
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(bash|read|ls|websearch|ask_user|ask_user_yesno|wait_user|update_task|done):")
            .expect("directive pattern is valid")
    })
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-*]\s+").expect("bullet pattern is valid"))
}

fn numbered_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s+").expect("numbered pattern is valid"))
}

/// Strip one leading `- `/`* ` marker, then one `N. ` marker
fn strip_list_marker(line: &str) -> String {
    let without_bullet = bullet_regex().replace(line, "");
    numbered_regex().replace(&without_bullet, "").into_owned()
}

/// Find the first actionable line and split it into verb and argument
pub fn extract_directive(response: &str) -> Option<(ActionKind, String)> {
    response
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(strip_list_marker)
        .find_map(|cleaned| {
            let caps = directive_regex().captures(&cleaned)?;
            let verb = caps.get(1)?;
            let kind = ActionKind::from_verb(verb.as_str())?;
            // Skip the verb and its colon
            let argument = cleaned[verb.end() + 1..].trim().to_string();
            Some((kind, argument))
        })
}

/// Parse oracle text into an action, if it contains one
pub fn parse_action(response: &str) -> Option<Action> {
    extract_directive(response).map(|(kind, argument)| Action::from_parts(kind, &argument))
}

/// `<index> [status]`; status defaults to pending
fn parse_task_update(argument: &str) -> Option<TaskUpdate> {
    let mut parts = argument.split_whitespace();
    let position = parts.next()?.trim_end_matches(['.', ':', ',']).parse::<usize>().ok()?;
    let status = match parts.next() {
        Some(raw) => raw.parse::<TaskStatus>().ok()?,
        None => TaskStatus::Pending,
    };
    Some(TaskUpdate { position, status })
}
