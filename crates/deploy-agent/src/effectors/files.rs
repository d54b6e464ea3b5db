//! `read:` and `ls:` effectors
//!
//! Paths resolve against the run's working directory. A missing path is an
//! error result for the oracle to see, not a loop error.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use super::ToolResult;

/// Entry names dropped from listings
pub const IGNORE_PATTERNS: &[&str] = &[
    "node_modules",
    "__pycache__",
    ".git",
    "dist",
    "build",
    "target",
    "vendor",
    "bin",
    "obj",
    ".idea",
    ".vscode",
    ".zig-cache",
    "zig-out",
    ".coverage",
    "coverage",
    "tmp",
    "temp",
    ".cache",
    "cache",
    "logs",
    ".venv",
    "venv",
    "env",
];

const MAX_LINES: usize = 2000;
const MAX_LINE_CHARS: usize = 2000;

fn resolve(working_dir: &Path, raw: &str) -> PathBuf {
    let raw = raw.trim();
    let raw = if raw.is_empty() { "." } else { raw };
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        working_dir.join(path)
    }
}

/// Directory entries sorted by name, directories suffixed with `/`
fn list_entries(dir: &Path, filter_ignored: bool) -> std::io::Result<Vec<String>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if filter_ignored && IGNORE_PATTERNS.contains(&name.as_str()) {
            continue;
        }
        entries.push(if is_dir { format!("{}/", name) } else { name });
    }
    entries.sort();
    Ok(entries)
}

/// Read a file with numbered lines, or list a directory
#[instrument(skip(working_dir))]
pub fn read(working_dir: &Path, raw_path: &str) -> ToolResult {
    let path = resolve(working_dir, raw_path);

    if !path.exists() {
        return ToolResult::error(format!("File not found: {}", path.display()));
    }

    if path.is_dir() {
        return match list_entries(&path, false) {
            Ok(entries) => ToolResult::success(format!(
                "<path>{}</path>\n<type>directory</type>\n<entries>\n{}\n</entries>",
                path.display(),
                entries.join("\n")
            )),
            Err(e) => ToolResult::error(format!("Failed to list directory: {}", e)),
        };
    }

    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
    };

    let total_lines = content.lines().count();
    let numbered: Vec<String> = content
        .lines()
        .take(MAX_LINES)
        .enumerate()
        .map(|(i, line)| {
            if line.chars().count() > MAX_LINE_CHARS {
                let cut: String = line.chars().take(MAX_LINE_CHARS).collect();
                format!("{}: {}...", i + 1, cut)
            } else {
                format!("{}: {}", i + 1, line)
            }
        })
        .collect();

    let footer = if total_lines > MAX_LINES {
        format!("(Showing {} of {} lines)", MAX_LINES, total_lines)
    } else {
        format!("(End of file - total {} lines)", total_lines)
    };

    debug!(path = %path.display(), total_lines, "Read file");
    ToolResult::success(format!(
        "<path>{}</path>\n<content>\n{}\n{}\n</content>",
        path.display(),
        numbered.join("\n"),
        footer
    ))
}

/// List a directory, skipping dependency and build output directories
#[instrument(skip(working_dir))]
pub fn ls(working_dir: &Path, raw_path: &str) -> ToolResult {
    let path = resolve(working_dir, raw_path);

    if !path.is_dir() {
        return ToolResult::error(format!("Not a directory: {}", path.display()));
    }

    match list_entries(&path, true) {
        Ok(entries) => ToolResult::success(format!(
            "<path>{}</path>\n<entries>\n{}\n</entries>",
            path.display(),
            entries.join("\n")
        )),
        Err(e) => ToolResult::error(format!("Failed to list directory: {}", e)),
    }
}
