//! `search_files` — recursive text search inside the workspace.
//!
//! Case-insensitive substring match over file contents. Hidden entries and
//! common build/dependency directories are skipped, as are files that are
//! not valid UTF-8.

use crate::workspace::Workspace;
use crate::{confine, optional_str, required_str};
use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, Tool, ToolResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Maximum number of matching lines returned.
pub const MAX_HITS: usize = 200;

const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build"];

pub struct SearchFilesTool {
    workspace: Workspace,
}

impl SearchFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search file contents recursively for a case-insensitive text pattern. Returns 'path:line: text' for each match."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text to search for"
                },
                "directory_path": {
                    "type": "string",
                    "description": "Directory to search, relative to the workspace (default '.')"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolResult, ToolError> {
        let pattern = required_str(arguments, "pattern")?.to_string();
        if pattern.is_empty() {
            return Err(ToolError::InvalidArguments("'pattern' must not be empty".into()));
        }
        let directory = optional_str(arguments, "directory_path").unwrap_or(".");
        let root = confine(&self.workspace, self.name(), directory)?;
        let workspace = self.workspace.clone();

        let (hits, truncated) =
            tokio::task::spawn_blocking(move || search(&workspace, &root, &pattern))
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "search_files".into(),
                    reason: e.to_string(),
                })?;

        if hits.is_empty() {
            return Ok(ToolResult::ok("No matches found"));
        }

        let mut output = hits.join("\n");
        if truncated {
            output.push_str(&format!("\n[truncated at {MAX_HITS} matches]"));
        }
        Ok(ToolResult::ok(output))
    }
}

fn search(workspace: &Workspace, root: &Path, pattern: &str) -> (Vec<String>, bool) {
    let needle = pattern.to_lowercase();
    let mut hits = Vec::new();

    if root.is_file() {
        scan_file(workspace, root, &needle, &mut hits);
        let truncated = hits.len() > MAX_HITS;
        hits.truncate(MAX_HITS);
        return (hits, truncated);
    }

    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(reader) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut entries: Vec<_> = reader.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_str()) {
                continue;
            }
            let path = entry.path();
            match entry.file_type() {
                Ok(t) if t.is_dir() => subdirs.push(path),
                Ok(t) if t.is_file() => {
                    scan_file(workspace, &path, &needle, &mut hits);
                    if hits.len() > MAX_HITS {
                        hits.truncate(MAX_HITS);
                        return (hits, true);
                    }
                }
                _ => {}
            }
        }
        // Reversed so subdirectories pop in name order.
        stack.extend(subdirs.into_iter().rev());
    }

    (hits, false)
}

fn scan_file(workspace: &Workspace, path: &Path, needle: &str, hits: &mut Vec<String>) {
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    let display = workspace.display(path);
    for (number, line) in content.lines().enumerate() {
        if line.to_lowercase().contains(needle) {
            hits.push(format!("{display}:{}: {}", number + 1, line.trim()));
            if hits.len() > MAX_HITS {
                return;
            }
        }
    }
}
