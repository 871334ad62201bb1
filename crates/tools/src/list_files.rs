//! `list_files` — list a directory inside the workspace.

use crate::workspace::Workspace;
use crate::{confine, optional_str};
use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, Tool, ToolResult};
use async_trait::async_trait;

pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are suffixed with '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory_path": {
                    "type": "string",
                    "description": "Directory to list, relative to the workspace (default '.')"
                }
            }
        })
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolResult, ToolError> {
        let directory = optional_str(arguments, "directory_path").unwrap_or(".");
        let path = confine(&self.workspace, self.name(), directory)?;

        let mut reader = match tokio::fs::read_dir(&path).await {
            Ok(reader) => reader,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Failed to list directory {directory}: {e}"
                )));
            }
        };

        let mut entries = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let is_dir = entry
                        .file_type()
                        .await
                        .map(|t| t.is_dir())
                        .unwrap_or(false);
                    entries.push(if is_dir { format!("{name}/") } else { name });
                }
                Ok(None) => break,
                Err(e) => {
                    return Ok(ToolResult::failure(format!(
                        "Failed to list directory {directory}: {e}"
                    )));
                }
            }
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(ToolResult::ok("(empty directory)"));
        }
        Ok(ToolResult::ok(entries.join("\n")))
    }
}
