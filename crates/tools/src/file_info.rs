//! `get_file_info` — metadata for a path inside the workspace.

use crate::workspace::Workspace;
use crate::{confine, required_str};
use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, Tool, ToolResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct FileInfoTool {
    workspace: Workspace,
}

impl FileInfoTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileInfoTool {
    fn name(&self) -> &str {
        "get_file_info"
    }

    fn description(&self) -> &str {
        "Get metadata for a file or directory: kind, size in bytes, last modified time, read-only flag."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to inspect, relative to the workspace"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolResult, ToolError> {
        let file_path = required_str(arguments, "file_path")?;
        let path = confine(&self.workspace, self.name(), file_path)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Failed to stat {file_path}: {e}"
                )));
            }
        };

        let kind = if metadata.is_dir() {
            "directory"
        } else if metadata.is_file() {
            "file"
        } else {
            "other"
        };
        let modified = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        let info = serde_json::json!({
            "path": self.workspace.display(&path),
            "kind": kind,
            "size": metadata.len(),
            "modified": modified,
            "readonly": metadata.permissions().readonly(),
        });

        Ok(ToolResult::ok(info.to_string()))
    }
}
