//! `write_file` — create or overwrite a file inside the workspace.

use crate::workspace::Workspace;
use crate::{confine, required_str};
use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, Tool, ToolResult};
use async_trait::async_trait;
use tracing::debug;

pub struct WriteFileTool {
    workspace: Workspace,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file and any missing parent directories, overwrites if it exists."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to write, relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolResult, ToolError> {
        let file_path = required_str(arguments, "file_path")?;
        let content = required_str(arguments, "content")?;
        let path = confine(&self.workspace, self.name(), file_path)?;

        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolResult::failure(format!(
                "Failed to create directory for {file_path}: {e}"
            )));
        }

        debug!(path = %path.display(), bytes = content.len(), "Writing file");

        match tokio::fs::write(&path, content).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Wrote {} bytes to {}",
                content.len(),
                self.workspace.display(&path)
            ))),
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to write file {file_path}: {e}"
            ))),
        }
    }
}
