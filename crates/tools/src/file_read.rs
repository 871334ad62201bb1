//! `read_file` — read file contents inside the workspace.

use crate::workspace::Workspace;
use crate::{confine, required_str};
use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, Tool, ToolResult};
use async_trait::async_trait;

pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to read, relative to the workspace"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolResult, ToolError> {
        let file_path = required_str(arguments, "file_path")?;
        let path = confine(&self.workspace, self.name(), file_path)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to read file {file_path}: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn tool_definition() {
        let tool = ReadFileTool::new(Workspace::new("."));
        assert_eq!(tool.name(), "read_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["file_path"]));
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.txt"), "Hello, world!\n").unwrap();

        let tool = ReadFileTool::new(Workspace::new(dir.path()));
        let result = tool
            .execute(&args(serde_json::json!({"file_path": "test.txt"})))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.text().contains("Hello, world!"));
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(Workspace::new(dir.path()));
        let result = tool
            .execute(&args(serde_json::json!({"file_path": "missing.txt"})))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.text().contains("Failed to read file"));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let tool = ReadFileTool::new(Workspace::new("."));
        let result = tool.execute(&Arguments::new()).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn path_traversal_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(Workspace::new(dir.path()));
        let result = tool
            .execute(&args(serde_json::json!({"file_path": "../../../etc/passwd"})))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
