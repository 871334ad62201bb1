//! `search_replace` — literal find-and-replace in one file.

use crate::workspace::Workspace;
use crate::{confine, required_str};
use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, Tool, ToolResult};
use async_trait::async_trait;

pub struct SearchReplaceTool {
    workspace: Workspace,
}

impl SearchReplaceTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for SearchReplaceTool {
    fn name(&self) -> &str {
        "search_replace"
    }

    fn description(&self) -> &str {
        "Replace every occurrence of a literal string in a file. Fails if the string does not occur."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "File to edit" },
                "search": { "type": "string", "description": "Exact text to find" },
                "replace": { "type": "string", "description": "Replacement text" }
            },
            "required": ["file_path", "search", "replace"]
        })
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolResult, ToolError> {
        let file_path = required_str(arguments, "file_path")?;
        let search = required_str(arguments, "search")?;
        let replace = required_str(arguments, "replace")?;
        if search.is_empty() {
            return Err(ToolError::InvalidArguments("'search' must not be empty".into()));
        }
        let path = confine(&self.workspace, self.name(), file_path)?;

        let original = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Failed to read file {file_path}: {e}"
                )));
            }
        };

        let occurrences = original.matches(search).count();
        if occurrences == 0 {
            return Ok(ToolResult::failure(format!(
                "Search text not found in {file_path}"
            )));
        }

        let updated = original.replace(search, replace);
        if let Err(e) = tokio::fs::write(&path, updated).await {
            return Ok(ToolResult::failure(format!(
                "Failed to write file {file_path}: {e}"
            )));
        }

        Ok(ToolResult::ok(format!(
            "Replaced {occurrences} occurrence(s) in {}",
            self.workspace.display(&path)
        )))
    }
}
