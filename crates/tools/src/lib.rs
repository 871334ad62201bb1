//! Built-in tool implementations for actloop.
//!
//! Tools give the engine the ability to act inside a workspace directory:
//! read, write and search files, inspect directories, run shell commands.
//! Every path is confined to the workspace root (see [`workspace`]).
//!
//! The [`parser`] module holds the default free-text tool-call parser.

pub mod file_info;
pub mod file_read;
pub mod file_write;
pub mod list_files;
pub mod parser;
pub mod search_files;
pub mod search_replace;
pub mod shell;
pub mod workspace;

use actloop_config::ToolsConfig;
use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, ToolRegistry};
use std::path::PathBuf;

pub use parser::JsonToolCallParser;
pub use workspace::Workspace;

/// Create a tool registry with all seven built-in tools.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let workspace = Workspace::new(&config.workspace_root);
    let mut registry = ToolRegistry::new();

    registry.register(Box::new(file_read::ReadFileTool::new(workspace.clone())));
    registry.register(Box::new(file_write::WriteFileTool::new(workspace.clone())));
    registry.register(Box::new(list_files::ListFilesTool::new(workspace.clone())));
    registry.register(Box::new(file_info::FileInfoTool::new(workspace.clone())));
    registry.register(Box::new(search_files::SearchFilesTool::new(
        workspace.clone(),
    )));
    registry.register(Box::new(search_replace::SearchReplaceTool::new(
        workspace.clone(),
    )));
    registry.register(Box::new(shell::RunCommandTool::new(
        workspace,
        config.allowed_commands.clone(),
        config.command_timeout_secs,
    )));

    registry
}

pub(crate) fn required_str<'a>(arguments: &'a Arguments, key: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

pub(crate) fn optional_str<'a>(arguments: &'a Arguments, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

pub(crate) fn confine(
    workspace: &Workspace,
    tool_name: &str,
    path: &str,
) -> Result<PathBuf, ToolError> {
    workspace
        .resolve(path)
        .map_err(|e| ToolError::PermissionDenied {
            tool_name: tool_name.into(),
            reason: e.to_string(),
        })
}
