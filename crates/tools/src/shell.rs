//! `run_command` — execute a shell command inside the workspace.
//!
//! Supports command allowlisting, a working directory confined to the
//! workspace, and a timeout. The child is killed when the call is dropped,
//! so a cancelled orchestration doesn't leave it running.

use crate::workspace::Workspace;
use crate::{confine, optional_str, required_str};
use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, Tool, ToolResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Execute shell commands with safety constraints.
pub struct RunCommandTool {
    workspace: Workspace,
    /// If non-empty, only these programs are allowed.
    allowed_commands: Vec<String>,
    timeout: Duration,
}

impl RunCommandTool {
    pub fn new(workspace: Workspace, allowed_commands: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            workspace,
            allowed_commands,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }

        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for creating directories, installing dependencies, building and testing."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory, relative to the workspace (default '.')"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolResult, ToolError> {
        let command = required_str(arguments, "command")?;
        let cwd = optional_str(arguments, "cwd").unwrap_or(".");
        let cwd = confine(&self.workspace, self.name(), cwd)?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "run_command".into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, cwd = %cwd.display(), "Executing shell command");

        let mut child = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        child.current_dir(&cwd).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, child.output()).await {
            Ok(output) => output,
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: "run_command".into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();

                if output.status.success() {
                    let text = if stderr.is_empty() {
                        stdout
                    } else {
                        format!("{stdout}\n[stderr]: {stderr}")
                    };
                    let text = text.trim();
                    Ok(ToolResult::ok(if text.is_empty() {
                        "(no output)"
                    } else {
                        text
                    }))
                } else {
                    let code = output.status.code().unwrap_or(-1);
                    warn!(command = %command, exit_code = code, "Command failed");
                    Ok(ToolResult::failure(
                        format!("[exit code: {code}]\n{stdout}\n{stderr}")
                            .trim()
                            .to_string(),
                    ))
                }
            }
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: "run_command".into(),
                reason: e.to_string(),
            }),
        }
    }
}
