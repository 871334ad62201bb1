//! Session state — the single mutable aggregate a conversation owns.
//!
//! One [`SessionState`] lives for the lifetime of one conversation and keeps
//! accumulating across user turns. Only the dialogue loop and its sub-phases
//! mutate it. The execution and file-change logs are append-only; the error
//! log is append-only except that a reflection cycle drains it.

use crate::plan::ExecutionPlan;
use actloop_core::message::Conversation;
use actloop_core::tool::{ToolCall, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One executed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub id: String,
    pub call: ToolCall,
    pub result: ToolResult,
    pub timestamp: DateTime<Utc>,
}

impl ToolExecutionRecord {
    /// `tool(args) → ✓` or `tool(args) → ✗`.
    pub fn summary(&self) -> String {
        let mark = if self.result.success { "✓" } else { "✗" };
        format!("{} → {mark}", self.call.summary())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Modify,
    Delete,
}

/// A file mutated by a successful tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangeRecord {
    pub path: String,
    pub operation: FileOperation,
    pub before: Option<String>,
    pub after: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Counts over the execution and file-change logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub executions: usize,
    pub successes: usize,
    pub failures: usize,
    /// Distinct paths touched, sorted.
    pub files_touched: Vec<String>,
}

impl std::fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Execution summary:")?;
        writeln!(
            f,
            "- Tool executions: {} ({} succeeded, {} failed)",
            self.executions, self.successes, self.failures
        )?;
        write!(f, "- Files touched: {}", self.files_touched.len())?;
        for path in &self.files_touched {
            write!(f, "\n  - {path}")?;
        }
        Ok(())
    }
}

/// Everything the engine knows about one conversation.
#[derive(Debug, Default)]
pub struct SessionState {
    /// The active plan, if any. At most one plan is active at a time.
    pub plan: Option<ExecutionPlan>,

    /// Transcript sent to the model (system prompt excluded).
    pub conversation: Conversation,

    /// Auxiliary key-value context.
    pub context: HashMap<String, serde_json::Value>,

    executions: Vec<ToolExecutionRecord>,
    file_changes: Vec<FileChangeRecord>,
    errors: Vec<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions(&self) -> &[ToolExecutionRecord] {
        &self.executions
    }

    pub fn file_changes(&self) -> &[FileChangeRecord] {
        &self.file_changes
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Index of the current plan step, if a plan is active.
    pub fn current_step(&self) -> Option<usize> {
        self.plan.as_ref().map(|p| p.current_step)
    }

    /// Append an execution record, plus a file-change record when the call
    /// was a successful mutation.
    pub fn record_execution(&mut self, call: &ToolCall, result: &ToolResult) {
        if result.success
            && let Some(change) = file_change_for(call)
        {
            self.file_changes.push(change);
        }

        self.executions.push(ToolExecutionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            call: call.clone(),
            result: result.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Drain the error log. Only a reflection cycle does this.
    pub(crate) fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn summary(&self) -> ExecutionSummary {
        let successes = self.executions.iter().filter(|r| r.result.success).count();
        let files: BTreeSet<&str> = self.file_changes.iter().map(|c| c.path.as_str()).collect();
        ExecutionSummary {
            executions: self.executions.len(),
            successes,
            failures: self.executions.len() - successes,
            files_touched: files.into_iter().map(String::from).collect(),
        }
    }
}

fn file_change_for(call: &ToolCall) -> Option<FileChangeRecord> {
    let path = call.arg_str("file_path")?.to_string();
    let after = match call.name.as_str() {
        "write_file" => call.arg_str("content").map(String::from),
        "search_replace" => None,
        _ => return None,
    };
    Some(FileChangeRecord {
        path,
        operation: FileOperation::Modify,
        before: None,
        after,
        timestamp: Utc::now(),
    })
}
