//! Parallel batch execution of the tool calls from one model turn.
//!
//! Read-only tools run concurrently and are joined before anything else
//! happens; mutating tools then run one at a time in the order the model
//! wrote them. Results are always reported in request order within each
//! group, never in completion order.

use crate::arguments;
use crate::cancel::{self, Cancelled};
use crate::session::SessionState;
use crate::sink::OrchestrationSink;
use actloop_core::tool::{ToolCall, ToolExecutor, ToolResult};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Tools whose concurrent execution cannot corrupt shared state.
pub const PARALLEL_SAFE_TOOLS: &[&str] = &["read_file", "list_files", "get_file_info", "search_files"];

pub fn is_parallel_safe(tool: &str) -> bool {
    PARALLEL_SAFE_TOOLS.contains(&tool)
}

/// What one batch produced, in reporting order.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub executions: Vec<(ToolCall, ToolResult)>,
}

impl BatchOutcome {
    pub fn successes(&self) -> usize {
        self.executions.iter().filter(|(_, r)| r.success).count()
    }

    pub fn failures(&self) -> usize {
        self.executions.len() - self.successes()
    }

    /// The synthesized message fed back to the model.
    pub fn results_message(&self) -> String {
        let mut out = String::from("Tool execution results:");
        for (call, result) in &self.executions {
            let mark = if result.success { "✓" } else { "✗" };
            out.push_str(&format!("\n\n[{}] {mark}\n", call.summary()));
            if result.success {
                out.push_str(result.text());
            } else {
                out.push_str(&format!("Error: {}", result.text()));
            }
        }
        out
    }
}

/// Execute every call from one model turn.
///
/// `context` is the text the calls came from; it feeds argument repair.
pub async fn execute_batch(
    calls: Vec<ToolCall>,
    context: &str,
    executor: &dyn ToolExecutor,
    state: &mut SessionState,
    sink: &dyn OrchestrationSink,
    cancel: &CancellationToken,
) -> Result<BatchOutcome, Cancelled> {
    let calls: Vec<ToolCall> = calls
        .iter()
        .map(|call| arguments::repair(call, context))
        .collect();
    let (parallel, sequential): (Vec<ToolCall>, Vec<ToolCall>) =
        calls.into_iter().partition(|c| is_parallel_safe(&c.name));

    info!(
        parallel = parallel.len(),
        sequential = sequential.len(),
        "Executing tool batch"
    );

    let mut outcome = BatchOutcome::default();

    if !parallel.is_empty() {
        let futures = parallel.iter().map(|call| executor.execute(call));
        // join_all yields outputs in input order regardless of completion order.
        let results = cancel::race(cancel, join_all(futures)).await?;
        for (call, result) in parallel.into_iter().zip(results) {
            report(state, sink, &call, &result);
            outcome.executions.push((call, result));
        }
    }

    for call in sequential {
        debug!(tool = %call.name, "Executing sequential tool call");
        let result = cancel::race(cancel, executor.execute(&call)).await?;
        report(state, sink, &call, &result);
        outcome.executions.push((call, result));
    }

    Ok(outcome)
}

fn report(state: &mut SessionState, sink: &dyn OrchestrationSink, call: &ToolCall, result: &ToolResult) {
    state.record_execution(call, result);
    sink.on_tool_execution(call, result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use crate::test_helpers::{RecordingSink, ScriptedExecutor, call};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn classification() {
        for tool in ["read_file", "list_files", "get_file_info", "search_files"] {
            assert!(is_parallel_safe(tool));
        }
        for tool in ["write_file", "run_command", "search_replace", "custom"] {
            assert!(!is_parallel_safe(tool));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_only_calls_run_concurrently_in_request_order() {
        let executor = ScriptedExecutor::new()
            .with_delay("read_file", Duration::from_millis(500))
            .with_delay("search_files", Duration::from_millis(10));
        let mut state = SessionState::new();

        let outcome = execute_batch(
            vec![
                call("read_file", json!({"file_path": "a.txt"})),
                call("search_files", json!({"pattern": "x"})),
            ],
            "",
            &executor,
            &mut state,
            &NullSink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(executor.max_in_flight(), 2);
        // search_files finished first, but reporting follows submission order.
        assert_eq!(executor.completion_order(), vec!["search_files", "read_file"]);
        let names: Vec<&str> = outcome.executions.iter().map(|(c, _)| c.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "search_files"]);
        let logged: Vec<&str> = state.executions().iter().map(|r| r.call.name.as_str()).collect();
        assert_eq!(logged, vec!["read_file", "search_files"]);
    }

    #[tokio::test(start_paused = true)]
    async fn mutating_calls_run_one_at_a_time_after_reads() {
        let executor = ScriptedExecutor::new()
            .with_delay("run_command", Duration::from_millis(100))
            .with_delay("write_file", Duration::from_millis(100));
        let mut state = SessionState::new();
        let sink = RecordingSink::default();

        let outcome = execute_batch(
            vec![
                call("run_command", json!({"command": "mkdir -p src"})),
                call("read_file", json!({"file_path": "a.txt"})),
                call("write_file", json!({"file_path": "src/a.js", "content": "x"})),
            ],
            "",
            &executor,
            &mut state,
            &sink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let names: Vec<&str> = outcome.executions.iter().map(|(c, _)| c.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "run_command", "write_file"]);
        assert_eq!(executor.started(), vec!["read_file", "run_command", "write_file"]);
        assert_eq!(executor.max_in_flight(), 1);
        assert_eq!(sink.tool_names(), vec!["read_file", "run_command", "write_file"]);

        let change = &state.file_changes()[0];
        assert_eq!(change.path, "src/a.js");
        assert_eq!(change.after.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn failures_are_recorded_not_raised() {
        let executor = ScriptedExecutor::new().failing("write_file", "disk full");
        let mut state = SessionState::new();

        let outcome = execute_batch(
            vec![call("write_file", json!({"file_path": "a", "content": "b"}))],
            "",
            &executor,
            &mut state,
            &NullSink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.failures(), 1);
        assert!(state.file_changes().is_empty());
        assert!(outcome.results_message().contains("Error: disk full"));
    }

    #[tokio::test]
    async fn placeholder_arguments_repaired_before_execution() {
        let executor = ScriptedExecutor::new();
        let mut state = SessionState::new();

        execute_batch(
            vec![call("run_command", json!({"command": "{{command}}"}))],
            "Create a new directory 'my-app'",
            &executor,
            &mut state,
            &NullSink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let executed = &state.executions()[0].call;
        assert_eq!(executed.arg_str("command"), Some("mkdir -p my-app"));
        assert_eq!(executed.arg_str("cwd"), Some("."));
    }

    #[tokio::test]
    async fn cancelled_batch_stops() {
        let executor = ScriptedExecutor::new();
        let mut state = SessionState::new();
        let token = CancellationToken::new();
        token.cancel();

        let result = execute_batch(
            vec![call("run_command", json!({"command": "ls"}))],
            "",
            &executor,
            &mut state,
            &NullSink,
            &token,
        )
        .await;

        assert_eq!(result.unwrap_err(), Cancelled);
        assert!(state.executions().is_empty());
    }

    #[test]
    fn results_message_format() {
        let outcome = BatchOutcome {
            executions: vec![(
                call("read_file", json!({"file_path": "a.txt"})),
                ToolResult::ok("hello"),
            )],
        };
        assert_eq!(
            outcome.results_message(),
            "Tool execution results:\n\n[read_file({\"file_path\":\"a.txt\"})] ✓\nhello"
        );
    }
}
