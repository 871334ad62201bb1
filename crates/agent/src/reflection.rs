//! Reflection — corrective guidance after repeated failure.
//!
//! When consecutive failures reach the threshold, the engine summarizes its
//! recent history and asks the model what went wrong. The reply joins the
//! transcript as ordinary assistant text; reflection never edits the plan.

use crate::cancel::Cancelled;
use crate::model::ModelClient;
use crate::session::SessionState;
use crate::sink::OrchestrationSink;
use actloop_core::error::ProviderError;
use actloop_core::message::{Message, Role};
use tokio_util::sync::CancellationToken;
use tracing::info;

const RECENT_ERRORS: usize = 5;
const RECENT_EXECUTIONS: usize = 10;
const RECENT_CHANGES: usize = 10;

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Build the reflection meta-prompt from session history.
pub fn build_prompt(state: &SessionState) -> String {
    let mut prompt = String::from(
        "Several consecutive attempts have failed. Reflect on what went wrong and how to fix it.\n",
    );

    prompt.push_str("\nRecent errors:\n");
    let errors = tail(state.errors(), RECENT_ERRORS);
    if errors.is_empty() {
        prompt.push_str("- none\n");
    }
    for error in errors {
        prompt.push_str(&format!("- {error}\n"));
    }

    prompt.push_str("\nRecent tool executions:\n");
    let executions = tail(state.executions(), RECENT_EXECUTIONS);
    if executions.is_empty() {
        prompt.push_str("- none\n");
    }
    for record in executions {
        prompt.push_str(&format!("- {}\n", record.summary()));
    }

    prompt.push_str("\nRecent file changes:\n");
    let changes = tail(state.file_changes(), RECENT_CHANGES);
    if changes.is_empty() {
        prompt.push_str("- none\n");
    }
    for change in changes {
        prompt.push_str(&format!("- {:?} {}\n", change.operation, change.path));
    }

    let plan_line = match &state.plan {
        Some(plan) => format!(
            "\nActive plan: yes (step {} of {})\n",
            (plan.current_step + 1).min(plan.steps.len()),
            plan.steps.len()
        ),
        None => "\nActive plan: no\n".to_string(),
    };
    prompt.push_str(&plan_line);

    prompt.push_str(
        "\nExplain the root cause briefly, then state the corrected next action as a tool call.",
    );
    prompt
}

/// Run one reflection cycle.
///
/// On success the reply is appended to the transcript and reported, and
/// the error log is drained. A failed request is returned untouched.
pub async fn reflect(
    client: ModelClient<'_>,
    system_message: &str,
    state: &mut SessionState,
    sink: &dyn OrchestrationSink,
    cancel: &CancellationToken,
) -> Result<Result<String, ProviderError>, Cancelled> {
    info!(errors = state.errors().len(), "Reflecting on repeated failures");
    sink.on_progress("Reflecting on repeated failures");

    let messages = vec![Message::system(system_message), Message::user(build_prompt(state))];
    let reply = client.ask(messages, cancel).await?;
    if let Ok(reply) = &reply {
        state.conversation.push(Message::assistant(reply.clone()));
        sink.on_message(Role::Assistant, reply);
        state.clear_errors();
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanBuilder;
    use crate::sink::NullSink;
    use crate::test_helpers::{SequentialMockProvider, call, last_content};
    use actloop_core::tool::ToolResult;
    use serde_json::json;

    #[test]
    fn prompt_includes_bounded_history() {
        let mut state = SessionState::new();
        for i in 0..8 {
            state.record_error(format!("error {i}"));
        }
        for i in 0..12 {
            state.record_execution(
                &call("write_file", json!({"file_path": format!("f{i}.txt"), "content": "x"})),
                &ToolResult::ok("ok"),
            );
        }
        state.record_execution(&call("run_command", json!({"command": "npm test"})), &ToolResult::failure("1 failing"));

        let prompt = build_prompt(&state);
        assert!(!prompt.contains("error 2"));
        assert!(prompt.contains("error 3"));
        assert!(prompt.contains("error 7"));
        assert!(prompt.contains(r#"run_command({"command":"npm test"}) → ✗"#));
        assert!(!prompt.contains(r#""f2.txt""#));
        assert!(prompt.contains(r#""f3.txt""#));
        assert!(prompt.contains("Modify f11.txt"));
        assert!(!prompt.contains("Modify f1.txt\n"));
        assert!(prompt.contains("Active plan: no"));
    }

    #[test]
    fn prompt_reports_active_plan() {
        let mut state = SessionState::new();
        state.plan = Some(PlanBuilder::default().build("PLAN:\n1. Build the app\n2. Run the tests"));
        assert!(build_prompt(&state).contains("Active plan: yes (step 1 of 2)"));
    }

    #[tokio::test]
    async fn reflection_appends_reply_and_clears_errors() {
        let provider = SequentialMockProvider::texts(&["The path was wrong; use src/ instead."]);
        let mut state = SessionState::new();
        state.record_error("read failed");

        let reply = reflect(
            ModelClient::new(&provider, "m", None),
            "sys",
            &mut state,
            &NullSink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(reply.unwrap().contains("src/"));
        assert!(state.errors().is_empty());
        assert_eq!(state.conversation.last().unwrap().role, Role::Assistant);
        let request = &provider.requests()[0];
        assert_eq!(request.messages.len(), 2);
        assert!(last_content(request).contains("read failed"));
    }

    #[tokio::test]
    async fn failed_reflection_keeps_transcript() {
        let provider = SequentialMockProvider::new(vec![Err(ProviderError::Network("down".into()))]);
        let mut state = SessionState::new();
        state.record_error("write failed");

        let reply = reflect(
            ModelClient::new(&provider, "m", None),
            "sys",
            &mut state,
            &NullSink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(reply, Err(ProviderError::Network(_))));
        assert!(state.conversation.is_empty());
        assert_eq!(state.errors().len(), 1);
    }
}
