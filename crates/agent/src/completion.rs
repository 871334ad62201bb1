//! Completion oracle and the reply classifier behind it.
//!
//! Deciding whether free text "wants to act" or "says it is done" is
//! heuristic. The loop only talks to [`ReplyClassifier`], so the keyword
//! rules here can be swapped without touching control flow.

use crate::cancel::Cancelled;
use crate::model::ModelClient;
use crate::session::SessionState;
use actloop_core::error::ProviderError;
use actloop_core::message::Message;
use regex_lite::Regex;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The oracle's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionVerdict {
    pub complete: bool,
    pub reason: Option<String>,
}

impl CompletionVerdict {
    pub fn incomplete() -> Self {
        Self::default()
    }
}

/// Classifies model replies for the dialogue loop.
pub trait ReplyClassifier: Send + Sync {
    /// Whether the reply announces work it has not yet expressed as tool calls.
    fn has_action_intent(&self, reply: &str) -> bool;

    /// Read a `COMPLETE:` / `REASON:` answer. Anything unrecognized is "not complete".
    fn parse_completion(&self, reply: &str) -> CompletionVerdict;
}

static ACTION_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:create|run|install|build|write|make|execute|set\s+up|initialize|generate|add|update|delete|modify)\b",
    )
    .expect("action intent regex must compile")
});
static COMPLETE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*COMPLETE:\s*(yes|no)\W*$").expect("complete regex must compile")
});
static REASON_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*REASON:\s*(.+)$").expect("reason regex must compile")
});

/// Keyword and label matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl ReplyClassifier for KeywordClassifier {
    fn has_action_intent(&self, reply: &str) -> bool {
        ACTION_INTENT.is_match(reply)
    }

    fn parse_completion(&self, reply: &str) -> CompletionVerdict {
        let Some(caps) = COMPLETE_LINE.captures(reply) else {
            return CompletionVerdict::incomplete();
        };
        let complete = caps[1].eq_ignore_ascii_case("yes");
        let reason = REASON_LINE
            .captures(reply)
            .map(|c| c[1].trim().to_string())
            .filter(|r| !r.is_empty());
        CompletionVerdict { complete, reason }
    }
}

/// The meta-prompt asking whether `task` is finished.
pub fn build_prompt(task: &str, latest_reply: &str, state: &SessionState) -> String {
    format!(
        "Decide whether the task below is finished.\n\n\
         Original task:\n{task}\n\n\
         Latest response:\n{latest_reply}\n\n\
         Progress so far: {} tool executions, {} file changes.\n\n\
         Answer with exactly two lines:\n\
         COMPLETE: yes|no\n\
         REASON: <one sentence>",
        state.executions().len(),
        state.file_changes().len()
    )
}

/// Ask the model whether the task is finished.
///
/// The exchange is not added to the transcript. A failed request is
/// returned to the caller, which treats it like any other model failure.
pub async fn ask_oracle(
    client: ModelClient<'_>,
    classifier: &dyn ReplyClassifier,
    system_message: &str,
    task: &str,
    latest_reply: &str,
    state: &SessionState,
    cancel: &CancellationToken,
) -> Result<Result<CompletionVerdict, ProviderError>, Cancelled> {
    let messages = vec![
        Message::system(system_message),
        Message::user(build_prompt(task, latest_reply, state)),
    ];
    let verdict = client.ask(messages, cancel).await?.map(|answer| {
        let verdict = classifier.parse_completion(&answer);
        info!(complete = verdict.complete, reason = ?verdict.reason, "Completion verdict");
        verdict
    });
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{SequentialMockProvider, last_content};

    #[test]
    fn parses_completion_with_reason() {
        let verdict = KeywordClassifier.parse_completion("COMPLETE: yes\nREASON: all files written");
        assert_eq!(
            verdict,
            CompletionVerdict {
                complete: true,
                reason: Some("all files written".into())
            }
        );
    }

    #[test]
    fn labels_are_case_insensitive() {
        let verdict = KeywordClassifier.parse_completion("Sure.\ncomplete: NO\nreason: tests still fail");
        assert!(!verdict.complete);
        assert_eq!(verdict.reason.as_deref(), Some("tests still fail"));
    }

    #[test]
    fn echoed_template_line_is_not_an_answer() {
        let verdict = KeywordClassifier.parse_completion("COMPLETE: yes|no\nREASON: <one sentence>");
        assert!(!verdict.complete);

        let verdict = KeywordClassifier.parse_completion("Format is COMPLETE: yes|no.\nCOMPLETE: no\nREASON: tests fail");
        assert_eq!(verdict.reason.as_deref(), Some("tests fail"));
        assert!(!verdict.complete);

        assert!(KeywordClassifier.parse_completion("COMPLETE: Yes.\nREASON: done").complete);
    }

    #[test]
    fn missing_labels_mean_incomplete() {
        let verdict = KeywordClassifier.parse_completion("I think we're done here.");
        assert_eq!(verdict, CompletionVerdict::incomplete());
    }

    #[test]
    fn action_intent_needs_whole_words() {
        let c = KeywordClassifier;
        assert!(c.has_action_intent("I'll create the config file next."));
        assert!(c.has_action_intent("Let me Set Up the project."));
        assert!(c.has_action_intent("We should run the tests"));
        assert!(!c.has_action_intent("The function returns a builder."));
        assert!(!c.has_action_intent("Everything looks correct."));
    }

    #[tokio::test]
    async fn oracle_embeds_task_and_counts() {
        let provider = SequentialMockProvider::texts(&["COMPLETE: yes\nREASON: done"]);
        let state = SessionState::new();

        let verdict = ask_oracle(
            ModelClient::new(&provider, "m", None),
            &KeywordClassifier,
            "sys",
            "Write hello.txt",
            "I wrote it.",
            &state,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(verdict.complete);
        let request = &provider.requests()[0];
        let prompt = last_content(request);
        assert!(prompt.contains("Write hello.txt"));
        assert!(prompt.contains("I wrote it."));
        assert!(prompt.contains("0 tool executions, 0 file changes"));
        assert!(state.conversation.is_empty());
    }

    #[tokio::test]
    async fn oracle_failure_is_returned() {
        let provider = SequentialMockProvider::new(vec![Err(ProviderError::Timeout { timeout_secs: 300 })]);
        let state = SessionState::new();

        let verdict = ask_oracle(
            ModelClient::new(&provider, "m", None),
            &KeywordClassifier,
            "sys",
            "task",
            "reply",
            &state,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(verdict, Err(ProviderError::Timeout { .. })));
        assert!(state.conversation.is_empty());
    }
}
