//! The dialogue loop.
//!
//! One [`Orchestrator`] owns one [`SessionState`] for the lifetime of a
//! conversation; every user turn goes through [`Orchestrator::orchestrate`]
//! and keeps accumulating into the same state. Turns take `&mut self`, so
//! two turns can never overlap on one instance.
//!
//! Each iteration asks the model once and then takes exactly one branch:
//!
//! 1. the reply contains tool calls: run them as a batch
//! 2. the reply announces work and no plan is active: build a plan
//! 3. a plan is active: advance it by one step
//! 4. otherwise: ask the completion oracle, and stop if it says so
//!
//! Consecutive failures trigger a reflection once they reach the threshold.

use crate::batch;
use crate::cancel::Cancelled;
use crate::completion::{self, KeywordClassifier, ReplyClassifier};
use crate::executor::{ExecutionEngine, StepOutcome};
use crate::model::ModelClient;
use crate::plan::PlanBuilder;
use crate::reflection;
use crate::session::{ExecutionSummary, SessionState};
use crate::sink::OrchestrationSink;
use actloop_config::AppConfig;
use actloop_core::error::ProviderError;
use actloop_core::message::{Message, Role};
use actloop_core::provider::Provider;
use actloop_core::tool::{ToolCallParser, ToolExecutor};
use actloop_core::{DependencyPolicy, RetryPolicy};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Injected when the model neither acts nor finishes.
const TOOL_USE_REMINDER: &str = "The task is not complete yet. Do not describe what you would do: \
call the tools needed for the next step now, or write a numbered PLAN:.";

/// Loop tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    pub max_iterations: u32,
    pub reflection_threshold: u32,
    pub retry: RetryPolicy,
    pub dependency_policy: DependencyPolicy,
    pub temperature: Option<f32>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            reflection_threshold: 3,
            retry: RetryPolicy::default(),
            dependency_policy: DependencyPolicy::default(),
            temperature: None,
        }
    }
}

impl From<&AppConfig> for OrchestratorOptions {
    fn from(config: &AppConfig) -> Self {
        let orch = &config.orchestrator;
        Self {
            max_iterations: orch.max_iterations,
            reflection_threshold: orch.reflection_threshold,
            retry: orch.retry,
            dependency_policy: orch.dependency_policy,
            temperature: config.temperature,
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The oracle confirmed the task is done; `answer` is the final reply.
    Completed { answer: String, reason: Option<String> },
    /// The iteration budget ran out. `summary` is present only if files changed.
    MaxIterations { summary: Option<ExecutionSummary> },
    /// The caller cancelled the turn.
    Cancelled,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolExecutor>,
    parser: Arc<dyn ToolCallParser>,
    classifier: Arc<dyn ReplyClassifier>,
    options: OrchestratorOptions,
    state: SessionState,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        parser: Arc<dyn ToolCallParser>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            provider,
            tools,
            parser,
            classifier: Arc::new(KeywordClassifier),
            options,
            state: SessionState::new(),
        }
    }

    /// Replace the default keyword classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn ReplyClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// The session accumulated so far.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run one user turn to completion, budget exhaustion, or cancellation.
    ///
    /// Model and tool failures never abort the turn; they surface through
    /// `sink` as system messages.
    pub async fn orchestrate(
        &mut self,
        user_message: &str,
        system_message: &str,
        model: &str,
        sink: &dyn OrchestrationSink,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        match self.run_turn(user_message, system_message, model, sink, cancel).await {
            Ok(outcome) => outcome,
            Err(Cancelled) => {
                info!("Turn cancelled");
                sink.on_message(Role::System, "Orchestration cancelled");
                TurnOutcome::Cancelled
            }
        }
    }

    async fn run_turn(
        &mut self,
        user_message: &str,
        system_message: &str,
        model: &str,
        sink: &dyn OrchestrationSink,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let client = ModelClient::new(self.provider.as_ref(), model, self.options.temperature);
        let engine = ExecutionEngine::new(
            self.tools.as_ref(),
            self.options.retry,
            self.options.dependency_policy,
        );
        let planner = PlanBuilder::default().with_max_retries(self.options.retry.max_retries);
        let classifier = self.classifier.as_ref();
        let state = &mut self.state;
        let max_iterations = self.options.max_iterations;
        let threshold = self.options.reflection_threshold;

        state.conversation.push(Message::user(user_message));
        let mut failures: u32 = 0;

        for iteration in 1..=max_iterations {
            debug!(
                conversation_id = %state.conversation.id,
                iteration,
                history = state.conversation.len(),
                "Dialogue iteration"
            );
            sink.on_progress(&format!("Iteration {iteration}/{max_iterations}"));

            let mut messages = Vec::with_capacity(state.conversation.len() + 1);
            messages.push(Message::system(system_message));
            messages.extend(state.conversation.messages.iter().cloned());

            let reply = match client.ask(messages, cancel).await? {
                Ok(reply) => reply,
                Err(e) => {
                    report_model_failure(state, sink, "Model request", &e);
                    failures += 1;
                    if failures >= threshold {
                        failures = reflect(client, system_message, state, sink, cancel).await?;
                    }
                    continue;
                }
            };
            state.conversation.push(Message::assistant(reply.clone()));

            let calls = self.parser.parse(&reply);
            if !calls.is_empty() {
                let outcome =
                    batch::execute_batch(calls, &reply, self.tools.as_ref(), state, sink, cancel).await?;
                debug!(
                    successes = outcome.successes(),
                    failures = outcome.failures(),
                    "Tool batch finished"
                );
                state.conversation.push(Message::user(outcome.results_message()));
                failures = 0;
            } else if state.plan.is_none()
                && classifier.has_action_intent(&reply)
                && let Some(plan) = Some(planner.build(&reply)).filter(|p| !p.is_empty())
            {
                info!(steps = plan.steps.len(), "Plan created");
                sink.on_progress(&format!("Plan created with {} steps", plan.steps.len()));
                state.plan = Some(plan);
            } else if state.plan.is_some() {
                let description = state
                    .plan
                    .as_ref()
                    .and_then(|p| p.current())
                    .map(|s| s.description.clone())
                    .unwrap_or_default();
                let outcome = engine.advance(state, sink, cancel).await?;
                match &outcome {
                    StepOutcome::Succeeded { .. } => failures = 0,
                    StepOutcome::Failed { .. } | StepOutcome::Waiting { .. } => failures += 1,
                    StepOutcome::Idle => {}
                }
                if let Some(feedback) = outcome.feedback(&description) {
                    state.conversation.push(Message::user(feedback));
                }
            } else {
                let verdict = completion::ask_oracle(
                    client,
                    classifier,
                    system_message,
                    user_message,
                    &reply,
                    state,
                    cancel,
                )
                .await?;
                match verdict {
                    Ok(verdict) if verdict.complete => {
                        info!(iteration, "Task complete");
                        sink.on_message(Role::Assistant, &reply);
                        return Ok(TurnOutcome::Completed {
                            answer: reply,
                            reason: verdict.reason,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        report_model_failure(state, sink, "Completion check", &e);
                        failures += 1;
                    }
                }
                state.conversation.push(Message::user(TOOL_USE_REMINDER));
            }

            if failures >= threshold {
                failures = reflect(client, system_message, state, sink, cancel).await?;
            }
        }

        warn!(max_iterations, "Iteration budget exhausted");
        let summary = if state.file_changes().is_empty() {
            sink.on_message(
                Role::System,
                &format!("Maximum iterations ({max_iterations}) reached"),
            );
            None
        } else {
            let summary = state.summary();
            sink.on_message(
                Role::System,
                &format!("Maximum iterations ({max_iterations}) reached\n\n{summary}"),
            );
            Some(summary)
        };
        Ok(TurnOutcome::MaxIterations { summary })
    }
}

/// Log a failed model request, keep it in the error log, and surface it.
fn report_model_failure(
    state: &mut SessionState,
    sink: &dyn OrchestrationSink,
    request: &str,
    error: &ProviderError,
) {
    warn!(request, error = %error, "Model request failed");
    let text = format!("{request} failed: {error}");
    state.record_error(text.clone());
    sink.on_message(Role::System, &text);
}

/// Reflect and return the failure count to continue from: zero after a
/// reflection, one if the reflection request itself failed.
async fn reflect(
    client: ModelClient<'_>,
    system_message: &str,
    state: &mut SessionState,
    sink: &dyn OrchestrationSink,
    cancel: &CancellationToken,
) -> Result<u32, Cancelled> {
    match reflection::reflect(client, system_message, state, sink, cancel).await? {
        Ok(_) => Ok(0),
        Err(e) => {
            report_model_failure(state, sink, "Reflection request", &e);
            Ok(1)
        }
    }
}
