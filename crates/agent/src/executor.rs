//! Plan-driven execution engine.
//!
//! Advances the active plan by at most one step per call:
//!
//! 1. Gate on the current step's dependencies ([`DependencyPolicy`]).
//! 2. Re-validate the step's arguments.
//! 3. Attempt the tool up to `max_retries` times with exponential backoff
//!    (no delay before the first attempt, then `base^attempt` seconds),
//!    recording every attempt.
//! 4. On success advance the index; on exhaustion keep the step current so
//!    the next call retries it.

use crate::arguments;
use crate::cancel::{self, Cancelled};
use crate::plan::StepStatus;
use crate::session::SessionState;
use crate::sink::OrchestrationSink;
use actloop_core::message::Role;
use actloop_core::tool::{ToolExecutor, ToolResult};
use actloop_core::{DependencyPolicy, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The result of one [`ExecutionEngine::advance`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The step succeeded and the plan moved on.
    Succeeded {
        step_id: String,
        result: ToolResult,
        /// The step was the last one; the plan has been retired.
        plan_complete: bool,
    },
    /// Every attempt failed; the step stays current.
    Failed { step_id: String, result: ToolResult },
    /// Dependencies are not satisfied yet; nothing ran.
    Waiting { step_id: String, pending: Vec<String> },
    /// No plan is active, or it has no steps left.
    Idle,
}

impl StepOutcome {
    /// Text fed back to the model, if the outcome carries a result.
    pub fn feedback(&self, description: &str) -> Option<String> {
        match self {
            Self::Succeeded { step_id, result, .. } => Some(format!(
                "Plan step {step_id} ({description}) succeeded:\n{}",
                result.text()
            )),
            Self::Failed { step_id, result } => Some(format!(
                "Plan step {step_id} ({description}) failed:\n{}",
                result.text()
            )),
            Self::Waiting { .. } | Self::Idle => None,
        }
    }
}

pub struct ExecutionEngine<'a> {
    executor: &'a dyn ToolExecutor,
    retry: RetryPolicy,
    policy: DependencyPolicy,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(executor: &'a dyn ToolExecutor, retry: RetryPolicy, policy: DependencyPolicy) -> Self {
        Self {
            executor,
            retry,
            policy,
        }
    }

    /// Advance the active plan by one step.
    pub async fn advance(
        &self,
        state: &mut SessionState,
        sink: &dyn OrchestrationSink,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, Cancelled> {
        let Some(plan) = state.plan.as_ref() else {
            return Ok(StepOutcome::Idle);
        };
        if plan.is_complete() {
            state.plan = None;
            return Ok(StepOutcome::Idle);
        }

        let index = plan.current_step;
        let total = plan.steps.len();
        let Some(step) = plan.current() else {
            return Ok(StepOutcome::Idle);
        };
        let step_id = step.id.clone();
        let description = step.description.clone();
        let max_attempts = step.max_retries.max(1);

        let pending = plan.unsatisfied_dependencies(self.policy);
        if !pending.is_empty() {
            debug!(step = %step_id, ?pending, "Step waiting on dependencies");
            sink.on_progress(&format!(
                "Step {step_id} waiting on {}",
                pending.join(", ")
            ));
            return Ok(StepOutcome::Waiting { step_id, pending });
        }

        let call = arguments::repair(&step.to_call(), &description);
        sink.on_progress(&format!(
            "Executing step {}/{total}: {description}",
            index + 1
        ));

        let mut last = ToolResult::failure("step was not attempted");
        for attempt in 0..max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                info!(step = %step_id, attempt = attempt + 1, delay_secs = delay.as_secs(), "Backing off before retry");
                sink.on_progress(&format!(
                    "Retrying step {step_id} in {}s (attempt {}/{max_attempts})",
                    delay.as_secs(),
                    attempt + 1
                ));
            }
            cancel::sleep(cancel, delay).await?;

            if let Some(step) = state.plan.as_mut().and_then(|p| p.steps.get_mut(index)) {
                step.retry_count += 1;
            }
            let result = cancel::race(cancel, self.executor.execute(&call)).await?;
            state.record_execution(&call, &result);
            sink.on_tool_execution(&call, &result);

            if result.success {
                let plan_complete = self.mark_succeeded(state, index);
                info!(step = %step_id, attempt = attempt + 1, "Step succeeded");
                if plan_complete {
                    sink.on_progress("Plan complete");
                }
                return Ok(StepOutcome::Succeeded {
                    step_id,
                    result,
                    plan_complete,
                });
            }

            warn!(step = %step_id, attempt = attempt + 1, error = %result.text(), "Step attempt failed");
            last = result;
        }

        let reason = last.text().to_string();
        if let Some(step) = state.plan.as_mut().and_then(|p| p.steps.get_mut(index)) {
            step.status = StepStatus::Failed(reason.clone());
        }
        state.record_error(format!("Step {step_id} failed: {reason}"));
        sink.on_message(
            Role::System,
            &format!("Step {step_id} ({description}) failed after {max_attempts} attempts: {reason}"),
        );

        Ok(StepOutcome::Failed {
            step_id,
            result: last,
        })
    }

    /// Mark the step succeeded and move past it. Returns whether the plan is
    /// now finished, in which case it is retired.
    fn mark_succeeded(&self, state: &mut SessionState, index: usize) -> bool {
        let Some(plan) = state.plan.as_mut() else {
            return false;
        };
        if let Some(step) = plan.steps.get_mut(index) {
            step.status = StepStatus::Succeeded;
        }
        plan.current_step = index + 1;
        if plan.is_complete() {
            state.plan = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ExecutionPlan, PlanBuilder};
    use crate::sink::NullSink;
    use crate::test_helpers::{RecordingSink, ScriptedExecutor};
    use std::time::Duration;
    use tokio::time::Instant;

    fn state_with_plan(text: &str) -> SessionState {
        let mut state = SessionState::new();
        state.plan = Some(PlanBuilder::default().build(text));
        state
    }

    fn engine(executor: &ScriptedExecutor) -> ExecutionEngine<'_> {
        ExecutionEngine::new(executor, RetryPolicy::default(), DependencyPolicy::GateByAttempt)
    }

    #[tokio::test]
    async fn idle_without_plan() {
        let executor = ScriptedExecutor::new();
        let mut state = SessionState::new();
        let outcome = engine(&executor)
            .advance(&mut state, &NullSink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::Idle);
    }

    #[tokio::test]
    async fn steps_advance_then_plan_retires() {
        let executor = ScriptedExecutor::new();
        let mut state = state_with_plan(
            "PLAN:\n1. Read config - read_file(config.json)\n2. Update config - write_file(config.json, updated)",
        );
        let sink = RecordingSink::default();
        let token = CancellationToken::new();
        let engine = engine(&executor);

        let first = engine.advance(&mut state, &sink, &token).await.unwrap();
        assert!(matches!(first, StepOutcome::Succeeded { ref step_id, plan_complete: false, .. } if step_id == "step_0"));
        assert_eq!(state.current_step(), Some(1));

        let second = engine.advance(&mut state, &sink, &token).await.unwrap();
        assert!(matches!(second, StepOutcome::Succeeded { plan_complete: true, .. }));
        assert!(state.plan.is_none());
        assert!(sink.progress().iter().any(|p| p == "Plan complete"));
        assert_eq!(state.file_changes().len(), 1);

        let called: Vec<String> = executor.calls().into_iter().map(|c| c.name).collect();
        assert_eq!(called, vec!["read_file", "write_file"]);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_step_attempted_three_times_with_backoff() {
        let executor = ScriptedExecutor::new().failing("run_command", "exit 1");
        let mut state = state_with_plan("PLAN:\n1. Build the app");
        let sink = RecordingSink::default();

        let started = Instant::now();
        let outcome = engine(&executor)
            .advance(&mut state, &sink, &CancellationToken::new())
            .await
            .unwrap();

        // 0s before attempt 1, 2s before attempt 2, 4s before attempt 3.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7), "{elapsed:?}");
        assert!(matches!(outcome, StepOutcome::Failed { ref step_id, .. } if step_id == "step_0"));
        assert_eq!(executor.calls().len(), 3);
        assert_eq!(state.executions().len(), 3);

        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.current_step, 0);
        assert_eq!(plan.steps[0].retry_count, 3);
        assert_eq!(plan.steps[0].status, StepStatus::Failed("exit 1".into()));

        let failures = sink.messages(Role::System);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("failed after 3 attempts"));
        assert_eq!(state.errors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_on_second_attempt() {
        let executor = ScriptedExecutor::new().with_results(
            "run_command",
            vec![ToolResult::failure("flaky"), ToolResult::ok("built")],
        );
        let mut state = state_with_plan("PLAN:\n1. Build the app\n2. Run tests - run_command(npm test)");

        let started = Instant::now();
        let outcome = engine(&executor)
            .advance(&mut state, &NullSink, &CancellationToken::new())
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3), "{elapsed:?}");
        assert!(matches!(outcome, StepOutcome::Succeeded { .. }));
        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.steps[0].retry_count, 2);
        assert_eq!(plan.current_step, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_step_is_retried_on_next_call() {
        let executor = ScriptedExecutor::new().failing("run_command", "nope");
        let mut state = state_with_plan("PLAN:\n1. Build the app");
        let engine = engine(&executor);
        let token = CancellationToken::new();

        engine.advance(&mut state, &NullSink, &token).await.unwrap();
        engine.advance(&mut state, &NullSink, &token).await.unwrap();

        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.steps[0].retry_count, 6);
        assert_eq!(executor.calls().len(), 6);
    }

    #[tokio::test]
    async fn gate_by_success_waits_on_failed_dependency() {
        let executor = ScriptedExecutor::new();
        let mut plan = PlanBuilder::default().build("PLAN:\n1. Build the app\n2. Run tests - run_command(npm test)");
        plan.steps[0].retry_count = 3;
        plan.steps[0].status = StepStatus::Failed("broken".into());
        plan.current_step = 1;
        let mut state = SessionState::new();
        state.plan = Some(plan);

        let strict = ExecutionEngine::new(&executor, RetryPolicy::default(), DependencyPolicy::GateBySuccess);
        let outcome = strict
            .advance(&mut state, &NullSink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Waiting {
                step_id: "step_1".into(),
                pending: vec!["step_0".into()],
            }
        );
        assert!(executor.calls().is_empty());

        // The default policy only asks that the dependency was attempted.
        let lenient = engine(&executor);
        let outcome = lenient
            .advance(&mut state, &NullSink, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, StepOutcome::Succeeded { .. }));
    }

    #[tokio::test]
    async fn unattempted_dependency_waits() {
        let executor = ScriptedExecutor::new();
        let mut plan = PlanBuilder::default().build("PLAN:\n1. Build the app\n2. Run tests - run_command(npm test)");
        plan.current_step = 1;
        let mut state = SessionState::new();
        state.plan = Some(plan);

        let outcome = engine(&executor)
            .advance(&mut state, &NullSink, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, StepOutcome::Waiting { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff() {
        let executor = ScriptedExecutor::new().failing("run_command", "nope");
        let mut state = state_with_plan("PLAN:\n1. Build the app");
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = engine(&executor).advance(&mut state, &NullSink, &token).await;
        assert_eq!(result.unwrap_err(), Cancelled);
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(state.plan.as_ref().unwrap().steps[0].retry_count, 1);
    }

    #[test]
    fn empty_plan_is_complete() {
        assert!(ExecutionPlan::default().is_complete());
    }
}
