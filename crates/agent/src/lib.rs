//! The actloop orchestration engine.
//!
//! A reason-act loop over an unreliable, free-text model:
//!
//! 1. **Ask** the model with the full transcript
//! 2. **Parse** tool calls out of the reply and run them as a batch
//! 3. **Plan** when the reply announces work without calling tools
//! 4. **Advance** an active plan one step at a time, with retry and backoff
//! 5. **Reflect** after repeated failure
//! 6. **Stop** when the completion oracle agrees the task is done, or the
//!    iteration budget runs out
//!
//! [`Orchestrator`] ties these together and owns the session state.

pub mod arguments;
pub mod batch;
pub mod cancel;
pub mod completion;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod plan;
pub mod prompt;
pub mod reflection;
pub mod session;
pub mod sink;

#[cfg(test)]
mod test_helpers;

pub use batch::{BatchOutcome, PARALLEL_SAFE_TOOLS, execute_batch, is_parallel_safe};
pub use cancel::Cancelled;
pub use completion::{CompletionVerdict, KeywordClassifier, ReplyClassifier};
pub use executor::{ExecutionEngine, StepOutcome};
pub use orchestrator::{Orchestrator, OrchestratorOptions, TurnOutcome};
pub use plan::{ExecutionPlan, PlanBuilder, PlanStep, StepStatus};
pub use prompt::system_prompt;
pub use session::{
    ExecutionSummary, FileChangeRecord, FileOperation, SessionState, ToolExecutionRecord,
};
pub use sink::{NullSink, OrchestrationEvent, OrchestrationSink};
