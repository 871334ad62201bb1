//! Execution plans and the free-text plan builder.
//!
//! A plan is extracted best-effort from a model reply of the form:
//!
//! ```text
//! PLAN:
//! 1. Read config - read_file(config.json)
//! 2. Update config - write_file(config.json, updated)
//! 3. Install dependencies
//! ESTIMATED TIME: 2 minutes
//! RISKS: config may be malformed
//! ```
//!
//! Each numbered line is matched against three forms, first match wins:
//! `description - tool(args)`, `description - tool`, then a bare
//! description whose tool is inferred from keywords. The builder never
//! fails; unusable text yields a plan with zero steps.

use crate::arguments;
use actloop_core::DependencyPolicy;
use actloop_core::tool::{Arguments, ToolCall};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// Default attempts per step.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

static PLAN_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPLAN:").expect("plan marker regex must compile"));

static NUMBERED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+[.)]\s+(.+?)\s*$").expect("numbered line regex must compile")
});

static WITH_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+[-–—]\s+([A-Za-z_][A-Za-z0-9_]*)\((.*)\)\s*$")
        .expect("step-with-args regex must compile")
});

static WITH_TOOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+[-–—]\s+([A-Za-z_][A-Za-z0-9_]*)\s*$")
        .expect("step-with-tool regex must compile")
});

static ESTIMATED_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*ESTIMATED\s+TIME:\s*(.+?)\s*$").expect("estimated time regex must compile")
});

static RISKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*RISKS:\s*(.+?)\s*$").expect("risks regex must compile"));

/// Outcome status of a plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Succeeded,
    Failed(String),
}

/// A single step in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique within the plan: `step_<index>`.
    pub id: String,
    pub description: String,
    pub tool: String,
    pub arguments: Arguments,
    /// Ids of earlier steps that must be satisfied first.
    pub dependencies: Vec<String>,
    /// Attempts made so far, successful or not.
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: StepStatus,
}

impl PlanStep {
    pub fn to_call(&self) -> ToolCall {
        ToolCall::new(self.tool.clone(), self.arguments.clone())
    }

    /// Whether this step satisfies a dependency under `policy`.
    pub fn satisfies(&self, policy: DependencyPolicy) -> bool {
        match policy {
            DependencyPolicy::GateByAttempt => self.retry_count > 0,
            DependencyPolicy::GateBySuccess => self.status == StepStatus::Succeeded,
        }
    }
}

/// An ordered, dependency-annotated list of steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<PlanStep>,
    /// Index of the step the engine advances next.
    pub current_step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<String>,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True once the current index has moved past the last step.
    pub fn is_complete(&self) -> bool {
        self.current_step >= self.steps.len()
    }

    pub fn current(&self) -> Option<&PlanStep> {
        self.steps.get(self.current_step)
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Dependency ids of the current step that are not yet satisfied.
    ///
    /// An id that does not resolve to an earlier step in this plan never
    /// counts as satisfied.
    pub fn unsatisfied_dependencies(&self, policy: DependencyPolicy) -> Vec<String> {
        let Some(step) = self.current() else {
            return Vec::new();
        };
        step.dependencies
            .iter()
            .filter(|dep| {
                !self.steps[..self.current_step]
                    .iter()
                    .any(|s| &s.id == *dep && s.satisfies(policy))
            })
            .cloned()
            .collect()
    }
}

/// Turns `PLAN:` text into an [`ExecutionPlan`].
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    known_tools: Vec<String>,
    max_retries: u32,
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new(CATALOG.iter().map(|s| s.to_string()).collect())
    }
}

/// The fixed tool catalog the builder recognizes in the `description - tool`
/// form.
pub const CATALOG: &[&str] = &[
    "read_file",
    "write_file",
    "list_files",
    "get_file_info",
    "search_files",
    "run_command",
    "search_replace",
];

impl PlanBuilder {
    pub fn new(known_tools: Vec<String>) -> Self {
        Self {
            known_tools,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn build(&self, text: &str) -> ExecutionPlan {
        let mut plan = ExecutionPlan {
            estimated_time: capture(&ESTIMATED_TIME, text),
            risks: capture(&RISKS, text),
            ..ExecutionPlan::default()
        };

        let Some(marker) = PLAN_MARKER.find(text) else {
            debug!("Reply has no PLAN: section");
            return plan;
        };

        for line in text[marker.end()..].lines() {
            let Some(body) = NUMBERED_LINE
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
            else {
                continue;
            };

            let Some((description, tool, raw)) = self.parse_line(body) else {
                debug!(line = body, "Skipping unusable plan line");
                continue;
            };

            let index = plan.steps.len();
            let dependencies = if index == 0 {
                Vec::new()
            } else {
                vec![format!("step_{}", index - 1)]
            };

            plan.steps.push(PlanStep {
                id: format!("step_{index}"),
                arguments: arguments::extract(&tool, raw.as_deref(), &description),
                description,
                tool,
                dependencies,
                retry_count: 0,
                max_retries: self.max_retries,
                status: StepStatus::Pending,
            });
        }

        debug!(steps = plan.steps.len(), "Built execution plan");
        plan
    }

    /// Split a numbered line into (description, tool, raw args).
    fn parse_line(&self, body: &str) -> Option<(String, String, Option<String>)> {
        if let Some(caps) = WITH_ARGS.captures(body) {
            let description = caps.get(1)?.as_str().trim().to_string();
            let tool = caps.get(2)?.as_str().to_string();
            let raw = caps.get(3).map(|m| m.as_str().to_string());
            return Some((description, tool, raw));
        }

        if let Some(caps) = WITH_TOOL.captures(body)
            && let Some(tool) = caps.get(2).map(|m| m.as_str())
            && self.known_tools.iter().any(|t| t == tool)
        {
            let description = caps.get(1)?.as_str().trim().to_string();
            return Some((description, tool.to_string(), None));
        }

        let description = body.trim();
        if description.is_empty() {
            return None;
        }
        Some((description.to_string(), infer_tool(description).into(), None))
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Pick a tool for a bare step description.
pub fn infer_tool(description: &str) -> &'static str {
    let lower = description.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |w: &str| words.contains(&w);

    if has("read") {
        "read_file"
    } else if has("write") || (has("create") && has("file")) {
        "write_file"
    } else if has("list") || ((has("directory") || has("folder")) && !has("create") && !has("make")) {
        "list_files"
    } else {
        "run_command"
    }
}
