//! Orchestration policy types shared by configuration and the engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-step retry policy for plan-driven execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per engine call (the first attempt counts)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff, in seconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base() -> u64 {
    2
}

impl RetryPolicy {
    /// Delay before the attempt with the given zero-based index.
    ///
    /// No delay before the first attempt, then `base^index` seconds:
    /// 2s before the second attempt, 4s before the third.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base(),
        }
    }
}

/// When a plan step's dependencies count as satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// A dependency is satisfied once it has been attempted at least once,
    /// whether or not it succeeded.
    #[default]
    GateByAttempt,
    /// A dependency is satisfied only once it has succeeded.
    GateBySuccess,
}
