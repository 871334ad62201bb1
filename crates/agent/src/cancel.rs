//! Cancellation plumbing.
//!
//! Every suspension point of a turn (model request, tool invocation,
//! backoff sleep) is raced against the caller's [`CancellationToken`].

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// The turn was aborted by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("orchestration cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Await `future` unless `cancel` fires first.
///
/// Cancellation wins ties, so an already-cancelled token never starts work.
pub async fn race<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output, Cancelled> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        output = future => Ok(output),
    }
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn sleep(cancel: &CancellationToken, duration: std::time::Duration) -> Result<(), Cancelled> {
    if duration.is_zero() {
        return if cancel.is_cancelled() { Err(Cancelled) } else { Ok(()) };
    }
    race(cancel, tokio::time::sleep(duration)).await
}
