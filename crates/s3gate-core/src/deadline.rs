//! Per-request deadline shared by every suspension point of the pipeline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{CoreError, CoreResult};

/// An absolute point in time by which a request must have finished waiting.
///
/// A deadline is created once when the request arrives and threaded through the policy
/// evaluation and the backend call. Each step may tighten it with its own bound via
/// [`Deadline::run`], but never extend it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// The absolute instant.
    #[must_use]
    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Time left before the deadline, zero if it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has already passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// The earlier of this deadline and `bound` from now.
    #[must_use]
    pub fn tighten(&self, bound: Duration) -> Self {
        Self(self.0.min(Instant::now() + bound))
    }

    /// Drive `fut` to completion unless the deadline passes first.
    ///
    /// `step` names the operation for the error message.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeadlineExceeded`] when the deadline elapses first; the
    /// future is dropped.
    pub async fn run<F: Future>(&self, step: &'static str, fut: F) -> CoreResult<F::Output> {
        tokio::time::timeout_at(self.0, fut)
            .await
            .map_err(|_| CoreError::DeadlineExceeded(step))
    }
}
