//! Bounded polling toward a desired remote state.
//!
//! Every loop in the crate (create, delete, read, paginated scan) is the same
//! state machine: run one attempt, which reports `Ready`, `Failed` or
//! `Pending`; on `Pending` wait out the backoff and try again until the
//! deadline. The attempt owns all API calls and classification; this module
//! owns timing and the decision to stop.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::clock::{sleep_bounded, Clock};
use crate::config::millis;
use crate::error::{format_err_chain, ProvisionerError};

/// Result of a single attempt.
#[derive(Debug)]
pub enum Step<T> {
    Ready(T),
    /// Not converged yet; the string says why, for logs and timeout errors.
    Pending(String),
    Failed(ProvisionerError),
}

impl<T> Step<T> {
    pub fn map_err(self, f: impl FnOnce(ProvisionerError) -> ProvisionerError) -> Self {
        match self {
            Self::Failed(error) => Self::Failed(f(error)),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    Pending,
    Converged,
    Failed,
    DeadlineExceeded,
}

/// Terminal result of a convergence run. Never pending.
#[derive(Debug)]
pub enum ConvergenceOutcome<T> {
    Converged {
        value: T,
        attempts: u32,
    },
    Failed {
        error: ProvisionerError,
        attempts: u32,
    },
    DeadlineExceeded {
        attempts: u32,
        elapsed: Duration,
        last_pending: Option<String>,
    },
}

impl<T> ConvergenceOutcome<T> {
    pub fn state(&self) -> ConvergenceState {
        match self {
            Self::Converged { .. } => ConvergenceState::Converged,
            Self::Failed { .. } => ConvergenceState::Failed,
            Self::DeadlineExceeded { .. } => ConvergenceState::DeadlineExceeded,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Converged { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ConvergenceOutcome<U> {
        match self {
            Self::Converged { value, attempts } => ConvergenceOutcome::Converged {
                value: f(value),
                attempts,
            },
            Self::Failed { error, attempts } => ConvergenceOutcome::Failed { error, attempts },
            Self::DeadlineExceeded {
                attempts,
                elapsed,
                last_pending,
            } => ConvergenceOutcome::DeadlineExceeded {
                attempts,
                elapsed,
                last_pending,
            },
        }
    }

    /// Collapse into a `Result`, turning a timeout into
    /// [`ProvisionerError::DeadlineExceeded`] for the named operation.
    pub fn into_result(
        self,
        operation: &'static str,
        scope: &str,
        key: &str,
    ) -> Result<T, ProvisionerError> {
        match self {
            Self::Converged { value, .. } => Ok(value),
            Self::Failed { error, .. } => Err(error),
            Self::DeadlineExceeded {
                attempts,
                elapsed,
                last_pending,
            } => Err(ProvisionerError::DeadlineExceeded {
                operation,
                scope: scope.to_string(),
                key: key.to_string(),
                attempts,
                elapsed,
                last_pending,
            }),
        }
    }
}

/// Timing for one kind of convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Overall budget, used when the caller supplies no timeout.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Wait before the first attempt.
    #[serde(rename = "delay_ms", with = "millis")]
    pub delay: Duration,
    #[serde(rename = "min_interval_ms", with = "millis")]
    pub min_interval: Duration,
    #[serde(rename = "max_interval_ms", with = "millis")]
    pub max_interval: Duration,
}

impl WaitPolicy {
    /// Constant spacing between attempts.
    pub fn fixed(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            delay: Duration::ZERO,
            min_interval: interval,
            max_interval: interval,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wait after the given (1-based) attempt: `min_interval` doubled per
    /// attempt, capped at `max_interval`, never below `min_interval`.
    pub fn interval(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.min_interval
            .checked_mul(factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
            .max(self.min_interval)
    }
}

/// Run `step` until it is ready, fails, or `deadline` passes.
///
/// `step` receives the 1-based attempt number. Sleeps are clamped to the
/// deadline, so a timeout is reported promptly instead of after a full
/// backoff. Dropping the returned future cancels the run.
pub async fn converge<T, F, Fut>(
    clock: &dyn Clock,
    policy: &WaitPolicy,
    deadline: Instant,
    mut step: F,
) -> ConvergenceOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Step<T>>,
{
    let started = clock.now();
    let mut attempts = 0;
    let mut last_pending = None;
    let mut state = ConvergenceState::Pending;

    sleep_bounded(clock, policy.delay, deadline).await;

    while state == ConvergenceState::Pending {
        attempts += 1;
        match step(attempts).await {
            Step::Ready(value) => return ConvergenceOutcome::Converged { value, attempts },
            Step::Failed(error) => return ConvergenceOutcome::Failed { error, attempts },
            Step::Pending(reason) => {
                tracing::debug!(attempt = attempts, reason = %reason, "not converged yet");
                last_pending = Some(reason);
            }
        }

        if clock.now() >= deadline {
            state = ConvergenceState::DeadlineExceeded;
        } else {
            sleep_bounded(clock, policy.interval(attempts), deadline).await;
        }
    }

    let elapsed = clock.now().saturating_duration_since(started);
    tracing::warn!(attempts, ?elapsed, "deadline exceeded before convergence");
    ConvergenceOutcome::DeadlineExceeded {
        attempts,
        elapsed,
        last_pending,
    }
}

/// Log the terminal transition of a run.
pub(crate) fn log_outcome<T>(
    operation: &'static str,
    scope: &str,
    key: &str,
    outcome: &ConvergenceOutcome<T>,
) {
    match outcome {
        ConvergenceOutcome::Converged { attempts, .. } => {
            tracing::info!(operation, scope, key, attempts, "converged");
        }
        ConvergenceOutcome::Failed { error, attempts } => {
            tracing::error!(
                operation,
                scope,
                key,
                attempts,
                error = %format_err_chain(error),
                "convergence failed"
            );
        }
        ConvergenceOutcome::DeadlineExceeded {
            attempts, elapsed, ..
        } => {
            tracing::warn!(operation, scope, key, attempts, ?elapsed, "convergence timed out");
        }
    }
}
