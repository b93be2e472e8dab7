//! Wait-until-terminal polling.
//!
//! Polls `describe` with bounded exponential backoff. The sleep itself is a
//! [`Sleeper`] so tests can run against a zero-delay clock; elapsed time is
//! accounted as the sum of requested delays, not wall time.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use trailstack_core::StackState;

use crate::error::ProvisionerError;
use crate::provider::{BoxFuture, Operation, OperationHandle, ProviderClient};

/// Backoff schedule and hard limits for one wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    #[serde(with = "secs")]
    pub initial_delay: Duration,
    #[serde(with = "secs")]
    pub max_delay: Duration,
    pub multiplier: u32,
    /// Total time a single wait may take before giving up.
    #[serde(with = "secs")]
    pub ceiling: Duration,
    /// Consecutive `ProviderUnavailable` answers tolerated before surfacing.
    pub max_transient_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2,
            ceiling: Duration::from_secs(30 * 60),
            max_transient_retries: 5,
        }
    }
}

impl PollPolicy {
    /// Delay before poll number `attempt + 1`: initial × multiplier^attempt,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Injected sleep, so tests can substitute a zero-delay clock.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[derive(Clone)]
pub struct Poller {
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Poller {
    pub fn new(policy: PollPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn with_tokio(policy: PollPolicy) -> Self {
        Self::new(policy, Arc::new(TokioSleeper))
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Block until the operation behind `handle` reaches a terminal status.
    ///
    /// A delete that makes the stack disappear returns an absent state. A
    /// create or update that has not become visible yet keeps polling, and
    /// so does a terminal status that is still the one recorded on the
    /// handle before the call, until an in-progress status has been seen.
    /// Cancellation returns `PollCancelled` and leaves the provider
    /// operation running.
    pub async fn wait_for_terminal(
        &self,
        provider: &dyn ProviderClient,
        handle: &OperationHandle,
        cancel: &CancellationToken,
    ) -> Result<StackState, ProvisionerError> {
        let name = handle.stack_name.as_str();
        let cancelled = || ProvisionerError::PollCancelled {
            name: name.to_string(),
        };

        let mut attempt = 0u32;
        let mut transient = 0u32;
        let mut waited = Duration::ZERO;
        let mut transitioned = false;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }

            let described = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                result = provider.describe(name) => result,
            };

            match described {
                Ok(None) if handle.operation == Operation::Delete => {
                    tracing::debug!(stack = %name, "stack no longer exists");
                    return Ok(StackState::absent(name));
                }
                Ok(None) => {
                    transient = 0;
                    tracing::debug!(stack = %name, operation = %handle.operation, "stack not visible yet");
                }
                Ok(Some(state)) if state.status.is_terminal() => {
                    if handle.settled_by(state.status, transitioned) {
                        tracing::debug!(stack = %name, status = %state.status, "stack reached terminal status");
                        return Ok(state);
                    }
                    transient = 0;
                    tracing::debug!(
                        stack = %name,
                        operation = %handle.operation,
                        status = %state.status,
                        "status predates the operation, waiting for it to start"
                    );
                }
                Ok(Some(state)) => {
                    transient = 0;
                    transitioned = true;
                    tracing::debug!(stack = %name, status = %state.status, "waiting on stack");
                }
                Err(e) if e.is_transient() => {
                    transient += 1;
                    if transient > self.policy.max_transient_retries {
                        tracing::warn!(stack = %name, error = %e, "provider still unavailable, giving up");
                        return Err(e);
                    }
                    tracing::warn!(stack = %name, error = %e, retry = transient, "provider unavailable, retrying");
                }
                Err(e) => return Err(e),
            }

            let delay = self.policy.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            if waited + delay > self.policy.ceiling {
                return Err(ProvisionerError::PollTimedOut {
                    name: name.to_string(),
                    waited,
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = self.sleeper.sleep(delay) => {}
            }
            waited += delay;
        }
    }
}
