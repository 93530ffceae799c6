//! Bounded, jittered retry policy for the lock-wait path.
//!
//! When a caller loses the race for the regeneration lock it does not fail
//! and does not regenerate; it repeatedly re-reads the cache until the
//! winner has populated it or the attempts are exhausted. This module
//! provides the immutable policy value object that governs that loop and a
//! small executor for running a fallible async operation under it.
//!
//! The policy is used exclusively while waiting for a contended lock to
//! clear. It never wraps the generator invocation or the post-generation
//! store write.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Error returned when a [`RetryPolicyBuilder`] is given invalid parameters.
#[derive(Debug, Error)]
#[error("invalid retry policy: {0}")]
pub struct InvalidPolicy(String);

/// How the per-attempt delay is combined from the fixed base and the random
/// jitter bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayRule {
    /// The fixed base delay only.
    Fixed,
    /// A uniform random delay in `0..=max_jitter` only.
    Jittered,
    /// Fixed base plus a uniform random addition in `0..=max_jitter`.
    ///
    /// The default. The random component desynchronizes competing waiters so
    /// a burst of losers does not turn into a secondary synchronized retry
    /// storm against the store.
    FixedPlusJitter,
}

/// Immutable retry policy for the wait loop.
///
/// Constructed once per call (usually via [`LoadOptions`]) and discarded
/// after. Exhausting all attempts is not escalated to a special error kind;
/// the final attempt's own outcome is returned as-is.
///
/// Defaults match the stock wait behavior: 12 attempts, 200ms base delay,
/// up to 100ms added jitter, no overall time bound.
///
/// [`LoadOptions`]: crate::LoadOptions
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first immediate one.
    pub attempts: u32,
    /// Fixed base delay between attempts.
    pub delay: Duration,
    /// Upper bound for the random jitter component.
    pub max_jitter: Duration,
    /// How base delay and jitter combine into the per-attempt delay.
    pub delay_rule: DelayRule,
    /// Optional overall bound on the wait loop. When elapsed time exceeds
    /// this the loop stops early and returns the last attempt's error.
    pub max_total_time: Option<Duration>,
    /// When true (the default), intermediate attempts' errors are discarded
    /// silently; when false they are emitted at debug level. Either way only
    /// the final attempt's outcome is returned.
    pub last_error_only: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 12,
            delay: Duration::from_millis(200),
            max_jitter: Duration::from_millis(100),
            delay_rule: DelayRule::FixedPlusJitter,
            max_total_time: None,
            last_error_only: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a builder pre-populated with the defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Computes the delay to sleep before the next attempt.
    pub(crate) fn next_delay(&self) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..=self.max_jitter)
        };
        match self.delay_rule {
            DelayRule::Fixed => self.delay,
            DelayRule::Jittered => jitter,
            DelayRule::FixedPlusJitter => self.delay + jitter,
        }
    }

    /// Runs `op` until it succeeds or the policy is exhausted.
    ///
    /// The first execution happens immediately; the computed delay is slept
    /// only between attempts. Returns the final attempt's result unchanged,
    /// discarding every earlier error.
    pub(crate) async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let started = tokio::time::Instant::now();
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.attempts.max(1) {
                        return Err(err);
                    }
                    if let Some(limit) = self.max_total_time {
                        if started.elapsed() >= limit {
                            debug!(attempt, "wait loop time bound reached");
                            return Err(err);
                        }
                    }
                    if !self.last_error_only {
                        debug!(attempt, error = %err, "wait attempt failed, retrying");
                    }
                    tokio::time::sleep(self.next_delay()).await;
                }
            }
        }
    }
}

/// Fluent builder for [`RetryPolicy`].
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.policy.attempts = attempts;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.policy.delay = delay;
        self
    }

    pub fn max_jitter(mut self, max_jitter: Duration) -> Self {
        self.policy.max_jitter = max_jitter;
        self
    }

    pub fn delay_rule(mut self, rule: DelayRule) -> Self {
        self.policy.delay_rule = rule;
        self
    }

    pub fn max_total_time(mut self, limit: Duration) -> Self {
        self.policy.max_total_time = Some(limit);
        self
    }

    pub fn last_error_only(mut self, last_error_only: bool) -> Self {
        self.policy.last_error_only = last_error_only;
        self
    }

    /// Validates and returns the policy.
    pub fn build(self) -> Result<RetryPolicy, InvalidPolicy> {
        if self.policy.attempts == 0 {
            return Err(InvalidPolicy("attempts must be greater than 0".into()));
        }
        Ok(self.policy)
    }
}
