//! Per-call configuration for [`load_or_store`].
//!
//! An explicit record with named fields and stated defaults, constructed
//! once per call (or once and cloned). Nothing here is process-global.
//!
//! [`load_or_store`]: crate::StampedeShield::load_or_store

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Configuration for a single [`load_or_store`] call.
///
/// Defaults: value TTL 10 minutes, lock TTL 10 seconds, stock
/// [`RetryPolicy`]. All fields are independently overridable, directly or
/// through [`LoadOptions::builder`].
///
/// The lock TTL is the sole protection against a holder that crashes mid
/// regeneration; if it elapses before the generator finishes, a second
/// holder may regenerate concurrently. Keep it above the expected generator
/// latency.
///
/// [`load_or_store`]: crate::StampedeShield::load_or_store
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Time-to-live applied to the cached value on a successful store.
    pub value_ttl: Duration,
    /// Time-to-live of the regeneration lock.
    pub lock_ttl: Duration,
    /// Wait behavior for callers that lose the lock race.
    pub retry: RetryPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            value_ttl: Duration::from_secs(600),
            lock_ttl: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl LoadOptions {
    pub fn builder() -> LoadOptionsBuilder {
        LoadOptionsBuilder::new()
    }
}

/// Fluent builder for [`LoadOptions`].
#[derive(Debug, Default)]
pub struct LoadOptionsBuilder {
    options: LoadOptions,
}

impl LoadOptionsBuilder {
    pub fn new() -> Self {
        Self { options: LoadOptions::default() }
    }

    pub fn value_ttl(mut self, ttl: Duration) -> Self {
        self.options.value_ttl = ttl;
        self
    }

    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.options.lock_ttl = ttl;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.options.retry = retry;
        self
    }

    pub fn build(self) -> LoadOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::DelayRule;

    #[test]
    fn defaults() {
        let options = LoadOptions::default();
        assert_eq!(options.value_ttl, Duration::from_secs(600));
        assert_eq!(options.lock_ttl, Duration::from_secs(10));
        assert_eq!(options.retry.attempts, 12);
    }

    #[test]
    fn builder_overrides_independently() {
        let retry = RetryPolicy::builder()
            .attempts(3)
            .delay(Duration::from_millis(10))
            .delay_rule(DelayRule::Fixed)
            .build()
            .unwrap();

        let options = LoadOptions::builder()
            .value_ttl(Duration::from_secs(30))
            .lock_ttl(Duration::from_secs(2))
            .retry(retry)
            .build();

        assert_eq!(options.value_ttl, Duration::from_secs(30));
        assert_eq!(options.lock_ttl, Duration::from_secs(2));
        assert_eq!(options.retry.attempts, 3);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let options = LoadOptions::builder().lock_ttl(Duration::from_secs(1)).build();
        assert_eq!(options.value_ttl, Duration::from_secs(600));
        assert_eq!(options.retry.attempts, 12);
    }
}
