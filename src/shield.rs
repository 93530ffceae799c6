//! The stampede-safe orchestrator.
//!
//! Composes cache read, conditional lock, double-check, generator
//! invocation, and cache write. Of N concurrent callers racing on the same
//! missing key, at most one acquires the regeneration lock before its TTL
//! elapses; the rest resolve through the wait-retry path. The generator
//! executes at most once per call and is never retried by this layer —
//! retrying a side-effecting computation is the generator's own concern.

use std::future::Future;

use tracing::{debug, instrument, warn};

use crate::error::{BoxError, ShieldError};
use crate::mutex::DistributedMutex;
use crate::options::LoadOptions;
use crate::store::Store;

/// Suffix appended to the cache key to derive the co-located lock key.
const LOCK_SUFFIX: &str = ":lock";

/// Result of a successful [`StampedeShield::load_or_store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// The cached or freshly generated value.
    pub value: String,
    /// True only for the single caller whose generator result was stored.
    pub generated: bool,
}

/// Stampede protection over a [`Store`].
///
/// Holds nothing but the store handle; all coordination state lives in the
/// external store, so one shield (or many, across processes) may serve any
/// number of keys and callers.
#[derive(Debug, Clone)]
pub struct StampedeShield<S> {
    store: S,
}

impl<S: Store> StampedeShield<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store handle.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the cached value for `key`, or coordinates regeneration if
    /// it is absent.
    ///
    /// On a cache hit (or any genuine store error) this returns immediately
    /// with no lock overhead. On a miss, the caller that wins the
    /// regeneration lock double-checks the cache, invokes `generator` at
    /// most once, stores the result with `options.value_ttl`, and reports
    /// `generated = true`. Every other caller re-reads the cache under
    /// `options.retry` and returns the final attempt's outcome — a value,
    /// [`ShieldError::Missing`], or a store error — without ever invoking
    /// the generator.
    ///
    /// The lock is released on every exit path, including generator and
    /// store failures. Generator errors are returned verbatim as
    /// [`ShieldError::Generator`]; nothing is stored in that case.
    #[instrument(skip(self, generator, options))]
    pub async fn load_or_store<G, Fut>(
        &self,
        key: &str,
        generator: G,
        options: LoadOptions,
    ) -> Result<LoadOutcome, ShieldError>
    where
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, BoxError>>,
    {
        // Fast path: hit or hard failure, either way no lock is touched.
        if let Some(value) = self.store.get(key).await? {
            return Ok(LoadOutcome { value, generated: false });
        }

        let mut mutex =
            DistributedMutex::new(&self.store, format!("{key}{LOCK_SUFFIX}"), options.lock_ttl);

        let acquired = match mutex.lock().await {
            Ok(acquired) => acquired,
            // An acquire failure is handled like contention: someone else
            // may well hold the lock, so fall through to the wait path
            // rather than regenerate.
            Err(err) => {
                warn!(key, error = %err, "lock acquisition failed, falling back to wait path");
                false
            }
        };

        if !acquired {
            debug!(key, "lock contended, waiting for peer to populate the cache");
            let value = options
                .retry
                .run(|| async move {
                    match self.store.get(key).await {
                        Ok(Some(value)) => Ok(value),
                        Ok(None) => Err(ShieldError::Missing),
                        Err(err) => Err(ShieldError::Store(err)),
                    }
                })
                .await?;
            return Ok(LoadOutcome { value, generated: false });
        }

        let result = self.regenerate(key, generator, &options).await;

        // Guaranteed cleanup: release before returning on every path. A
        // release failure must not mask the critical section's result; the
        // lock will clear by TTL regardless.
        match mutex.unlock().await {
            Ok(released) => {
                if !released {
                    debug!(key, "lock expired before release");
                }
            }
            Err(err) => warn!(key, error = %err, "lock release failed, TTL will clear it"),
        }

        result
    }

    /// Critical section run under the lock: double-check, generate, store.
    async fn regenerate<G, Fut>(
        &self,
        key: &str,
        generator: G,
        options: &LoadOptions,
    ) -> Result<LoadOutcome, ShieldError>
    where
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, BoxError>>,
    {
        // Another caller may have populated the key between the first read
        // and our acquisition.
        if let Some(value) = self.store.get(key).await? {
            return Ok(LoadOutcome { value, generated: false });
        }

        let value = generator().await.map_err(ShieldError::Generator)?;
        self.store.set(key, &value, options.value_ttl).await?;
        debug!(key, "cache value regenerated");
        Ok(LoadOutcome { value, generated: true })
    }

    /// Deletes the cached value for `key`.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<(), ShieldError> {
        self.store.delete(&[key]).await?;
        Ok(())
    }
}
