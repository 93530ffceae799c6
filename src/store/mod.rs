//! Minimal key-value-plus-scripting capability consumed by the core.
//!
//! The orchestration algorithm needs exactly six operations from a backing
//! store: read, expiring write, atomic set-if-absent, hash-addressed script
//! evaluation with a full-source variant, and delete. Concrete clients and
//! their version or protocol differences stay behind this trait; the core
//! never names a backend.
//!
//! Implementations must make `set_nx` and script evaluation atomic with
//! respect to concurrent callers — all mutual exclusion in this crate is
//! delegated to these two primitives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

/// Capability interface over a shared keyed store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads the value at `key`. `Ok(None)` means the key is absent — a
    /// sentinel outcome, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` at `key` with the given time-to-live.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically writes `value` at `key` with a time-to-live, only if the
    /// key is currently absent. Returns whether the write happened.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Evaluates a script already cached on the server by its content hash.
    ///
    /// Fails with [`StoreError::NoScript`] when the server does not know the
    /// hash. Adapters must not fall back to full-source submission
    /// themselves; that retry belongs to [`Script::invoke`](crate::Script).
    async fn eval_sha(&self, hash: &str, keys: &[&str], args: &[&str])
        -> Result<i64, StoreError>;

    /// Submits full script source for evaluation, caching it server-side.
    async fn eval(&self, source: &str, keys: &[&str], args: &[&str]) -> Result<i64, StoreError>;

    /// Deletes the given keys, returning how many existed.
    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        (**self).set_nx(key, value, ttl).await
    }

    async fn eval_sha(
        &self,
        hash: &str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        (**self).eval_sha(hash, keys, args).await
    }

    async fn eval(&self, source: &str, keys: &[&str], args: &[&str]) -> Result<i64, StoreError> {
        (**self).eval(source, keys, args).await
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError> {
        (**self).delete(keys).await
    }
}
