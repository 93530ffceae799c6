//! Distributed mutex built on the store's atomic primitives.
//!
//! Acquisition is a single atomic "set value, only if absent, with TTL"
//! carrying a fresh cryptographically random ownership token. Release is an
//! atomic server-evaluated check-and-delete: the key is removed only when it
//! still holds this instance's token. A delayed caller therefore can never
//! delete a lock that expired and was re-acquired by a different holder —
//! the correctness hazard of naive TTL mutexes that delete unconditionally.
//!
//! A mutex is created per call and discarded after; the token lives only for
//! the lifetime of one instance and is never reused across acquisitions.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::error::StoreError;
use crate::script::Script;
use crate::store::Store;

/// Atomic check-and-delete evaluated server-side. Never split into a read
/// followed by a conditional delete; that ordering is racy.
static RELEASE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        1,
        "if redis.call(\"GET\", KEYS[1]) == ARGV[1] then\n\
         \treturn redis.call(\"DEL\", KEYS[1])\n\
         else\n\
         \treturn 0\n\
         end",
    )
});

/// Mutual exclusion enforced via the shared store rather than in-process
/// synchronization, valid across processes and hosts.
#[derive(Debug)]
pub struct DistributedMutex<'a, S: Store + ?Sized> {
    store: &'a S,
    name: String,
    ttl: Duration,
    token: Option<String>,
}

impl<'a, S: Store + ?Sized> DistributedMutex<'a, S> {
    /// Creates a mutex over the given lock key with the given TTL.
    ///
    /// The TTL is the sole protection against a holder that crashes or
    /// hangs; set it above the expected critical-section latency.
    pub fn new(store: &'a S, name: impl Into<String>, ttl: Duration) -> Self {
        Self { store, name: name.into(), ttl, token: None }
    }

    /// Attempts to acquire the lock.
    ///
    /// Returns `Ok(false)` when the lock is already held — an expected,
    /// non-fatal outcome under contention, not an error. On `Ok(true)` the
    /// generated ownership token is retained for the later release.
    pub async fn lock(&mut self) -> Result<bool, StoreError> {
        let token = generate_token()?;
        let acquired = self.store.set_nx(&self.name, &token, self.ttl).await?;
        if acquired {
            debug!(lock = %self.name, "lock acquired");
            self.token = Some(token);
        }
        Ok(acquired)
    }

    /// Releases the lock if this instance still owns it.
    ///
    /// Returns whether a deletion actually occurred. Calling this without a
    /// prior successful [`lock`](Self::lock), or after the lock expired and
    /// was re-acquired by a different holder, is safe and returns
    /// `Ok(false)`.
    pub async fn unlock(&mut self) -> Result<bool, StoreError> {
        let Some(token) = self.token.take() else {
            return Ok(false);
        };
        let deleted =
            RELEASE_SCRIPT.invoke(self.store, &[self.name.as_str()], &[token.as_str()]).await?;
        debug!(lock = %self.name, released = deleted != 0, "lock release attempted");
        Ok(deleted != 0)
    }
}

/// Fresh per-acquisition ownership token: 128 bits from the OS secure
/// random source, text-encoded. A predictable token would let an outsider
/// forge a release, so a non-cryptographic generator is not acceptable
/// here.
fn generate_token() -> Result<String, StoreError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| StoreError::Backend(format!("secure token generation failed: {err}")))?;
    Ok(STANDARD.encode(bytes))
}
