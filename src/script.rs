//! Content-addressed server-side scripts with transparent source fallback.
//!
//! Stores that support server-side evaluation cache scripts by the SHA-1
//! digest of their source (the `EVALSHA` protocol). A [`Script`] computes
//! that digest once at construction and reuses it for the life of the
//! process; identical source always yields an identical hash, so a script
//! cached by one process is hit by every other.
//!
//! [`Script::invoke`] first attempts evaluation by hash. If the store
//! reports the script is not known to it, the full source is resubmitted
//! once and the evaluation retried. The fallback is invisible to callers.

use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::StoreError;
use crate::store::Store;

/// A server-side script addressed by the content hash of its source.
#[derive(Debug, Clone)]
pub struct Script {
    source: String,
    hash: String,
    key_count: usize,
}

impl Script {
    /// Creates a script, computing its content hash once.
    pub fn new(key_count: usize, source: impl Into<String>) -> Self {
        let source = source.into();
        let hash = hex::encode(Sha1::digest(source.as_bytes()));
        Self { source, hash, key_count }
    }

    /// The script source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Lowercase hex SHA-1 digest of the source.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Evaluates the script against `store`, falling back to full-source
    /// submission when the store does not have the hash cached.
    ///
    /// Rejects an invocation whose key count does not match the one the
    /// script was declared with. Any other store error is surfaced
    /// unchanged.
    pub async fn invoke<S>(
        &self,
        store: &S,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError>
    where
        S: Store + ?Sized,
    {
        if keys.len() != self.key_count {
            return Err(StoreError::Backend(format!(
                "script expects {} keys, got {}",
                self.key_count,
                keys.len()
            )));
        }
        match store.eval_sha(&self.hash, keys, args).await {
            Err(StoreError::NoScript) => {
                debug!(hash = %self.hash, "script not cached, resubmitting source");
                store.eval(&self.source, keys, args).await
            }
            other => other,
        }
    }
}
