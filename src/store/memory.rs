//! In-process store implementation.
//!
//! Backs the test suites and is handy for single-process use or as a model
//! of the semantics adapters must provide: TTL expiry, atomic set-if-absent,
//! and the hash-addressed script cache (a script is unknown until its source
//! has been submitted once, which exercises the fallback path in
//! [`Script::invoke`](crate::Script::invoke)).
//!
//! Script evaluation implements the compare-and-delete contract used by the
//! lock release script (one key, one argument); arbitrary scripts are not
//! interpreted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Hashes of scripts whose source has been submitted via `eval`.
    scripts: HashSet<String>,
}

/// Shared in-memory [`Store`]. Cloning yields a handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drops `key` if its entry has outlived its TTL, making expiry observable
/// as plain absence.
fn purge_expired(inner: &mut Inner, key: &str, now: Instant) {
    if inner.entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
        inner.entries.remove(key);
    }
}

/// Atomic compare-and-delete: removes `key` only when its live value equals
/// `token`, reporting the deletion count.
fn compare_and_delete(inner: &mut Inner, key: &str, token: &str, now: Instant) -> i64 {
    purge_expired(inner, key, now);
    if inner.entries.get(key).map(|entry| entry.value.as_str()) == Some(token) {
        inner.entries.remove(key);
        1
    } else {
        0
    }
}

fn script_args<'a>(keys: &[&'a str], args: &[&'a str]) -> Result<(&'a str, &'a str), StoreError> {
    match (keys, args) {
        ([key], [arg]) => Ok((key, arg)),
        _ => Err(StoreError::Backend(format!(
            "unsupported script invocation: {} keys, {} args",
            keys.len(),
            args.len()
        ))),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        purge_expired(&mut inner, key, Instant::now());
        Ok(inner.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let entry = Entry { value: value.to_string(), expires_at: Instant::now() + ttl };
        let mut inner = self.inner.lock().await;
        inner.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        purge_expired(&mut inner, key, now);
        if inner.entries.contains_key(key) {
            return Ok(false);
        }
        let entry = Entry { value: value.to_string(), expires_at: now + ttl };
        inner.entries.insert(key.to_string(), entry);
        Ok(true)
    }

    async fn eval_sha(
        &self,
        hash: &str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        let (key, token) = script_args(keys, args)?;
        let mut inner = self.inner.lock().await;
        if !inner.scripts.contains(hash) {
            return Err(StoreError::NoScript);
        }
        Ok(compare_and_delete(&mut inner, key, token, Instant::now()))
    }

    async fn eval(&self, source: &str, keys: &[&str], args: &[&str]) -> Result<i64, StoreError> {
        let (key, token) = script_args(keys, args)?;
        let hash = hex::encode(Sha1::digest(source.as_bytes()));
        let mut inner = self.inner.lock().await;
        inner.scripts.insert(hash);
        Ok(compare_and_delete(&mut inner, key, token, Instant::now()))
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = inner.entries.remove(*key) {
                if !entry.is_expired(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_none_for_absent_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trip() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn values_expire_after_ttl() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_nx_only_writes_when_absent() {
        let store = MemoryStore::new();
        assert!(store.set_nx("k", "first", Duration::from_secs(60)).await.unwrap());
        assert!(!store.set_nx("k", "second", Duration::from_secs(60)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
    }

    /// An expired entry must not block `set_nx`: the store treats it as
    /// logically absent, which is what lets a crashed holder's lock clear.
    #[tokio::test(start_paused = true)]
    async fn set_nx_reclaims_expired_entry() {
        let store = MemoryStore::new();
        assert!(store.set_nx("k", "old", Duration::from_secs(5)).await.unwrap());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.set_nx("k", "new", Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn eval_sha_requires_prior_source_submission() {
        let store = MemoryStore::new();
        let err = store.eval_sha("deadbeef", &["k"], &["t"]).await.unwrap_err();
        assert!(matches!(err, StoreError::NoScript));

        store.set("k", "t", Duration::from_secs(60)).await.unwrap();
        store.eval("some source", &["k"], &["t"]).await.unwrap();
        let hash = hex::encode(Sha1::digest(b"some source"));
        store.set("k", "t", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.eval_sha(&hash, &["k"], &["t"]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn eval_compares_before_deleting() {
        let store = MemoryStore::new();
        store.set("k", "owner", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.eval("src", &["k"], &["intruder"]).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("owner"));

        assert_eq!(store.eval("src", &["k"], &["owner"]).await.unwrap(), 1);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn eval_rejects_unexpected_arity() {
        let store = MemoryStore::new();
        let err = store.eval("src", &["a", "b"], &["t"]).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn delete_counts_existing_keys() {
        let store = MemoryStore::new();
        store.set("a", "1", Duration::from_secs(60)).await.unwrap();
        store.set("b", "2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.delete(&["a", "b", "c"]).await.unwrap(), 2);
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
