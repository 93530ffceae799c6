//! Cache stampede protection with a distributed mutex over a shared
//! key-value store.
//!
//! When a cached value expires or is absent, many concurrent callers would
//! otherwise all hit the slow backing source at once. This crate coordinates
//! concurrent cache-miss handling so exactly one caller regenerates the value
//! while the rest wait on a bounded, jittered retry-read loop.
//!
//! # How it works
//!
//! [`StampedeShield::load_or_store`] composes cache read, conditional lock,
//! double-check, regeneration, and cache write:
//!
//! 1. Read the cache. A hit (or any genuine store error) returns immediately
//!    with no lock overhead.
//! 2. On a miss, acquire a [`DistributedMutex`] over `{key}:lock` via an
//!    atomic set-if-absent with a TTL and a fresh random ownership token.
//! 3. Losers of the race never regenerate; they re-read the cache under a
//!    [`RetryPolicy`] until the winner has populated it.
//! 4. The winner double-checks the cache, invokes the generator at most once,
//!    stores the result, and releases the lock on every exit path. Release is
//!    ownership-verified by an atomic server-side script, so a delayed caller
//!    can never delete a lock that expired and was re-acquired by another
//!    holder.
//!
//! Mutual exclusion is delegated entirely to the backing store's atomic
//! primitives; no in-process locking is used, so the guarantee holds across
//! arbitrarily many processes and hosts sharing the store.
//!
//! # Example
//!
//! ```
//! use stampede_shield::{LoadOptions, MemoryStore, StampedeShield};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shield = StampedeShield::new(MemoryStore::new());
//!
//!     let outcome = shield
//!         .load_or_store(
//!             "user:42:profile",
//!             || async { Ok("expensive value".to_string()) },
//!             LoadOptions::default(),
//!         )
//!         .await?;
//!
//!     assert!(outcome.generated);
//!     assert_eq!(outcome.value, "expensive value");
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! The core consumes a minimal [`Store`] capability trait. [`MemoryStore`]
//! ships for tests and single-process use; enable the `redis` feature for a
//! [`redis`](https://crates.io/crates/redis)-backed adapter.
//!
//! # Non-goals
//!
//! This is not a general-purpose cache (no eviction or size limits), not a
//! fencing-token or lease-renewal lock service, and not a coordination
//! system. The lock TTL is the sole protection against a crashed holder; set
//! it conservatively above the expected generator latency.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod mutex;
pub mod options;
pub mod retry;
pub mod script;
pub mod shield;
pub mod store;

pub use error::{BoxError, ShieldError, StoreError};
pub use mutex::DistributedMutex;
pub use options::{LoadOptions, LoadOptionsBuilder};
pub use retry::{DelayRule, InvalidPolicy, RetryPolicy, RetryPolicyBuilder};
pub use script::Script;
pub use shield::{LoadOutcome, StampedeShield};
pub use store::memory::MemoryStore;
#[cfg(feature = "redis")]
pub use store::redis::RedisStore;
pub use store::Store;
