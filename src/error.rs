//! Error taxonomy for stampede protection.
//!
//! Absence is modelled as data, not as an error: a missing cache value is
//! `Ok(None)` at the [`Store`](crate::Store) seam and only becomes
//! [`ShieldError::Missing`] when the wait loop exhausts its attempts without
//! a hit. Lock contention is likewise a plain `bool`. Genuine store failures
//! are surfaced immediately and never masked, and generator errors pass
//! through verbatim so callers can downcast to their own types.

use thiserror::Error;

/// Boxed error type used for generator failures.
///
/// The orchestration layer never inspects or wraps these; whatever the
/// generator returned is handed back to the caller unchanged.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures reported by a [`Store`](crate::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The server does not have the script cached under the supplied hash.
    ///
    /// Transient and internal: [`Script::invoke`](crate::Script::invoke)
    /// resolves it by resubmitting the full source once. It never escapes
    /// the release protocol.
    #[error("script not cached on the server")]
    NoScript,

    /// Connectivity or protocol failure talking to the backing store.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failures returned by [`StampedeShield`](crate::StampedeShield) operations.
#[derive(Debug, Error)]
pub enum ShieldError {
    /// The cache value is absent.
    ///
    /// Returned when the wait-retry loop exhausts its attempts without
    /// another caller having populated the key. A sentinel outcome rather
    /// than a fault; callers typically fall back or propagate.
    #[error("cache value missing")]
    Missing,

    /// The backing store failed. Always fatal for the current call.
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    /// The caller's generator failed. The inner error is exactly what the
    /// generator returned; this layer never retries it.
    #[error("{0}")]
    Generator(BoxError),
}
