//! Lock trait, errors and builder.

use async_trait::async_trait;
use redkit_redis::RedisError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::config::LockConfig;
use crate::store::LockStore;
use crate::{TimestampLock, TokenLock};

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Distributed lock errors.
///
/// Losing a race for the lock is not an error: it shows up as `Ok(false)`
/// from [`DistributedLock::try_acquire`].
#[derive(Debug, Error)]
pub enum LockError {
    /// The store could not be reached or rejected a command.
    #[error("Lock store error: {0}")]
    Store(#[from] RedisError),

    /// The lock record does not hold a millisecond timestamp.
    #[error("Lock {key} holds an invalid expiry timestamp: {value:?}")]
    InvalidTimestamp { key: String, value: String },

    #[error("Lock not held")]
    NotHeld,

    #[error("Timed out after {0:?} waiting for lock")]
    Timeout(Duration),
}

impl From<redis::RedisError> for LockError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(RedisError::Redis(err))
    }
}

/// Retry interval for [`DistributedLock::acquire_timeout`].
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A named mutual-exclusion slot in a shared store.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Key of the lock record.
    fn key(&self) -> &str;

    /// How long an acquisition stays valid.
    fn lease(&self) -> Duration;

    /// Make a single attempt to take the lock. Never waits or retries.
    async fn try_acquire(&self) -> LockResult<bool>;

    /// Give the lock up. Returns whether a record was deleted.
    async fn release(&self) -> LockResult<bool>;

    /// Poll [`try_acquire`](Self::try_acquire) until it succeeds or
    /// `timeout` passes.
    async fn acquire_timeout(&self, timeout: Duration) -> LockResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.try_acquire().await? {
                return Ok(());
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout(timeout));
            }

            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Distributed lock builder.
pub struct LockBuilder {
    key: String,
    lease: Duration,
    clock: Arc<dyn Clock>,
}

impl LockBuilder {
    /// Create a builder for `key` with the default lease.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            lease: LockConfig::default().lease,
            clock: Arc::new(SystemClock),
        }
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(config.key.clone()).with_lease(config.lease)
    }

    /// Set the lease duration.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Use `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build a lock that stores its expiry timestamp as the record value.
    pub fn timestamp<S: LockStore>(self, store: S) -> TimestampLock<S> {
        TimestampLock::new(store, self.key, self.lease, self.clock)
    }

    /// Build a lock that stores a per-acquisition owner token under a
    /// store-side TTL.
    pub fn token<S: LockStore>(self, store: S) -> TokenLock<S> {
        TokenLock::new(store, self.key, self.lease)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::MemoryStore;
    use tokio_test::{assert_err, assert_ok};

    // Verify object safety.
    fn _assert_dyn_lock(_: &dyn DistributedLock) {}

    #[test]
    fn test_lock_builder() {
        let builder = LockBuilder::new("test-lock").with_lease(Duration::from_secs(60));

        assert_eq!(builder.key, "test-lock");
        assert_eq!(builder.lease, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_from_config() {
        let config = LockConfig::default();
        let store = MemoryStore::new();
        let lock = LockBuilder::from_config(&config).timestamp(store);

        assert_eq!(lock.key(), "redis_lock");
        assert_eq!(lock.lease(), Duration::from_millis(300));
    }

    #[test]
    fn test_error_display() {
        let err = LockError::InvalidTimestamp {
            key: "redis_lock".into(),
            value: "abc".into(),
        };
        assert_eq!(
            err.to_string(),
            "Lock redis_lock holds an invalid expiry timestamp: \"abc\""
        );
        assert!(
            LockError::Store(RedisError::Timeout)
                .to_string()
                .contains("timed out")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_timeout_expires() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let holder = LockBuilder::new("busy")
            .with_clock(clock.clone())
            .timestamp(store.clone());
        let waiter = LockBuilder::new("busy").with_clock(clock).timestamp(store);

        assert!(assert_ok!(holder.try_acquire().await));

        let err = assert_err!(waiter.acquire_timeout(Duration::from_millis(200)).await);
        assert!(matches!(err, LockError::Timeout(d) if d == Duration::from_millis(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_timeout_picks_up_release() {
        let store = Arc::new(MemoryStore::new());
        let holder = Arc::new(LockBuilder::new("handoff").token(store.clone()));
        let waiter = LockBuilder::new("handoff")
            .with_lease(Duration::from_secs(10))
            .token(store);

        assert!(assert_ok!(holder.try_acquire().await));

        let releaser = holder.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            releaser.release().await
        });

        assert_ok!(waiter.acquire_timeout(Duration::from_secs(1)).await);
        assert!(assert_ok!(waiter.is_held().await));
    }
}
