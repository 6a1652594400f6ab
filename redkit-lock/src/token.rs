//! Owner-token lock.
//!
//! Acquisition is one atomic `SET key token NX PX lease`: the store both
//! arbitrates contention and expires abandoned locks. The value is a random
//! token unique to that acquisition, and release, extend and ownership checks
//! all compare against it, so a caller can never remove or prolong a lock
//! that has since passed to someone else.
//!
//! One `TokenLock` instance represents one would-be owner. It is not
//! reentrant: acquiring again while holding returns `false`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lock::{DistributedLock, LockError, LockResult};
use crate::store::LockStore;

/// Lock whose record holds the current owner's token under a store TTL.
pub struct TokenLock<S> {
    store: S,
    key: String,
    lease: Duration,
    token: Mutex<Option<String>>,
}

impl<S: LockStore> TokenLock<S> {
    /// Create a lock on `key` in `store`.
    pub fn new(store: S, key: impl Into<String>, lease: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            lease,
            token: Mutex::new(None),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Token written by this instance's current acquisition, if any.
    pub fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    /// Whether the record still carries this instance's token.
    pub async fn is_held(&self) -> LockResult<bool> {
        let Some(token) = self.token() else {
            return Ok(false);
        };
        let current = self.store.get(&self.key).await?;
        Ok(current.as_deref() == Some(token.as_str()))
    }

    /// Restart the lease at `lease` from now.
    ///
    /// Fails with [`LockError::NotHeld`] once the record has expired or
    /// passed to another owner.
    pub async fn extend(&self, lease: Duration) -> LockResult<()> {
        let token = self.token().ok_or(LockError::NotHeld)?;

        if self.store.pexpire_if_eq(&self.key, &token, lease).await? {
            debug!(key = %self.key, lease = ?lease, "Extended lock");
            Ok(())
        } else {
            warn!(key = %self.key, "Cannot extend lock (not held or expired)");
            self.forget(&token);
            Err(LockError::NotHeld)
        }
    }

    /// Drop the remembered token unless a newer acquisition replaced it.
    fn forget(&self, token: &str) {
        let mut current = self.token.lock();
        if current.as_deref() == Some(token) {
            *current = None;
        }
    }
}

#[async_trait]
impl<S: LockStore> DistributedLock for TokenLock<S> {
    fn key(&self) -> &str {
        &self.key
    }

    fn lease(&self) -> Duration {
        self.lease
    }

    async fn try_acquire(&self) -> LockResult<bool> {
        let token = Uuid::new_v4().to_string();

        if self.store.set_nx_px(&self.key, &token, self.lease).await? {
            info!(key = %self.key, "Acquired lock");
            *self.token.lock() = Some(token);
            Ok(true)
        } else {
            debug!(key = %self.key, "Failed to acquire lock (already held)");
            Ok(false)
        }
    }

    async fn release(&self) -> LockResult<bool> {
        let Some(token) = self.token.lock().take() else {
            debug!(key = %self.key, "Release skipped, lock not held by this owner");
            return Ok(false);
        };

        let removed = self.store.del_if_eq(&self.key, &token).await?;
        if removed {
            debug!(key = %self.key, "Released lock");
        } else {
            warn!(key = %self.key, "Lock expired or changed owner before release");
        }
        Ok(removed)
    }
}
