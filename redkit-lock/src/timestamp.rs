//! Expiry-timestamp lock.
//!
//! The lock record's value is the absolute time (ms since epoch) at which the
//! current holder's lease ends: `now + lease + 1`.
//!
//! Acquisition:
//!
//! 1. `SETNX key expiry`. If the key was absent the lock is ours.
//! 2. Otherwise `GET key`. An empty or missing value is a lost attempt.
//! 3. If the stored expiry is still in the future the lock is held elsewhere.
//! 4. If it has passed, `GETSET key expiry` and win only if the value we
//!    displaced had also passed. When several callers reclaim the same stale
//!    record at once, only the first swap sees the stale value; later ones
//!    see a contender's fresh expiry and lose.
//!
//! # Caveats
//!
//! - [`release`](DistributedLock::release) deletes the record without
//!   checking who wrote it. A caller whose lease ran out can delete a lock now
//!   held by someone else. Use [`TokenLock`](crate::TokenLock) when that
//!   matters.
//! - A losing reclaimer's `GETSET` still overwrites the record, nudging the
//!   winner's expiry forward by the time between the two attempts.
//! - Expiry is judged by each caller's wall clock; skew between machines
//!   shortens or lengthens leases.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::{Clock, millis};
use crate::lock::{DistributedLock, LockError, LockResult};
use crate::store::LockStore;

/// Lock whose record holds its own expiry timestamp.
pub struct TimestampLock<S> {
    store: S,
    key: String,
    lease: Duration,
    clock: Arc<dyn Clock>,
}

impl<S: LockStore> TimestampLock<S> {
    /// Create a lock on `key` in `store`.
    pub fn new(store: S, key: impl Into<String>, lease: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            key: key.into(),
            lease,
            clock,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Expiry written by an acquisition made at `now`.
    fn expiry_from(&self, now: i64) -> i64 {
        now.saturating_add(millis(self.lease)).saturating_add(1)
    }

    fn parse(&self, value: &str) -> LockResult<i64> {
        // Only the exact form written by `expiry_from` is accepted.
        value
            .parse::<i64>()
            .ok()
            .filter(|expiry| expiry.to_string() == value)
            .ok_or_else(|| LockError::InvalidTimestamp {
                key: self.key.clone(),
                value: value.to_string(),
            })
    }
}

#[async_trait]
impl<S: LockStore> DistributedLock for TimestampLock<S> {
    fn key(&self) -> &str {
        &self.key
    }

    fn lease(&self) -> Duration {
        self.lease
    }

    async fn try_acquire(&self) -> LockResult<bool> {
        let now = self.clock.now_millis();
        let expiry = self.expiry_from(now).to_string();

        if self.store.set_nx(&self.key, &expiry).await? {
            info!(key = %self.key, expires_at = %expiry, "Acquired lock");
            return Ok(true);
        }

        let current = match self.store.get(&self.key).await? {
            Some(v) if !v.is_empty() => v,
            _ => {
                debug!(key = %self.key, "Lock record vanished between SETNX and GET");
                return Ok(false);
            }
        };

        let held_until = self.parse(&current)?;
        if held_until >= now {
            debug!(key = %self.key, held_until = held_until, "Lock is held");
            return Ok(false);
        }

        let Some(previous) = self.store.get_set(&self.key, &expiry).await? else {
            debug!(key = %self.key, "Lock record vanished during reclamation");
            return Ok(false);
        };

        let previous = self.parse(&previous)?;
        if previous < now {
            warn!(
                key = %self.key,
                abandoned_at = previous,
                expires_at = %expiry,
                "Reclaimed abandoned lock"
            );
            Ok(true)
        } else {
            debug!(key = %self.key, "Lost reclamation race");
            Ok(false)
        }
    }

    async fn release(&self) -> LockResult<bool> {
        let removed = self.store.del(&self.key).await?;
        debug!(key = %self.key, removed = removed, "Released lock");
        Ok(removed > 0)
    }
}
