//! In-process lock store.
//!
//! Holds every record in one `HashMap` behind a mutex, so each operation is
//! atomic with respect to every other. TTLs are checked lazily against the
//! store's clock, and every [`CLEANUP_INTERVAL`] operations the whole map is
//! swept so keys that are never touched again do not pile up. Suitable for
//! tests and single-process deployments.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock, millis};
use crate::lock::LockResult;
use crate::store::LockStore;

/// Operations between full sweeps of expired entries.
pub const CLEANUP_INTERVAL: usize = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<i64>,
}

impl Entry {
    fn persistent(value: &str) -> Self {
        Self {
            value: value.to_string(),
            expires_at: None,
        }
    }

    fn is_live(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory [`LockStore`].
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    ops: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store whose TTLs follow `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            ops: AtomicUsize::new(0),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Whether no live keys remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();
        let removed = sweep(&mut entries, now);
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired entries");
        }
        removed
    }

    /// Run `f` on the live entry for `key`, dropping it first if expired.
    fn with_live<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, Entry>, bool) -> T,
    ) -> T {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();
        let op = self.ops.fetch_add(1, Ordering::Relaxed);
        if op % CLEANUP_INTERVAL == CLEANUP_INTERVAL - 1 {
            sweep(&mut entries, now);
        }
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            trace!(key = %key, "Evicting expired entry");
            entries.remove(key);
        }
        let present = entries.contains_key(key);
        f(&mut entries, present)
    }

    /// Set an expiry `ttl_ms` from now on `key`, optionally only when it
    /// holds `expected`.
    fn pexpire(&self, key: &str, expected: Option<&str>, ttl_ms: i64) -> bool {
        let expires_at = self.clock.now_millis().saturating_add(ttl_ms);
        self.with_live(key, |entries, _| match entries.get_mut(key) {
            Some(entry) if expected.is_none_or(|v| entry.value == v) => {
                entry.expires_at = Some(expires_at);
                true
            }
            _ => false,
        })
    }
}

fn sweep(entries: &mut HashMap<String, Entry>, now: i64) -> usize {
    let before = entries.len();
    entries.retain(|_, e| e.is_live(now));
    before - entries.len()
}

/// Lease in milliseconds for PX-style writes. A zero lease is rounded up to
/// 1 ms, as the Redis store does, so a fresh record is never born expired.
fn lease_millis(ttl: Duration) -> i64 {
    millis(ttl).max(1)
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn set_nx(&self, key: &str, value: &str) -> LockResult<bool> {
        Ok(self.with_live(key, |entries, present| {
            if !present {
                entries.insert(key.to_string(), Entry::persistent(value));
            }
            !present
        }))
    }

    async fn get(&self, key: &str) -> LockResult<Option<String>> {
        Ok(self.with_live(key, |entries, _| {
            entries.get(key).map(|e| e.value.clone())
        }))
    }

    async fn get_set(&self, key: &str, value: &str) -> LockResult<Option<String>> {
        Ok(self.with_live(key, |entries, _| {
            entries
                .insert(key.to_string(), Entry::persistent(value))
                .map(|e| e.value)
        }))
    }

    async fn del(&self, key: &str) -> LockResult<u64> {
        Ok(self.with_live(key, |entries, _| u64::from(entries.remove(key).is_some())))
    }

    async fn expire(&self, key: &str, seconds: u64) -> LockResult<bool> {
        let ttl = Duration::from_secs(seconds);
        Ok(self.pexpire(key, None, millis(ttl)))
    }

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let expires_at = self.clock.now_millis().saturating_add(lease_millis(ttl));
        Ok(self.with_live(key, |entries, present| {
            if !present {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at: Some(expires_at),
                    },
                );
            }
            !present
        }))
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> LockResult<bool> {
        Ok(self.with_live(key, |entries, _| {
            if entries.get(key).is_some_and(|e| e.value == expected) {
                entries.remove(key);
                true
            } else {
                false
            }
        }))
    }

    async fn pexpire_if_eq(&self, key: &str, expected: &str, ttl: Duration) -> LockResult<bool> {
        Ok(self.pexpire(key, Some(expected), lease_millis(ttl)))
    }
}
