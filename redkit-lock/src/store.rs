//! The key-value primitives a lock is built from.
//!
//! Each method must be a single atomic operation on the store; the lock
//! protocols rely on nothing else for coordination.

use async_trait::async_trait;
use redis::Script;
use redkit_redis::RedisService;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::clock::millis;
use crate::lock::LockResult;

/// Atomic key-value operations over string values.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Create `key` only if absent (SETNX). `true` when created.
    async fn set_nx(&self, key: &str, value: &str) -> LockResult<bool>;

    /// Read `key` (GET).
    async fn get(&self, key: &str) -> LockResult<Option<String>>;

    /// Write `key`, returning the previous value (GETSET). Clears any TTL.
    async fn get_set(&self, key: &str, value: &str) -> LockResult<Option<String>>;

    /// Delete `key` (DEL), returning how many keys were removed.
    async fn del(&self, key: &str) -> LockResult<u64>;

    /// Expire `key` after whole `seconds` (EXPIRE). `false` if absent.
    async fn expire(&self, key: &str, seconds: u64) -> LockResult<bool>;

    /// Create `key` only if absent, expiring after `ttl` (SET NX PX).
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool>;

    /// Delete `key` only if it currently holds `expected`.
    async fn del_if_eq(&self, key: &str, expected: &str) -> LockResult<bool>;

    /// Reset the TTL of `key` to `ttl` only if it currently holds `expected`.
    async fn pexpire_if_eq(&self, key: &str, expected: &str, ttl: Duration) -> LockResult<bool>;
}

#[async_trait]
impl<S: LockStore + ?Sized> LockStore for Arc<S> {
    async fn set_nx(&self, key: &str, value: &str) -> LockResult<bool> {
        (**self).set_nx(key, value).await
    }

    async fn get(&self, key: &str) -> LockResult<Option<String>> {
        (**self).get(key).await
    }

    async fn get_set(&self, key: &str, value: &str) -> LockResult<Option<String>> {
        (**self).get_set(key, value).await
    }

    async fn del(&self, key: &str) -> LockResult<u64> {
        (**self).del(key).await
    }

    async fn expire(&self, key: &str, seconds: u64) -> LockResult<bool> {
        (**self).expire(key, seconds).await
    }

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        (**self).set_nx_px(key, value, ttl).await
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> LockResult<bool> {
        (**self).del_if_eq(key, expected).await
    }

    async fn pexpire_if_eq(&self, key: &str, expected: &str, ttl: Duration) -> LockResult<bool> {
        (**self).pexpire_if_eq(key, expected, ttl).await
    }
}

static DEL_IF_EQ: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        if redis.call("get", KEYS[1]) == ARGV[1] then
            return redis.call("del", KEYS[1])
        else
            return 0
        end
        "#,
    )
});

static PEXPIRE_IF_EQ: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        if redis.call("get", KEYS[1]) == ARGV[1] then
            return redis.call("pexpire", KEYS[1], ARGV[2])
        else
            return 0
        end
        "#,
    )
});

#[async_trait]
impl LockStore for RedisService {
    async fn set_nx(&self, key: &str, value: &str) -> LockResult<bool> {
        let mut conn = self.get().await?;
        let created: bool = redis::cmd("SETNX")
            .arg(key)
            .arg(value)
            .query_async(&mut *conn)
            .await?;
        Ok(created)
    }

    async fn get(&self, key: &str) -> LockResult<Option<String>> {
        let mut conn = self.get().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn get_set(&self, key: &str, value: &str) -> LockResult<Option<String>> {
        let mut conn = self.get().await?;
        let previous: Option<String> = redis::cmd("GETSET")
            .arg(key)
            .arg(value)
            .query_async(&mut *conn)
            .await?;
        Ok(previous)
    }

    async fn del(&self, key: &str) -> LockResult<u64> {
        let mut conn = self.get().await?;
        let removed: u64 = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        Ok(removed)
    }

    async fn expire(&self, key: &str, seconds: u64) -> LockResult<bool> {
        let mut conn = self.get().await?;
        let set: bool = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut *conn)
            .await?;
        Ok(set)
    }

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let mut conn = self.get().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX") // Only set if not exists
            .arg("PX") // Expiry in milliseconds
            .arg(millis(ttl).max(1))
            .query_async(&mut *conn)
            .await?;
        Ok(result.is_some())
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> LockResult<bool> {
        let mut conn = self.get().await?;
        let removed: i64 = DEL_IF_EQ
            .key(key)
            .arg(expected)
            .invoke_async(&mut *conn)
            .await?;
        Ok(removed == 1)
    }

    async fn pexpire_if_eq(&self, key: &str, expected: &str, ttl: Duration) -> LockResult<bool> {
        let mut conn = self.get().await?;
        let updated: i64 = PEXPIRE_IF_EQ
            .key(key)
            .arg(expected)
            .arg(millis(ttl).max(1))
            .invoke_async(&mut *conn)
            .await?;
        Ok(updated == 1)
    }
}
