//! Redis service: pool access, key and string commands, batches.
//!
//! Collection commands live in the `hash`, `set`, `zset` and `list`
//! modules as further `impl RedisService` blocks.
//!
//! Every convenience method checks a connection out of the pool, forwards a
//! single command (or a single pipeline) and coerces nil replies into safe
//! defaults.

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::{
    RedisConfig, RedisError, Result,
    pool::{self, PoolStats, RedisConnection, RedisPool},
    pubsub::{ChannelMessage, PubSub},
};

/// Redis service providing the connection pool and convenience methods.
pub struct RedisService {
    config: RedisConfig,
    pool: RedisPool,
}

impl RedisService {
    /// Connect to Redis and build the pool.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = pool::connect(&config).await?;
        Ok(Self { config, pool })
    }

    /// Create from an existing pool.
    pub fn from_pool(config: RedisConfig, pool: RedisPool) -> Self {
        Self { config, pool }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    /// Get a connection from the pool.
    pub async fn get(&self) -> Result<RedisConnection<'_>> {
        let conn = self.pool.get().await?;
        Ok(RedisConnection::new(conn))
    }

    /// Get a dedicated connection (not from pool).
    pub async fn get_dedicated(&self) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(self.config.connection_url())
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))
    }

    /// Create a Pub/Sub client.
    pub fn pubsub(&self) -> Result<PubSub> {
        PubSub::new(&self.config)
    }

    /// Check if the connection is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Get pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    // Keys

    /// Check if a key exists.
    pub async fn has_key(&self, key: &str) -> Result<bool> {
        let mut conn = self.get().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    /// Set expiration on a key (PEXPIRE). `false` when the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.get().await?;
        let result: bool = conn.pexpire(key, millis(ttl)).await?;
        Ok(result)
    }

    /// Get TTL of a key. `None` for missing keys and keys without expiry.
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.get().await?;
        let ttl: i64 = conn.pttl(key).await?;
        Ok(u64::try_from(ttl).ok().map(Duration::from_millis))
    }

    /// Delete a single key.
    pub async fn del_key(&self, key: &str) -> Result<bool> {
        let mut conn = self.get().await?;
        let deleted: u64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    /// Delete several keys, returning how many existed.
    pub async fn del_keys<K: AsRef<str>>(&self, keys: &[K]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        let mut conn = self.get().await?;
        let deleted: u64 = conn.del(&keys).await?;
        Ok(deleted)
    }

    // Strings

    /// Set a value without expiry.
    pub async fn set_value<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        value: T,
    ) -> Result<()> {
        let mut conn = self.get().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    /// Set a value that expires after `ttl` (PSETEX).
    pub async fn set_value_timeout<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.get().await?;
        let _: () = conn.pset_ex(key, value, millis(ttl) as u64).await?;
        Ok(())
    }

    /// Overwrite part of a string starting at `offset` (SETRANGE).
    /// Returns the string's length afterwards.
    pub async fn set_value_range<T: redis::ToRedisArgs + Send + Sync>(
        &self,
        key: &str,
        value: T,
        offset: usize,
    ) -> Result<u64> {
        let mut conn = self.get().await?;
        let len: u64 = redis::cmd("SETRANGE")
            .arg(key)
            .arg(offset)
            .arg(value)
            .query_async(&mut *conn)
            .await?;
        Ok(len)
    }

    /// Get a value.
    pub async fn get_value<T: redis::FromRedisValue>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get().await?;
        let value: Option<T> = conn.get(key).await?;
        Ok(value)
    }

    /// Store any serializable object as JSON, optionally with a TTL.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        match ttl {
            Some(ttl) => self.set_value_timeout(key, json, ttl).await,
            None => self.set_value(key, json).await,
        }
    }

    /// Load an object stored with [`set_json`](Self::set_json).
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self.get_value(key).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(Into::into)
    }

    /// Increment a counter.
    pub async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.get().await?;
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    // Messaging

    /// Publish `message` wrapped in a [`ChannelMessage`] envelope.
    /// Returns the number of subscribers that received it.
    pub async fn send_message_to_channel(&self, channel: &str, message: &str) -> Result<u32> {
        let payload = ChannelMessage::new(message).to_payload()?;
        let mut conn = self.get().await?;
        let receivers: u32 = conn.publish(channel, payload).await?;
        debug!(channel = %channel, receivers = receivers, "Sent channel message");
        Ok(receivers)
    }

    // Batches

    /// Write many string keys in one pipeline. With `ttl`, each key is
    /// also given that expiry; without it the keys never expire.
    pub async fn batch_set<K, V>(&self, entries: &[(K, V)], ttl: Option<Duration>) -> Result<()>
    where
        K: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync,
        V: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync,
    {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.set(key, value).ignore();
            if let Some(ttl) = ttl {
                pipe.pexpire(key, millis(ttl)).ignore();
            }
        }

        let mut conn = self.get().await?;
        let _: () = pipe.query_async(&mut *conn).await?;
        debug!(count = entries.len(), "Pipelined batch set");
        Ok(())
    }

    /// Read many string keys in one pipeline, in the order given.
    pub async fn batch_get<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.get(key.as_ref());
        }

        let mut conn = self.get().await?;
        let values: Vec<Option<String>> = pipe.query_async(&mut *conn).await?;
        Ok(values)
    }

    /// Execute a Lua script.
    pub async fn eval<T: redis::FromRedisValue>(
        &self,
        script: &str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<T> {
        let mut conn = self.get().await?;
        let script = redis::Script::new(script);
        let result: T = script
            .key(keys)
            .arg(args)
            .invoke_async(&mut *conn)
            .await?;
        Ok(result)
    }
}

/// Milliseconds for PEXPIRE/PSETEX, saturating on overflow.
///
/// Never below 1: Redis deletes a key given a zero expiry and rejects a
/// zero PSETEX.
pub(crate) fn millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    async fn connect() -> RedisService {
        RedisService::new(RedisConfig::from_env().build())
            .await
            .unwrap()
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(2500)), 2500);
        assert_eq!(millis(Duration::from_secs(u64::MAX)), i64::MAX);
    }

    #[test]
    fn test_millis_keeps_sub_second_ttls() {
        assert_eq!(millis(Duration::from_millis(500)), 500);
        assert_eq!(millis(Duration::from_micros(1500)), 1);
        assert_eq!(millis(Duration::ZERO), 1);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_set_get_value_round_trip() {
        let redis = connect().await;

        redis.set_value("redkit:test:value", "test_value").await.unwrap();
        let value: Option<String> = redis.get_value("redkit:test:value").await.unwrap();
        assert_eq!(value, Some("test_value".to_string()));

        redis.del_key("redkit:test:value").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_json_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Order {
            id: u32,
            items: Vec<String>,
        }

        let redis = connect().await;
        let order = Order {
            id: 7,
            items: vec!["apple".into(), "pear".into()],
        };

        redis.set_json("redkit:test:order", &order, None).await.unwrap();
        let loaded: Option<Order> = redis.get_json("redkit:test:order").await.unwrap();
        assert_eq!(loaded, Some(order));

        redis.del_key("redkit:test:order").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_del_keys_counts_existing() {
        let redis = connect().await;
        let keys = ["redkit:test:d1", "redkit:test:d2", "redkit:test:d3"];
        for key in keys {
            redis.set_value(key, 1).await.unwrap();
        }

        assert_eq!(redis.del_keys(&keys).await.unwrap(), 3);
        assert_eq!(redis.del_keys(&keys).await.unwrap(), 0);
        assert_eq!(redis.del_keys::<&str>(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_batch_set_and_get() {
        let redis = connect().await;
        let entries = [("redkit:test:b1", "one"), ("redkit:test:b2", "two")];

        redis
            .batch_set(&entries, Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let values = redis
            .batch_get(&["redkit:test:b1", "redkit:test:missing", "redkit:test:b2"])
            .await
            .unwrap();
        assert_eq!(
            values,
            vec![Some("one".to_string()), None, Some("two".to_string())]
        );
        assert!(redis.ttl("redkit:test:b1").await.unwrap().is_some());

        redis.del_keys(&["redkit:test:b1", "redkit:test:b2"]).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_sub_second_ttls_keep_keys() {
        let redis = connect().await;
        let ttl = Duration::from_millis(500);

        redis
            .batch_set(&[("redkit:test:short1", "one")], Some(ttl))
            .await
            .unwrap();
        redis
            .set_value_timeout("redkit:test:short2", "two", ttl)
            .await
            .unwrap();
        redis.set_value("redkit:test:short3", "three").await.unwrap();
        assert!(redis.expire("redkit:test:short3", ttl).await.unwrap());

        for key in ["redkit:test:short1", "redkit:test:short2", "redkit:test:short3"] {
            assert!(redis.has_key(key).await.unwrap(), "{key}");
            let remaining = redis.ttl(key).await.unwrap().unwrap();
            assert!(remaining <= ttl, "{key}: {remaining:?}");
        }

        tokio::time::sleep(Duration::from_millis(700)).await;
        let values = redis
            .batch_get(&["redkit:test:short1", "redkit:test:short2", "redkit:test:short3"])
            .await
            .unwrap();
        assert_eq!(values, vec![None, None, None]);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_set_value_range() {
        let redis = connect().await;
        redis.set_value("redkit:test:range", "Hello World").await.unwrap();

        let len = redis
            .set_value_range("redkit:test:range", "Redis", 6)
            .await
            .unwrap();
        assert_eq!(len, 11);

        let value: Option<String> = redis.get_value("redkit:test:range").await.unwrap();
        assert_eq!(value.as_deref(), Some("Hello Redis"));

        redis.del_key("redkit:test:range").await.unwrap();
    }
}
