//! List commands. Pushes append on the right, pops take from the left,
//! so a list behaves as a FIFO queue.

use redis::AsyncCommands;
use std::time::Duration;

use crate::{RedisService, Result};

impl RedisService {
    /// Append one value, returning the list length afterwards.
    pub async fn list_push<T: redis::ToRedisArgs + Send + Sync>(
        &self,
        key: &str,
        value: T,
    ) -> Result<u64> {
        let mut conn = self.get().await?;
        let len: u64 = conn.rpush(key, value).await?;
        Ok(len)
    }

    /// Append several values in order, returning the list length afterwards.
    pub async fn list_push_all<T: redis::ToRedisArgs + Send + Sync>(
        &self,
        key: &str,
        values: &[T],
    ) -> Result<u64> {
        if values.is_empty() {
            let mut conn = self.get().await?;
            let len: u64 = conn.llen(key).await?;
            return Ok(len);
        }
        let mut conn = self.get().await?;
        let len: u64 = conn.rpush(key, values).await?;
        Ok(len)
    }

    /// Elements `start..=end`; `0, -1` returns the whole list.
    pub async fn list_range<T: redis::FromRedisValue>(
        &self,
        key: &str,
        start: isize,
        end: isize,
    ) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let values: Vec<T> = conn.lrange(key, start, end).await?;
        Ok(values)
    }

    /// Remove and return the first element.
    pub async fn list_pop<T: redis::FromRedisValue>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get().await?;
        let value: Option<T> = conn.lpop(key, None).await?;
        Ok(value)
    }

    /// Remove and return the first element, waiting up to `timeout` for one
    /// to arrive. `None` if the wait expires.
    ///
    /// The connection is held for the whole wait.
    pub async fn list_pop_timeout<T: redis::FromRedisValue>(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<T>> {
        let mut conn = self.get().await?;
        let value: Option<(String, T)> = conn.blpop(key, timeout.as_secs_f64()).await?;
        Ok(value.map(|(_, v)| v))
    }
}
