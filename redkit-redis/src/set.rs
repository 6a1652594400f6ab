//! Set commands.

use redis::AsyncCommands;

use crate::{RedisService, Result};

impl RedisService {
    /// Add members, returning how many were new.
    pub async fn set_add<T: redis::ToRedisArgs + Send + Sync>(
        &self,
        key: &str,
        members: &[T],
    ) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get().await?;
        let added: u64 = conn.sadd(key, members).await?;
        Ok(added)
    }

    /// Remove members, returning how many were present.
    pub async fn set_remove<T: redis::ToRedisArgs + Send + Sync>(
        &self,
        key: &str,
        members: &[T],
    ) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get().await?;
        let removed: u64 = conn.srem(key, members).await?;
        Ok(removed)
    }

    /// All members of the set.
    pub async fn set_members<T: redis::FromRedisValue>(&self, key: &str) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let members: Vec<T> = conn.smembers(key).await?;
        Ok(members)
    }

    /// Set is member.
    pub async fn set_is_member<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        member: T,
    ) -> Result<bool> {
        let mut conn = self.get().await?;
        let is_member: bool = conn.sismember(key, member).await?;
        Ok(is_member)
    }

    /// Intersection of `key` with every set in `others`.
    pub async fn set_intersect<T: redis::FromRedisValue>(
        &self,
        key: &str,
        others: &[&str],
    ) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let members: Vec<T> = conn.sinter(with_first(key, others)).await?;
        Ok(members)
    }

    /// Union of `key` with every set in `others`.
    pub async fn set_union<T: redis::FromRedisValue>(
        &self,
        key: &str,
        others: &[&str],
    ) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let members: Vec<T> = conn.sunion(with_first(key, others)).await?;
        Ok(members)
    }

    /// Members of `key` not present in any set in `others`.
    pub async fn set_difference<T: redis::FromRedisValue>(
        &self,
        key: &str,
        others: &[&str],
    ) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let members: Vec<T> = conn.sdiff(with_first(key, others)).await?;
        Ok(members)
    }

    /// `count` random members; the same member may be returned more than once.
    pub async fn set_random_members<T: redis::FromRedisValue>(
        &self,
        key: &str,
        count: usize,
    ) -> Result<Vec<T>> {
        // A negative count asks SRANDMEMBER for repeats
        let count = -i64::try_from(count).unwrap_or(i64::MAX);
        self.srandmember(key, count).await
    }

    /// Up to `count` distinct random members.
    pub async fn set_distinct_random_members<T: redis::FromRedisValue>(
        &self,
        key: &str,
        count: usize,
    ) -> Result<Vec<T>> {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        self.srandmember(key, count).await
    }

    async fn srandmember<T: redis::FromRedisValue>(&self, key: &str, count: i64) -> Result<Vec<T>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.get().await?;
        let members: Vec<T> = redis::cmd("SRANDMEMBER")
            .arg(key)
            .arg(count)
            .query_async(&mut *conn)
            .await?;
        Ok(members)
    }
}

fn with_first<'a>(key: &'a str, others: &[&'a str]) -> Vec<&'a str> {
    let mut keys = Vec::with_capacity(others.len() + 1);
    keys.push(key);
    keys.extend_from_slice(others);
    keys
}
