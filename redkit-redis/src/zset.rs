//! Sorted set commands.

use redis::AsyncCommands;

use crate::{RedisService, Result};

impl RedisService {
    /// Add one member with `score`. `true` when the member was new.
    pub async fn zset_add<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        member: T,
        score: f64,
    ) -> Result<bool> {
        let mut conn = self.get().await?;
        let added: u64 = conn.zadd(key, member, score).await?;
        Ok(added > 0)
    }

    /// Add many `(score, member)` pairs, returning how many were new.
    pub async fn zset_add_all<T: redis::ToRedisArgs + Send + Sync>(
        &self,
        key: &str,
        items: &[(f64, T)],
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get().await?;
        let added: u64 = conn.zadd_multiple(key, items).await?;
        Ok(added)
    }

    /// Members ranked `start..=end` by ascending score. Negative indexes
    /// count from the end.
    pub async fn zset_range<T: redis::FromRedisValue>(
        &self,
        key: &str,
        start: isize,
        end: isize,
    ) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let members: Vec<T> = conn.zrange(key, start, end).await?;
        Ok(members)
    }

    /// Members ranked `start..=end` by descending score.
    pub async fn zset_reverse_range<T: redis::FromRedisValue>(
        &self,
        key: &str,
        start: isize,
        end: isize,
    ) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let members: Vec<T> = conn.zrevrange(key, start, end).await?;
        Ok(members)
    }

    /// Remove members, returning how many were present.
    pub async fn zset_remove<T: redis::ToRedisArgs + Send + Sync>(
        &self,
        key: &str,
        members: &[T],
    ) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get().await?;
        let removed: u64 = conn.zrem(key, members).await?;
        Ok(removed)
    }

    /// Add `delta` to a member's score and return the new score.
    pub async fn zset_increment_score<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        member: T,
        delta: f64,
    ) -> Result<f64> {
        let mut conn = self.get().await?;
        let score: f64 = conn.zincr(key, member, delta).await?;
        Ok(score)
    }

    /// Zero-based ascending rank of a member.
    pub async fn zset_rank<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        member: T,
    ) -> Result<Option<u64>> {
        let mut conn = self.get().await?;
        let rank: Option<u64> = conn.zrank(key, member).await?;
        Ok(rank)
    }

    /// Members with `min <= score <= max`, ascending.
    pub async fn zset_range_by_score<T: redis::FromRedisValue>(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let members: Vec<T> = conn.zrangebyscore(key, min, max).await?;
        Ok(members)
    }

    /// Members with `min <= score <= max`, descending.
    pub async fn zset_reverse_range_by_score<T: redis::FromRedisValue>(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<T>> {
        let mut conn = self.get().await?;
        let members: Vec<T> = conn.zrevrangebyscore(key, max, min).await?;
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use crate::{RedisConfig, RedisService};

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_zset_ordering() {
        let redis = RedisService::new(RedisConfig::from_env().build())
            .await
            .unwrap();
        let key = "redkit:test:zset";

        assert!(redis.zset_add(key, "bronze", 1.0).await.unwrap());
        assert_eq!(
            redis
                .zset_add_all(key, &[(3.0, "gold"), (2.0, "silver")])
                .await
                .unwrap(),
            2
        );

        let asc: Vec<String> = redis.zset_range(key, 0, -1).await.unwrap();
        assert_eq!(asc, vec!["bronze", "silver", "gold"]);
        let desc: Vec<String> = redis.zset_reverse_range(key, 0, 0).await.unwrap();
        assert_eq!(desc, vec!["gold"]);

        let mid: Vec<String> = redis.zset_range_by_score(key, 1.5, 3.0).await.unwrap();
        assert_eq!(mid, vec!["silver", "gold"]);
        let mid_rev: Vec<String> = redis
            .zset_reverse_range_by_score(key, 1.5, 3.0)
            .await
            .unwrap();
        assert_eq!(mid_rev, vec!["gold", "silver"]);

        let score = redis.zset_increment_score(key, "bronze", 5.0).await.unwrap();
        assert!((score - 6.0).abs() < f64::EPSILON);
        assert_eq!(redis.zset_rank(key, "bronze").await.unwrap(), Some(2));
        assert_eq!(redis.zset_rank(key, "tin").await.unwrap(), None);

        assert_eq!(redis.zset_remove(key, &["gold", "tin"]).await.unwrap(), 1);
        redis.del_key(key).await.unwrap();
    }
}
