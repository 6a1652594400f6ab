//! Hash commands.

use redis::AsyncCommands;
use std::collections::HashMap;

use crate::{RedisService, Result};

impl RedisService {
    /// Check whether `field` exists in the hash at `key`.
    pub async fn has_hash_key(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.get().await?;
        let exists: bool = conn.hexists(key, field).await?;
        Ok(exists)
    }

    /// Set one hash field.
    pub async fn hash_put<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        field: &str,
        value: T,
    ) -> Result<()> {
        let mut conn = self.get().await?;
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    /// Set many hash fields at once.
    pub async fn hash_put_all<T: redis::ToRedisArgs + Send + Sync>(
        &self,
        key: &str,
        values: &[(&str, T)],
    ) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut conn = self.get().await?;
        let _: () = conn.hset_multiple(key, values).await?;
        Ok(())
    }

    /// Get one hash field.
    pub async fn hash_get<T: redis::FromRedisValue>(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>> {
        let mut conn = self.get().await?;
        let value: Option<T> = conn.hget(key, field).await?;
        Ok(value)
    }

    /// Get every field of the hash. Empty when the key is missing.
    pub async fn hash_get_all<T: redis::FromRedisValue>(
        &self,
        key: &str,
    ) -> Result<HashMap<String, T>> {
        let mut conn = self.get().await?;
        let value: HashMap<String, T> = conn.hgetall(key).await?;
        Ok(value)
    }

    /// Get several fields; missing fields come back as `None` in place.
    pub async fn hash_multi_get<T: redis::FromRedisValue>(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Vec<Option<T>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.get().await?;
        let values: Vec<Option<T>> = redis::cmd("HMGET")
            .arg(key)
            .arg(fields)
            .query_async(&mut *conn)
            .await?;
        Ok(values)
    }

    /// Delete fields, returning how many were removed.
    pub async fn hash_delete_keys(&self, key: &str, fields: &[&str]) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get().await?;
        let removed: u64 = conn.hdel(key, fields).await?;
        Ok(removed)
    }

    /// Add an integer delta to a field and return the new value.
    pub async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.get().await?;
        let value: i64 = conn.hincr(key, field, delta).await?;
        Ok(value)
    }

    /// Add a floating point delta to a field and return the new value.
    pub async fn hash_increment_float(&self, key: &str, field: &str, delta: f64) -> Result<f64> {
        let mut conn = self.get().await?;
        let value: f64 = redis::cmd("HINCRBYFLOAT")
            .arg(key)
            .arg(field)
            .arg(delta)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::{RedisConfig, RedisService};
    use std::collections::HashMap;

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_hash_put_all_get_all() {
        let redis = RedisService::new(RedisConfig::from_env().build())
            .await
            .unwrap();
        let key = "redkit:test:hash";

        redis
            .hash_put_all(key, &[("name", "widget"), ("color", "blue")])
            .await
            .unwrap();

        let all: HashMap<String, String> = redis.hash_get_all(key).await.unwrap();
        let expected: HashMap<String, String> = [("name", "widget"), ("color", "blue")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(all, expected);

        let picked: Vec<Option<String>> = redis
            .hash_multi_get(key, &["color", "size"])
            .await
            .unwrap();
        assert_eq!(picked, vec![Some("blue".to_string()), None]);

        assert!(redis.has_hash_key(key, "name").await.unwrap());
        assert_eq!(redis.hash_delete_keys(key, &["name", "nope"]).await.unwrap(), 1);

        redis.del_key(key).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_hash_increment() {
        let redis = RedisService::new(RedisConfig::from_env().build())
            .await
            .unwrap();
        let key = "redkit:test:hash-counter";

        assert_eq!(redis.hash_increment(key, "hits", 2).await.unwrap(), 2);
        assert_eq!(redis.hash_increment(key, "hits", -1).await.unwrap(), 1);
        let score = redis.hash_increment_float(key, "score", 1.5).await.unwrap();
        assert!((score - 1.5).abs() < f64::EPSILON);

        redis.del_key(key).await.unwrap();
    }
}
