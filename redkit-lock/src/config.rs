//! Lock configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key used when none is configured.
pub const DEFAULT_LOCK_KEY: &str = "redis_lock";

/// Lease used when none is configured.
pub const DEFAULT_LEASE: Duration = Duration::from_millis(300);

/// Where a lock lives and how long an acquisition lasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Store key holding the lock record.
    #[serde(default = "default_key")]
    pub key: String,
    /// Lease duration, serialized as whole milliseconds.
    #[serde(rename = "lease_ms", with = "duration_millis", default = "default_lease")]
    pub lease: Duration,
}

fn default_key() -> String {
    DEFAULT_LOCK_KEY.to_string()
}

fn default_lease() -> Duration {
    DEFAULT_LEASE
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            lease: default_lease(),
        }
    }
}

impl LockConfig {
    /// Create a configuration for `key` with the default lease.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Set the lease duration.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Load from `REDKIT_LOCK_KEY` and `REDKIT_LOCK_LEASE_MS`, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(key) = var("REDKIT_LOCK_KEY")
            && !key.is_empty()
        {
            config.key = key;
        }

        if let Some(lease) = var("REDKIT_LOCK_LEASE_MS")
            && let Ok(ms) = lease.trim().parse()
        {
            config.lease = Duration::from_millis(ms);
        }

        config
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
