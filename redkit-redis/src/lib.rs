//! # redkit Redis
//!
//! Pooled Redis client with thin, nil-safe wrappers over the common data
//! structure commands.
//!
//! ## Features
//!
//! - **Connection Pooling**: Efficient connection management with bb8
//! - **Data Structures**: strings, hashes, sets, sorted sets and lists
//! - **Batches**: pipelined multi-key writes and reads
//! - **Pub/Sub**: subscriptions plus a JSON message envelope
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use redkit_redis::{RedisConfig, RedisService};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .url("redis://localhost:6379")
//!         .pool_size(10)
//!         .build();
//!
//!     let redis = RedisService::new(config).await?;
//!
//!     redis.set_value_timeout("session:42", "alice", Duration::from_secs(60)).await?;
//!     redis.hash_put("user:42", "name", "alice").await?;
//!     redis.list_push("jobs", "resize:42").await?;
//!
//!     let name: Option<String> = redis.hash_get("user:42", "name").await?;
//!     println!("{name:?}");
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod hash;
mod list;
mod pool;
mod pubsub;
mod service;
mod set;
mod zset;

pub use config::{RedisConfig, RedisConfigBuilder};
pub use error::{RedisError, Result};
pub use pool::{PoolStats, RedisConnection, RedisPool};
pub use pubsub::{ChannelMessage, Message, PubSub, Subscription};
pub use service::RedisService;

// Re-export redis crate for convenience
pub use redis;
pub use redis::{AsyncCommands, RedisResult, Value};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::config::{RedisConfig, RedisConfigBuilder};
    pub use crate::error::{RedisError, Result};
    pub use crate::pool::{PoolStats, RedisConnection, RedisPool};
    pub use crate::pubsub::{ChannelMessage, Message, PubSub, Subscription};
    pub use crate::service::RedisService;
    pub use redis::AsyncCommands;
}
