//! Distributed locks for redkit.
//!
//! A lock is one record under a fixed key in a shared [`LockStore`]. Holding
//! the lock means having written that record; the lease bounds how long an
//! abandoned record can block everyone else.
//!
//! ## Lock kinds
//!
//! - [`TimestampLock`] - stores its own expiry time and reclaims stale
//!   records with `GETSET`. Release is unconditional.
//! - [`TokenLock`] - stores a per-acquisition owner token under a store-side
//!   TTL; release and extend only act on the caller's own record.
//!
//! Both implement [`DistributedLock`]. `try_acquire` makes exactly one
//! attempt; [`DistributedLock::acquire_timeout`] polls for you.
//!
//! ## Stores
//!
//! - [`RedisService`](redkit_redis::RedisService) for a shared Redis.
//! - [`MemoryStore`] for tests and single-process use.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use redkit_lock::{DistributedLock, LockBuilder, LockConfig};
//! use redkit_redis::{RedisConfig, RedisService};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let redis = Arc::new(RedisService::new(RedisConfig::from_env().build()).await?);
//!
//!     let lock = LockBuilder::from_config(&LockConfig::from_env()).token(redis);
//!
//!     if lock.try_acquire().await? {
//!         // Critical section
//!         lock.release().await?;
//!     }
//!
//!     lock.acquire_timeout(Duration::from_secs(2)).await?;
//!     lock.release().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod lock;
pub mod memory;
pub mod store;
pub mod timestamp;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_LEASE, DEFAULT_LOCK_KEY, LockConfig};
pub use lock::{DistributedLock, LOCK_POLL_INTERVAL, LockBuilder, LockError, LockResult};
pub use memory::MemoryStore;
pub use store::LockStore;
pub use timestamp::TimestampLock;
pub use token::TokenLock;
