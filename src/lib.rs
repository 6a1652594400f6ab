// redkit - Redis data-structure helpers and distributed locks
//
// The Redis client is always available; locks are behind the default
// `lock` feature.

// Re-export the Redis client layer
pub use redkit_redis::*;

// Re-export optional crates
#[cfg(feature = "lock")]
pub use redkit_lock;

#[cfg(feature = "lock")]
pub use redkit_lock::{
    DistributedLock, LockBuilder, LockConfig, LockError, LockResult, LockStore, MemoryStore,
    TimestampLock, TokenLock,
};

// Prelude for common imports
pub mod prelude {
    pub use redkit_redis::prelude::*;

    #[cfg(feature = "lock")]
    pub use redkit_lock::{
        Clock, DistributedLock, LockBuilder, LockConfig, LockError, LockStore, MemoryStore,
        SystemClock, TimestampLock, TokenLock,
    };
}
