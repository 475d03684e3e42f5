pub mod memory_store;
pub mod redis_store;

pub use memory_store::InMemoryStateStore;
pub use redis_store::RedisStateStore;

use crate::error::internal::InternalError;

/// Result of a batched, cursor-driven `SCAN` + `DEL` pass, used by the
/// admin invalidator. `matched` always reflects how many keys matched the
/// pattern; `deleted` is zero when `dry_run` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanDeleteResult {
    pub matched: u64,
    pub deleted: u64,
}

/// Persistence backend used by the cache, the key registry, and the rate
/// limiter. Exactly two implementations exist: a real [`RedisStateStore`]
/// and an [`InMemoryStateStore`] used both as the startup fallback and as
/// the default backend in tests. Modeled as an enum (rather than a trait
/// object) so dispatch stays static and cheap.
#[derive(Debug, Clone)]
pub enum StateStore {
    Redis(RedisStateStore),
    InMemory(InMemoryStateStore),
}

impl StateStore {
    pub async fn get(&self, key: &str) -> Result<Option<String>, InternalError> {
        match self {
            Self::Redis(store) => store.get(key).await,
            Self::InMemory(store) => store.get(key).await,
        }
    }

    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), InternalError> {
        match self {
            Self::Redis(store) => store.set(key, value, ttl_seconds).await,
            Self::InMemory(store) => store.set(key, value, ttl_seconds).await,
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), InternalError> {
        match self {
            Self::Redis(store) => store.delete(key).await,
            Self::InMemory(store) => store.delete(key).await,
        }
    }

    /// `INCR key`, then `EXPIRE key window_seconds` only when the counter
    /// was just created (result == 1). Returns the post-increment count.
    pub async fn incr_with_expire(
        &self,
        key: &str,
        window_seconds: u64,
    ) -> Result<i64, InternalError> {
        match self {
            Self::Redis(store) => store.incr_with_expire(key, window_seconds).await,
            Self::InMemory(store) => store.incr_with_expire(key, window_seconds).await,
        }
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), InternalError> {
        match self {
            Self::Redis(store) => store.sadd(key, member).await,
            Self::InMemory(store) => store.sadd(key, member).await,
        }
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<(), InternalError> {
        match self {
            Self::Redis(store) => store.srem(key, member).await,
            Self::InMemory(store) => store.srem(key, member).await,
        }
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, InternalError> {
        match self {
            Self::Redis(store) => store.smembers(key).await,
            Self::InMemory(store) => store.smembers(key).await,
        }
    }

    pub async fn sismember(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool, InternalError> {
        match self {
            Self::Redis(store) => store.sismember(key, member).await,
            Self::InMemory(store) => store.sismember(key, member).await,
        }
    }

    /// Cursor-based `SCAN MATCH pattern COUNT hint`, deleting matched keys
    /// in batches of at most `batch_size` as they're discovered. Never
    /// issues `KEYS`. When `dry_run` is set, counts matches without
    /// deleting anything.
    pub async fn scan_and_delete(
        &self,
        pattern: &str,
        batch_size: usize,
        dry_run: bool,
    ) -> Result<ScanDeleteResult, InternalError> {
        match self {
            Self::Redis(store) => {
                store.scan_and_delete(pattern, batch_size, dry_run).await
            }
            Self::InMemory(store) => {
                store.scan_and_delete(pattern, batch_size, dry_run).await
            }
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, InternalError> {
        match self {
            Self::Redis(store) => store.exists(key).await,
            Self::InMemory(store) => store.exists(key).await,
        }
    }

    pub async fn ping(&self) -> bool {
        match self {
            Self::Redis(store) => store.ping().await,
            Self::InMemory(_) => true,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }
}
