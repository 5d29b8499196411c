//! Rendered-view cache
//!
//! Public listing endpoints keep their rendered JSON here keyed by request
//! path. Mutations invalidate every path whose content they change, so the
//! next read renders fresh data.

use async_trait::async_trait;
use common::cache::RedisPool;
use common::error::CacheResult;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait ViewCache: Send + Sync {
    async fn get(&self, path: &str) -> CacheResult<Option<String>>;
    async fn put(&self, path: &str, body: &str) -> CacheResult<()>;
    async fn invalidate(&self, path: &str) -> CacheResult<()>;
}

/// Redis-backed view cache; entries expire after `ttl_seconds` even if
/// nothing invalidates them.
#[derive(Clone)]
pub struct RedisViewCache {
    redis: RedisPool,
    ttl_seconds: u64,
}

impl RedisViewCache {
    pub fn new(redis: RedisPool, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(path: &str) -> String {
        format!("view:{path}")
    }
}

#[async_trait]
impl ViewCache for RedisViewCache {
    async fn get(&self, path: &str) -> CacheResult<Option<String>> {
        self.redis.get(&Self::key(path)).await
    }

    async fn put(&self, path: &str, body: &str) -> CacheResult<()> {
        self.redis
            .set(&Self::key(path), body, Some(self.ttl_seconds))
            .await
    }

    async fn invalidate(&self, path: &str) -> CacheResult<()> {
        debug!(path, "Invalidating cached view");
        self.redis.delete(&Self::key(path)).await
    }
}

#[derive(Default)]
struct MemoryViews {
    entries: HashMap<String, String>,
    invalidated: Vec<String>,
}

/// Process-local view cache that also remembers every invalidated path.
#[derive(Default)]
pub struct MemoryViewCache {
    inner: Mutex<MemoryViews>,
}

impl MemoryViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths invalidated so far, in call order.
    pub fn invalidated(&self) -> Vec<String> {
        self.lock().invalidated.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryViews> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ViewCache for MemoryViewCache {
    async fn get(&self, path: &str) -> CacheResult<Option<String>> {
        Ok(self.lock().entries.get(path).cloned())
    }

    async fn put(&self, path: &str, body: &str) -> CacheResult<()> {
        self.lock()
            .entries
            .insert(path.to_string(), body.to_string());
        Ok(())
    }

    async fn invalidate(&self, path: &str) -> CacheResult<()> {
        let mut views = self.lock();
        views.entries.remove(path);
        views.invalidated.push(path.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidate_drops_entry_and_records_path() {
        let cache = MemoryViewCache::new();
        cache.put("/programs", "[]").await.unwrap();
        assert_eq!(cache.get("/programs").await.unwrap().as_deref(), Some("[]"));

        cache.invalidate("/programs").await.unwrap();
        assert_eq!(cache.get("/programs").await.unwrap(), None);
        assert_eq!(cache.invalidated(), vec!["/programs".to_string()]);
    }

    #[test]
    fn test_redis_keys_are_namespaced() {
        assert_eq!(RedisViewCache::key("/blog/hello"), "view:/blog/hello");
    }
}
