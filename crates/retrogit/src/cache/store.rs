use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(#[from] DbErr),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Key/value contract behind the caching transport.
///
/// `get` distinguishes a miss (`Ok(None)`) from a failed lookup (`Err`).
/// Entries may disappear at any time.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;
}

/// In-process store with first-in first-out eviction once `capacity` is reached.
pub struct MemoryCacheStore {
    capacity: usize,
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, Vec<u8>>,
    order: VecDeque<String>,
}

impl MemoryCacheStore {
    pub const DEFAULT_CAPACITY: usize = 4096;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.lock().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let mut inner = self.lock();
        if inner.entries.insert(key.to_string(), value).is_none() {
            inner.order.push_back(key.to_string());
        }
        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_hit() {
        let store = MemoryCacheStore::default();
        assert_eq!(store.get("k").await.expect("get"), None);

        store.set("k", b"v".to_vec()).await.expect("set");
        assert_eq!(store.get("k").await.expect("get"), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn overwrite_keeps_single_entry() {
        let store = MemoryCacheStore::new(2);
        store.set("k", b"1".to_vec()).await.expect("set");
        store.set("k", b"2".to_vec()).await.expect("set");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").await.expect("get"), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn oldest_entry_is_evicted_past_capacity() {
        let store = MemoryCacheStore::new(2);
        for key in ["a", "b", "c"] {
            store.set(key, key.as_bytes().to_vec()).await.expect("set");
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").await.expect("get"), None);
        assert!(store.get("c").await.expect("get").is_some());
    }
}
