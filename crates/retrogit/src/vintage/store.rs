use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

use super::record::{VintageKey, VintageRecord};

#[derive(Debug, Error)]
pub enum VintageStoreError {
    #[error("vintage database error: {0}")]
    Database(#[from] DbErr),

    #[error("corrupt vintage record {key}: {reason}")]
    Corrupt { key: VintageKey, reason: String },

    #[error("vintage store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent home of vintage records.
///
/// `get_many` answers positionally: one entry per requested key, `None` when
/// no record exists. Only a failure of the whole lookup is an `Err`.
/// `put` replaces any existing record for the key.
#[async_trait]
pub trait VintageStore: Send + Sync {
    async fn get(&self, key: VintageKey) -> Result<Option<VintageRecord>, VintageStoreError>;

    async fn get_many(
        &self,
        keys: &[VintageKey],
    ) -> Result<Vec<Option<VintageRecord>>, VintageStoreError>;

    async fn put(&self, record: VintageRecord) -> Result<(), VintageStoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryVintageStore {
    records: RwLock<HashMap<VintageKey, VintageRecord>>,
}

impl MemoryVintageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VintageStore for MemoryVintageStore {
    async fn get(&self, key: VintageKey) -> Result<Option<VintageRecord>, VintageStoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&key).cloned())
    }

    async fn get_many(
        &self,
        keys: &[VintageKey],
    ) -> Result<Vec<Option<VintageRecord>>, VintageStoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(keys.iter().map(|k| records.get(k).cloned()).collect())
    }

    async fn put(&self, record: VintageRecord) -> Result<(), VintageStoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(record.key, record);
        Ok(())
    }
}
