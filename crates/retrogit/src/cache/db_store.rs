use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set, sea_query::OnConflict};
use sha2::{Digest, Sha256};

use crate::entity::http_cache::{ActiveModel, Column, Entity as HttpCache};

use super::store::{CacheError, CacheStore};

/// Cache store backed by the `http_cache` table.
///
/// Keys contain authorization values, so only their SHA-256 digest is written.
#[derive(Clone)]
pub struct DbCacheStore {
    db: Arc<DatabaseConnection>,
}

impl DbCacheStore {
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

pub(crate) fn key_digest(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

#[async_trait]
impl CacheStore for DbCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let row = HttpCache::find_by_id(key_digest(key)).one(self.db.as_ref()).await?;
        Ok(row.map(|m| m.response))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let model = ActiveModel {
            key_digest: Set(key_digest(key)),
            response: Set(value),
            stored_at: Set(Utc::now()),
        };

        HttpCache::insert(model)
            .on_conflict(
                OnConflict::column(Column::KeyDigest)
                    .update_columns([Column::Response, Column::StoredAt])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}
