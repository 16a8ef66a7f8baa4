use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};

use crate::entity::repo_vintage::{ActiveModel, Column, Entity as RepoVintage, Model, VintageStatus};

use super::record::{Vintage, VintageKey, VintageRecord};
use super::store::{VintageStore, VintageStoreError};

/// Repository ids per `IN (...)` clause. Keeps SQLite under its bound
/// parameter limit.
const LOOKUP_CHUNK: usize = 500;

/// Vintage store backed by the `repo_vintages` table.
#[derive(Clone)]
pub struct DbVintageStore {
    db: Arc<DatabaseConnection>,
}

impl DbVintageStore {
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_record(model: Model) -> Result<VintageRecord, VintageStoreError> {
    let key = VintageKey::new(model.user_id, model.repo_id);
    let vintage = match (model.status, model.vintage) {
        (VintageStatus::Final, Some(date)) => Vintage::Final(date),
        (VintageStatus::Final, None) => {
            return Err(VintageStoreError::Corrupt {
                key,
                reason: "final record without a vintage date".to_string(),
            });
        }
        (VintageStatus::Unresolvable, _) => Vintage::Unresolvable,
    };
    Ok(VintageRecord {
        key,
        vintage,
        computed_at: model.computed_at,
    })
}

fn to_active_model(record: VintageRecord) -> ActiveModel {
    let (status, vintage) = match record.vintage {
        Vintage::Final(date) => (VintageStatus::Final, Some(date)),
        Vintage::Unresolvable => (VintageStatus::Unresolvable, None),
    };
    ActiveModel {
        user_id: Set(record.key.user_id),
        repo_id: Set(record.key.repo_id),
        status: Set(status),
        vintage: Set(vintage),
        computed_at: Set(record.computed_at),
    }
}

#[async_trait]
impl VintageStore for DbVintageStore {
    async fn get(&self, key: VintageKey) -> Result<Option<VintageRecord>, VintageStoreError> {
        RepoVintage::find_by_id((key.user_id, key.repo_id))
            .one(self.db.as_ref())
            .await?
            .map(to_record)
            .transpose()
    }

    async fn get_many(
        &self,
        keys: &[VintageKey],
    ) -> Result<Vec<Option<VintageRecord>>, VintageStoreError> {
        let mut by_user: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for key in keys {
            by_user.entry(key.user_id).or_default().push(key.repo_id);
        }

        let mut found: HashMap<VintageKey, VintageRecord> = HashMap::with_capacity(keys.len());
        for (user_id, repo_ids) in by_user {
            for chunk in repo_ids.chunks(LOOKUP_CHUNK) {
                let rows = RepoVintage::find()
                    .filter(Column::UserId.eq(user_id))
                    .filter(Column::RepoId.is_in(chunk.iter().copied()))
                    .all(self.db.as_ref())
                    .await?;
                for row in rows {
                    let record = to_record(row)?;
                    found.insert(record.key, record);
                }
            }
        }

        Ok(keys.iter().map(|k| found.get(k).cloned()).collect())
    }

    async fn put(&self, record: VintageRecord) -> Result<(), VintageStoreError> {
        RepoVintage::insert(to_active_model(record))
            .on_conflict(
                OnConflict::columns([Column::UserId, Column::RepoId])
                    .update_columns([Column::Status, Column::Vintage, Column::ComputedAt])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    fn row(repo_id: i64, status: VintageStatus, vintage: Option<chrono::DateTime<Utc>>) -> Model {
        Model {
            user_id: 1,
            repo_id,
            status,
            vintage,
            computed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn get_many_maps_rows_back_to_requested_order() {
        let date = Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![
                row(30, VintageStatus::Unresolvable, None),
                row(10, VintageStatus::Final, Some(date)),
            ]])
            .into_connection();
        let store = DbVintageStore::new(Arc::new(db));

        let found = store
            .get_many(&[
                VintageKey::new(1, 10),
                VintageKey::new(1, 20),
                VintageKey::new(1, 30),
            ])
            .await
            .expect("get_many");

        assert_eq!(found[0].as_ref().map(|r| r.vintage), Some(Vintage::Final(date)));
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().map(|r| r.vintage), Some(Vintage::Unresolvable));
    }

    #[tokio::test]
    async fn final_row_without_date_is_corrupt() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![row(10, VintageStatus::Final, None)]])
            .into_connection();
        let store = DbVintageStore::new(Arc::new(db));

        let err = store
            .get(VintageKey::new(1, 10))
            .await
            .expect_err("corrupt");
        assert!(matches!(err, VintageStoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn lookup_failure_is_a_store_error() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([DbErr::Custom("database is locked".to_string())])
            .into_connection();
        let store = DbVintageStore::new(Arc::new(db));

        let err = store
            .get_many(&[VintageKey::new(1, 10)])
            .await
            .expect_err("db error");
        assert!(matches!(err, VintageStoreError::Database(_)));
    }

    #[tokio::test]
    async fn empty_lookup_issues_no_queries() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let store = DbVintageStore::new(Arc::new(db));
        assert!(store.get_many(&[]).await.expect("empty").is_empty());
    }
}
