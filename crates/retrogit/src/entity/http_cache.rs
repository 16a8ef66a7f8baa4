//! HttpCache entity: captured upstream responses keyed by a digest of the
//! request identity.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "http_cache")]
pub struct Model {
    /// SHA-256 hex digest of the transport cache key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub key_digest: String,

    #[sea_orm(column_type = "Blob")]
    pub response: Vec<u8>,

    pub stored_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
