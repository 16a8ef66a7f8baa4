//! Initial schema: vintage records and the HTTP response cache.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_repo_vintages(manager).await?;
        self.create_http_cache(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HttpCache::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RepoVintages::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_repo_vintages(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RepoVintages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RepoVintages::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepoVintages::RepoId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepoVintages::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepoVintages::Vintage)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RepoVintages::ComputedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(RepoVintages::UserId)
                            .col(RepoVintages::RepoId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_http_cache(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HttpCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HttpCache::KeyDigest)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HttpCache::Response).blob().not_null())
                    .col(
                        ColumnDef::new(HttpCache::StoredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "repo_vintages")]
enum RepoVintages {
    Table,
    UserId,
    RepoId,
    Status,
    Vintage,
    ComputedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "http_cache")]
enum HttpCache {
    Table,
    KeyDigest,
    Response,
    StoredAt,
}
