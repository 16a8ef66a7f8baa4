//! RepoVintage entity: the earliest-commit date of one user in one repository.
//!
//! A row is written exactly once per (user, repository) pair and never
//! recomputed. `status` distinguishes a resolved date from a repository that
//! could not be read at all.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum VintageStatus {
    /// `vintage` holds the resolved date.
    #[sea_orm(string_value = "final")]
    Final,
    /// Upstream refused access; `vintage` is null.
    #[sea_orm(string_value = "unresolvable")]
    Unresolvable,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repo_vintages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,

    #[sea_orm(primary_key, auto_increment = false)]
    pub repo_id: i64,

    pub status: VintageStatus,

    pub vintage: Option<DateTimeUtc>,

    pub computed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
