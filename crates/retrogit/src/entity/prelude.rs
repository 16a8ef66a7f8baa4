//! Common re-exports for convenient entity usage.

pub use super::http_cache::{
    ActiveModel as HttpCacheActiveModel, Column as HttpCacheColumn, Entity as HttpCache,
    Model as HttpCacheModel,
};
pub use super::repo_vintage::{
    ActiveModel as RepoVintageActiveModel, Column as RepoVintageColumn, Entity as RepoVintage,
    Model as RepoVintageModel, VintageStatus,
};
