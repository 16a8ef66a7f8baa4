//! SeaORM entity definitions for the retrogit schema.

pub mod http_cache;
pub mod prelude;
pub mod repo_vintage;
