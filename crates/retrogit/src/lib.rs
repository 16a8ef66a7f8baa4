//! Retrogit - look back at what you were committing on GitHub.
//!
//! This library computes, for every repository a user can access, the date of
//! that user's earliest commit (its "vintage"), and builds digests of the
//! commits the user made on the same day in past years.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to create the schema on connection.
//! - `sqlite` / `postgres` - Database backends for the persistent stores.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use retrogit::{
//!     DbVintageStore, DigestPreferences, GitHubClient, PlatformClient, VintageOptions,
//!     VintageResolver, aggregate_repos, connect_and_migrate, deferred_queue,
//! };
//!
//! let db = connect_and_migrate("sqlite://retrogit.db?mode=rwc").await?;
//! let client = GitHubClient::new(&token, None)?;
//! let user = client.get_authenticated_user().await?;
//!
//! let (queue, worker) = deferred_queue();
//! let resolver = VintageResolver::new(
//!     client.clone(),
//!     Arc::new(DbVintageStore::new(Arc::new(db))),
//!     Arc::new(queue),
//!     VintageOptions::default(),
//! );
//! let (listing, report) =
//!     aggregate_repos(&client, &resolver, &user, &DigestPreferences::default()).await?;
//! ```

pub mod cache;
pub mod db;
pub mod digest;
pub mod entity;
pub mod github;
pub mod http;
pub mod platform;
pub mod repos;
pub mod retry;
pub mod vintage;

#[cfg(feature = "migrate")]
pub mod migration;

pub use cache::{CacheStore, CachingTransport, DbCacheStore, MemoryCacheStore};
pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use digest::{Digest, DigestError, DigestOptions, DigestWindow, build_digest, fetch_digest};
pub use entity::prelude::*;
pub use github::{GitHubClient, GitHubError};
pub use http::{HttpError, HttpTransport, reqwest_transport::ReqwestTransport};
pub use platform::{
    ApiRateLimiter, PlatformClient, PlatformError, PlatformRepo, PlatformUser, rate_limits,
};
pub use repos::{DigestPreferences, RepoListing, RepoListingError, Repository, aggregate_repos};
pub use vintage::{
    DbVintageStore, MemoryVintageStore, Vintage, VintageError, VintageOptions, VintageReport,
    VintageResolver, VintageStore, deferred_queue,
};
