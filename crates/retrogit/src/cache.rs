//! Best-effort response cache for idempotent upstream reads.
//!
//! [`CachingTransport`] wraps any [`HttpTransport`](crate::http::HttpTransport)
//! and replays captured GET/HEAD responses from a [`CacheStore`]. Cache
//! failures never fail a request; they only send it to the origin.

mod capture;
mod db_store;
mod store;
mod transport;

pub use capture::{CaptureError, decode_head_response, decode_response, encode_response};
pub use db_store::DbCacheStore;
pub use store::{CacheError, CacheStore, MemoryCacheStore};
pub use transport::{CacheStats, CacheStatsSnapshot, CachingTransport, UNAUTHORIZED, cache_key};
