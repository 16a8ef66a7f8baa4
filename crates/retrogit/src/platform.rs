//! Platform-agnostic client trait and shared types.
//!
//! Everything above this layer (vintage resolution, repository aggregation,
//! digests) is written against [`PlatformClient`] so it can be driven by the
//! GitHub client in production and by in-memory fakes in tests.

mod errors;
#[cfg(test)]
pub(crate) mod fake;
mod rate_limit;
mod types;

pub use errors::{PlatformError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use types::{
    CommitQuery, ContributorStats, PlatformClient, PlatformCommit, PlatformOrg, PlatformRepo,
    PlatformUser, RateLimitInfo, StatsAvailability, WeeklyBucket,
};
