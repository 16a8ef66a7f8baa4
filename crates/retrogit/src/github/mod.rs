//! GitHub REST implementation of [`PlatformClient`](crate::platform::PlatformClient).
//!
//! - [`error`] - error types and status classification
//! - [`types`] - wire types for the endpoints retrogit reads
//! - [`client`] - the client, pagination, and retry wiring
//! - [`convert`] - wire-to-platform conversion

mod client;
mod convert;
mod error;
mod pagination;
mod types;

pub use client::{GITHUB_API_URL, GitHubClient};
pub use convert::{to_platform_commit, to_platform_repo};
pub use error::{GitHubError, is_rate_limit_error};
pub use pagination::{LinkPagination, parse_link_header};
pub use types::{GitHubCommit, GitHubContributorStats, GitHubOrg, GitHubRepo, GitHubUser};
