//! Commit digests: what a user committed across all their repositories during
//! one window of time, typically the same day a year ago.

mod fetch;
mod window;

pub use fetch::fetch_digest;
pub use window::DigestWindow;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::platform::{PlatformClient, PlatformCommit, PlatformError, PlatformUser};
use crate::repos::{RepoListing, Repository};

pub const DEFAULT_LOOKBACK_YEARS: u32 = 1;
pub const DEFAULT_WINDOW_DAYS: u32 = 1;
pub const DEFAULT_DIGEST_CONCURRENCY: usize = 16;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("repository {repo_id} ({full_name:?}) has no owner or name")]
    InvalidRepository { repo_id: i64, full_name: String },

    #[error("failed to list commits for {repo}: {source}")]
    Upstream {
        repo: String,
        #[source]
        source: PlatformError,
    },

    #[error("digest worker exited without reporting ({received} of {expected} results)")]
    WorkerLost { expected: usize, received: usize },

    #[error("no digest window {years} year(s) before {now}")]
    InvalidWindow { now: DateTime<Utc>, years: u32 },
}

#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub lookback_years: u32,
    pub window_days: u32,
    /// Repositories fetched at once; `0` fetches all of them at once.
    pub concurrency: usize,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            window_days: DEFAULT_WINDOW_DAYS,
            concurrency: DEFAULT_DIGEST_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoDigest {
    pub repo: Repository,
    pub commits: Vec<PlatformCommit>,
}

/// A finished digest. Repository digests are sorted by full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub user: PlatformUser,
    pub window: DigestWindow,
    pub repo_digests: Vec<RepoDigest>,
}

impl Digest {
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.repo_digests.iter().map(|r| r.commits.len()).sum()
    }

    /// Repository digests that have at least one commit.
    pub fn active(&self) -> impl Iterator<Item = &RepoDigest> {
        self.repo_digests.iter().filter(|r| !r.commits.is_empty())
    }
}

/// Build the digest for the window `options.lookback_years` before `now`.
///
/// Only repositories that could hold commits in the window are queried:
/// included in digests, a vintage before the window ends, and a push after it
/// starts.
pub async fn build_digest<C>(
    client: &C,
    user: &PlatformUser,
    listing: &RepoListing,
    options: &DigestOptions,
    now: DateTime<Utc>,
) -> Result<Digest, DigestError>
where
    C: PlatformClient + Clone + 'static,
{
    let window = DigestWindow::years_ago(now, options.lookback_years, options.window_days)
        .ok_or(DigestError::InvalidWindow {
            now,
            years: options.lookback_years,
        })?;
    let candidates: Vec<Repository> = listing
        .digest_candidates(window.start, window.end)
        .cloned()
        .collect();

    tracing::info!(
        start = %window.start,
        end = %window.end,
        candidates = candidates.len(),
        total = listing.all_repos.len(),
        "building digest"
    );
    fetch_digest(client, user, window, candidates, options).await
}
