use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::Result;

/// Rate limit state reported by response headers.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub limit: usize,
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

/// A user account, either the authenticated user or a repository owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUser {
    pub id: i64,
    pub login: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOrg {
    pub id: i64,
    pub login: String,
    pub avatar_url: Option<String>,
}

/// A repository as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRepo {
    pub id: i64,
    pub owner: PlatformUser,
    pub name: String,
    /// `owner/name`; used as the digest sort key.
    pub full_name: String,
    pub html_url: String,
    pub is_fork: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    /// Absent for repositories that have never received a push.
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCommit {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub authored_at: DateTime<Utc>,
    pub html_url: String,
}

impl PlatformCommit {
    /// First line of the commit message.
    #[must_use]
    pub fn title(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Filters for listing commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    /// Login the commits must be authored by.
    pub author: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub per_page: u32,
    /// Stop after this many pages. `None` follows pagination to the end.
    pub max_pages: Option<u32>,
}

impl Default for CommitQuery {
    fn default() -> Self {
        Self {
            author: None,
            since: None,
            until: None,
            per_page: 100,
            max_pages: None,
        }
    }
}

impl CommitQuery {
    /// A single commit by `author` dated at or before `until`.
    #[must_use]
    pub fn probe(author: &str, until: DateTime<Utc>) -> Self {
        Self {
            author: Some(author.to_string()),
            until: Some(until),
            per_page: 1,
            max_pages: Some(1),
            ..Self::default()
        }
    }

    /// Every commit by `author` in `[since, until)`.
    #[must_use]
    pub fn window(author: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            author: Some(author.to_string()),
            since: Some(since),
            until: Some(until),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyBucket {
    pub week_start: DateTime<Utc>,
    pub commits: u32,
}

/// Weekly commit counts for one contributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorStats {
    pub author_id: i64,
    pub weeks: Vec<WeeklyBucket>,
}

impl ContributorStats {
    /// Start of the earliest reported week, whatever its commit count.
    #[must_use]
    pub fn first_week(&self) -> Option<DateTime<Utc>> {
        self.weeks.iter().map(|w| w.week_start).min()
    }
}

/// Contributor statistics are computed lazily upstream and may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsAvailability {
    Ready(Vec<ContributorStats>),
    /// Upstream accepted the request and is computing; ask again later.
    Computing,
}

/// Read operations against a source-hosting platform.
///
/// Implementations handle pagination internally and map transport and status
/// failures onto [`PlatformError`](super::PlatformError).
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn get_authenticated_user(&self) -> Result<PlatformUser>;

    /// Every repository the credential can see: owned, collaborator, and
    /// organization-member repositories.
    async fn list_accessible_repos(&self) -> Result<Vec<PlatformRepo>>;

    async fn list_user_orgs(&self) -> Result<Vec<PlatformOrg>>;

    /// Repositories of `org` visible to the authenticated member.
    async fn list_org_member_repos(&self, org: &str) -> Result<Vec<PlatformRepo>>;

    async fn get_repo(&self, owner: &str, name: &str) -> Result<PlatformRepo>;

    async fn list_commits(
        &self,
        owner: &str,
        name: &str,
        query: &CommitQuery,
    ) -> Result<Vec<PlatformCommit>>;

    async fn contributor_stats(&self, owner: &str, name: &str) -> Result<StatsAvailability>;
}
