//! GitHub REST wire types.
//!
//! Only the fields retrogit reads are declared; serde ignores the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubOrg {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: GitHubUser,
    pub html_url: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub private: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Name and date of a git author or committer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubGitActor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommitDetail {
    pub message: String,
    #[serde(default)]
    pub author: Option<GitHubGitActor>,
    #[serde(default)]
    pub committer: Option<GitHubGitActor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub html_url: String,
    pub commit: GitHubCommitDetail,
}

/// One week of `/stats/contributors` output. `w` is a Unix timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubWeek {
    pub w: i64,
    #[serde(default)]
    pub a: u32,
    #[serde(default)]
    pub d: u32,
    #[serde(default)]
    pub c: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubContributorStats {
    /// Null for contributors without a GitHub account.
    #[serde(default)]
    pub author: Option<GitHubUser>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub weeks: Vec<GitHubWeek>,
}
