//! Conversion from GitHub wire types to platform types.

use chrono::DateTime;

use crate::platform::{
    ContributorStats, PlatformCommit, PlatformOrg, PlatformRepo, PlatformUser, WeeklyBucket,
};

use super::types::{GitHubCommit, GitHubContributorStats, GitHubOrg, GitHubRepo, GitHubUser};

pub fn to_platform_user(user: GitHubUser) -> PlatformUser {
    PlatformUser {
        id: user.id,
        login: user.login,
        avatar_url: user.avatar_url,
    }
}

pub fn to_platform_org(org: GitHubOrg) -> PlatformOrg {
    PlatformOrg {
        id: org.id,
        login: org.login,
        avatar_url: org.avatar_url,
    }
}

pub fn to_platform_repo(repo: GitHubRepo) -> PlatformRepo {
    PlatformRepo {
        id: repo.id,
        owner: to_platform_user(repo.owner),
        name: repo.name,
        full_name: repo.full_name,
        html_url: repo.html_url,
        is_fork: repo.fork,
        is_private: repo.private,
        created_at: repo.created_at,
        pushed_at: repo.pushed_at,
    }
}

/// Commits without an author or committer date cannot be placed in time and
/// yield `None`.
pub fn to_platform_commit(commit: GitHubCommit) -> Option<PlatformCommit> {
    let detail = commit.commit;
    let authored_at = detail
        .author
        .as_ref()
        .and_then(|a| a.date)
        .or_else(|| detail.committer.as_ref().and_then(|c| c.date))?;
    let author_name = detail
        .author
        .and_then(|a| a.name)
        .unwrap_or_default();

    Some(PlatformCommit {
        sha: commit.sha,
        message: detail.message,
        author_name,
        authored_at,
        html_url: commit.html_url,
    })
}

/// Anonymous contributors (no linked account) are dropped.
pub fn to_contributor_stats(stats: GitHubContributorStats) -> Option<ContributorStats> {
    let author_id = stats.author?.id;
    let weeks = stats
        .weeks
        .into_iter()
        .filter_map(|week| {
            DateTime::from_timestamp(week.w, 0).map(|week_start| WeeklyBucket {
                week_start,
                commits: week.c,
            })
        })
        .collect();

    Some(ContributorStats { author_id, weeks })
}
