//! Repository aggregation: everything a user can see, grouped by owner and
//! annotated with vintages.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::{PlatformClient, PlatformError, PlatformOrg, PlatformRepo, PlatformUser};
use crate::vintage::{VintageError, VintageReport, VintageResolver};

/// `strftime` pattern for [`Repository::display_vintage`].
pub const VINTAGE_DATE_FORMAT: &str = "%B %-d, %Y";

const REDACTED: &str = "redacted";
const REDACTED_URL: &str = "https://redacted";
const REDACTED_FULL_NAME: &str = "redacted/redacted";

/// A platform repository enriched with the user's vintage and digest choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(flatten)]
    pub repo: PlatformRepo,
    /// Earliest known commit date of the user; the creation date until resolved.
    pub vintage: DateTime<Utc>,
    pub include_in_digest: bool,
}

impl Repository {
    #[must_use]
    pub fn new(repo: PlatformRepo, include_in_digest: bool) -> Self {
        Self {
            vintage: repo.created_at,
            repo,
            include_in_digest,
        }
    }

    #[must_use]
    pub fn type_as_class_name(&self) -> &'static str {
        if self.repo.is_fork {
            "fork"
        } else if self.repo.is_private {
            "private"
        } else {
            ""
        }
    }

    #[must_use]
    pub fn type_as_octicon_name(&self) -> &'static str {
        if self.repo.is_fork {
            "repo-forked"
        } else if self.repo.is_private {
            "lock"
        } else {
            "repo"
        }
    }

    #[must_use]
    pub fn display_vintage(&self) -> String {
        self.vintage.format(VINTAGE_DATE_FORMAT).to_string()
    }

    fn redact(&mut self) {
        self.repo.html_url = REDACTED_URL.to_string();
        self.repo.full_name = REDACTED_FULL_NAME.to_string();
    }
}

/// Repositories owned by another user that the user collaborates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRepos {
    pub user: PlatformUser,
    pub repos: Vec<Repository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRepos {
    pub org: PlatformOrg,
    pub repos: Vec<Repository>,
}

/// Output of [`aggregate_repos`].
///
/// `all_repos` holds each repository once: owned repositories first, then
/// other users' in first-seen order, then organizations' in organization
/// order. The groups keep every repository the listing endpoints returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoListing {
    pub all_repos: Vec<Repository>,
    pub user_repos: Vec<Repository>,
    pub other_user_repos: Vec<UserRepos>,
    pub org_repos: Vec<OrgRepos>,
    pub oldest_vintage: DateTime<Utc>,
}

impl RepoListing {
    /// Replace names, URLs, logins and avatars with fixed placeholders.
    pub fn redact(&mut self) {
        self.all_repos.iter_mut().for_each(Repository::redact);
        self.user_repos.iter_mut().for_each(Repository::redact);
        for group in &mut self.other_user_repos {
            group.user.login = REDACTED.to_string();
            group.user.avatar_url = Some(REDACTED_URL.to_string());
            for repo in &mut group.repos {
                repo.redact();
                repo.repo.owner = group.user.clone();
            }
        }
        for group in &mut self.org_repos {
            group.org.login = REDACTED.to_string();
            group.org.avatar_url = Some(REDACTED_URL.to_string());
            group.repos.iter_mut().for_each(Repository::redact);
        }
    }

    /// Repositories eligible for a digest covering `[start, end)`.
    pub fn digest_candidates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Repository> {
        self.all_repos.iter().filter(move |r| {
            r.include_in_digest
                && r.vintage < end
                && r.repo.pushed_at.is_some_and(|pushed| pushed > start)
        })
    }
}

/// Per-user choices that shape the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestPreferences {
    pub excluded_repo_ids: HashSet<i64>,
}

impl DigestPreferences {
    #[must_use]
    pub fn includes(&self, repo_id: i64) -> bool {
        !self.excluded_repo_ids.contains(&repo_id)
    }
}

#[derive(Debug, Error)]
pub enum RepoListingError {
    #[error("failed to list accessible repositories: {0}")]
    Repos(#[source] PlatformError),

    #[error("failed to list organizations: {0}")]
    Orgs(#[source] PlatformError),

    #[error("failed to list repositories of {org}: {source}")]
    OrgRepos {
        org: String,
        #[source]
        source: PlatformError,
    },

    #[error(transparent)]
    Vintage(#[from] VintageError),
}

/// List every repository `user` can access, group it, and fill vintages.
///
/// Upstream listing failures abort the call. Vintage failures for individual
/// repositories do not; they are returned in the [`VintageReport`] and those
/// repositories keep their creation date.
#[tracing::instrument(skip_all, fields(user = %user.login))]
pub async fn aggregate_repos<C>(
    client: &C,
    resolver: &VintageResolver<C>,
    user: &PlatformUser,
    prefs: &DigestPreferences,
) -> Result<(RepoListing, VintageReport), RepoListingError>
where
    C: PlatformClient + Clone + 'static,
{
    let accessible = client
        .list_accessible_repos()
        .await
        .map_err(RepoListingError::Repos)?;

    let mut user_repos = Vec::new();
    let mut other_user_repos: Vec<UserRepos> = Vec::new();
    for repo in accessible {
        let include = prefs.includes(repo.id);
        let repo = Repository::new(repo, include);
        if repo.repo.owner.id == user.id {
            user_repos.push(repo);
            continue;
        }
        match other_user_repos
            .iter_mut()
            .find(|g| g.user.id == repo.repo.owner.id)
        {
            Some(group) => group.repos.push(repo),
            None => other_user_repos.push(UserRepos {
                user: repo.repo.owner.clone(),
                repos: vec![repo],
            }),
        }
    }

    let orgs = client.list_user_orgs().await.map_err(RepoListingError::Orgs)?;
    let mut org_repos = Vec::with_capacity(orgs.len());
    for org in orgs {
        let repos = client
            .list_org_member_repos(&org.login)
            .await
            .map_err(|source| RepoListingError::OrgRepos {
                org: org.login.clone(),
                source,
            })?;
        let repos = repos
            .into_iter()
            .map(|r| {
                let include = prefs.includes(r.id);
                Repository::new(r, include)
            })
            .collect();
        org_repos.push(OrgRepos { org, repos });
    }

    let mut seen = HashSet::new();
    let mut all_repos: Vec<Repository> = user_repos
        .iter()
        .chain(other_user_repos.iter().flat_map(|g| g.repos.iter()))
        .chain(org_repos.iter().flat_map(|g| g.repos.iter()))
        .filter(|r| seen.insert(r.repo.id))
        .cloned()
        .collect();

    tracing::debug!(
        owned = user_repos.len(),
        other_owners = other_user_repos.len(),
        orgs = org_repos.len(),
        total = all_repos.len(),
        "repositories listed"
    );

    let report = resolver.fill_vintages(user, &mut all_repos).await?;

    let vintages: HashMap<i64, DateTime<Utc>> =
        all_repos.iter().map(|r| (r.repo.id, r.vintage)).collect();
    let apply = |repo: &mut Repository| {
        if let Some(vintage) = vintages.get(&repo.repo.id) {
            repo.vintage = *vintage;
        }
    };
    user_repos.iter_mut().for_each(apply);
    other_user_repos
        .iter_mut()
        .flat_map(|g| g.repos.iter_mut())
        .for_each(apply);
    org_repos
        .iter_mut()
        .flat_map(|g| g.repos.iter_mut())
        .for_each(apply);

    let oldest_vintage = all_repos
        .iter()
        .map(|r| r.vintage)
        .min()
        .unwrap_or_else(Utc::now);

    let listing = RepoListing {
        all_repos,
        user_repos,
        other_user_repos,
        org_repos,
        oldest_vintage,
    };
    Ok((listing, report))
}
