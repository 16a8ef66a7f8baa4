//! GitHub REST client over the [`HttpTransport`] boundary.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use url::Url;

use super::convert::{
    to_contributor_stats, to_platform_commit, to_platform_org, to_platform_repo,
    to_platform_user,
};
use super::error::{GitHubError, is_rate_limit_error};
use super::pagination::parse_link_header;
use super::types::{GitHubCommit, GitHubContributorStats, GitHubOrg, GitHubRepo, GitHubUser};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpHeaders, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{
    self, ApiRateLimiter, CommitQuery, PlatformClient, PlatformCommit, PlatformOrg, PlatformRepo,
    PlatformUser, StatsAvailability,
};
use crate::retry::{RetryConfig, with_retry};

pub const GITHUB_API_URL: &str = "https://api.github.com";

const PAGE_SIZE: u32 = 100;
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("retrogit/", env!("CARGO_PKG_VERSION"));

/// GitHub API client.
///
/// Clones share the transport and the rate limiter.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: Option<String>,
    rate_limiter: Option<ApiRateLimiter>,
    retry: RetryConfig,
}

impl GitHubClient {
    /// A client for api.github.com using the reqwest transport.
    pub fn new(token: &str, rate_limiter: Option<ApiRateLimiter>) -> Result<Self, GitHubError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| GitHubError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(
            GITHUB_API_URL,
            Some(token),
            rate_limiter,
            Arc::new(transport),
        ))
    }

    /// A client over an arbitrary transport, e.g. a caching or mock one.
    ///
    /// `base_url` is the API root; GitHub Enterprise uses `https://host/api/v3`.
    pub fn new_with_transport(
        base_url: &str,
        token: Option<&str>,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
            rate_limiter,
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> HttpHeaders {
        let mut headers = vec![
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
        ];
        if let Some(ref token) = self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, GitHubError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// One round trip. Non-2xx statuses become errors.
    async fn send_once(&self, url: &str) -> Result<HttpResponse, GitHubError> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let response = self
            .transport
            .send(HttpRequest::get(url, self.headers()))
            .await?;

        if !response.is_success() {
            let resource = Url::parse(url)
                .map(|u| u.path().to_string())
                .unwrap_or_else(|_| url.to_string());
            return Err(GitHubError::from_status(
                response.status,
                &response.headers,
                &resource,
                &response.body,
            ));
        }
        Ok(response)
    }

    /// [`send_once`](Self::send_once) with backoff on rate limits.
    async fn send(&self, url: &str) -> Result<HttpResponse, GitHubError> {
        with_retry(
            &self.retry,
            || self.send_once(url),
            is_rate_limit_error,
            url,
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, GitHubError> {
        let response = self.send(url.as_str()).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Follow `rel="next"` links from `first`, stopping after `max_pages`.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        first: Url,
        max_pages: Option<u32>,
    ) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        let mut next = Some(first.to_string());
        let mut fetched = 0u32;

        while let Some(url) = next.take() {
            let response = self.send(&url).await?;
            let mut page: Vec<T> = serde_json::from_slice(&response.body)?;
            items.append(&mut page);
            fetched += 1;

            if max_pages.is_some_and(|max| fetched >= max) {
                break;
            }
            next = response
                .header("link")
                .and_then(|link| parse_link_header(link).next_url);
        }

        tracing::trace!(url = %first, pages = fetched, items = items.len(), "paginated fetch done");
        Ok(items)
    }

    async fn list_repos_at(&self, url: Url) -> Result<Vec<PlatformRepo>, GitHubError> {
        let repos: Vec<GitHubRepo> = self.get_all_pages(url, None).await?;
        Ok(repos.into_iter().map(to_platform_repo).collect())
    }
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn commit_query_params(query: &CommitQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(ref author) = query.author {
        params.push(("author", author.clone()));
    }
    if let Some(since) = query.since {
        params.push(("since", timestamp(since)));
    }
    if let Some(until) = query.until {
        params.push(("until", timestamp(until)));
    }
    params.push(("per_page", query.per_page.to_string()));
    params
}

#[async_trait]
impl PlatformClient for GitHubClient {
    async fn get_authenticated_user(&self) -> platform::Result<PlatformUser> {
        let user: GitHubUser = self.get_json(&self.url("/user", &[])?).await?;
        Ok(to_platform_user(user))
    }

    async fn list_accessible_repos(&self) -> platform::Result<Vec<PlatformRepo>> {
        let url = self.url("/user/repos", &[("per_page", PAGE_SIZE.to_string())])?;
        Ok(self.list_repos_at(url).await?)
    }

    async fn list_user_orgs(&self) -> platform::Result<Vec<PlatformOrg>> {
        let url = self.url("/user/orgs", &[("per_page", PAGE_SIZE.to_string())])?;
        let orgs: Vec<GitHubOrg> = self.get_all_pages(url, None).await?;
        Ok(orgs.into_iter().map(to_platform_org).collect())
    }

    async fn list_org_member_repos(&self, org: &str) -> platform::Result<Vec<PlatformRepo>> {
        let url = self.url(
            &format!("/orgs/{org}/repos"),
            &[
                ("type", "member".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ],
        )?;
        Ok(self.list_repos_at(url).await?)
    }

    async fn get_repo(&self, owner: &str, name: &str) -> platform::Result<PlatformRepo> {
        let repo: GitHubRepo = self
            .get_json(&self.url(&format!("/repos/{owner}/{name}"), &[])?)
            .await?;
        Ok(to_platform_repo(repo))
    }

    async fn list_commits(
        &self,
        owner: &str,
        name: &str,
        query: &CommitQuery,
    ) -> platform::Result<Vec<PlatformCommit>> {
        let url = self.url(
            &format!("/repos/{owner}/{name}/commits"),
            &commit_query_params(query),
        )?;
        let commits: Vec<GitHubCommit> = self.get_all_pages(url, query.max_pages).await?;

        Ok(commits
            .into_iter()
            .filter_map(|c| {
                let sha = c.sha.clone();
                let converted = to_platform_commit(c);
                if converted.is_none() {
                    tracing::warn!(repo = %format!("{owner}/{name}"), sha = %sha, "skipping undated commit");
                }
                converted
            })
            .collect())
    }

    async fn contributor_stats(
        &self,
        owner: &str,
        name: &str,
    ) -> platform::Result<StatsAvailability> {
        let url = self.url(&format!("/repos/{owner}/{name}/stats/contributors"), &[])?;
        let response = self.send(url.as_str()).await.map_err(platform::PlatformError::from)?;

        match response.status {
            202 => Ok(StatsAvailability::Computing),
            // Empty repositories have no statistics at all.
            204 => Ok(StatsAvailability::Ready(Vec::new())),
            _ if response.body.is_empty() => Ok(StatsAvailability::Ready(Vec::new())),
            _ => {
                let stats: Vec<GitHubContributorStats> = serde_json::from_slice(&response.body)
                    .map_err(|e| platform::PlatformError::from(GitHubError::Json(e)))?;
                Ok(StatsAvailability::Ready(
                    stats.into_iter().filter_map(to_contributor_stats).collect(),
                ))
            }
        }
    }
}
