//! In-memory [`PlatformClient`] for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::{PlatformError, Result};
use super::types::{
    CommitQuery, PlatformClient, PlatformCommit, PlatformOrg, PlatformRepo, PlatformUser,
    StatsAvailability,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetRepo,
    ListCommits,
    Stats,
}

#[derive(Default)]
struct State {
    user: Option<PlatformUser>,
    repos: Vec<PlatformRepo>,
    orgs: Vec<PlatformOrg>,
    org_repos: HashMap<String, Vec<PlatformRepo>>,
    commits: HashMap<String, Vec<PlatformCommit>>,
    stats: HashMap<String, VecDeque<StatsAvailability>>,
    failures: HashMap<(Op, String), u16>,
    delays: HashMap<String, Duration>,
    panics: HashSet<String>,
    calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<State>>,
}

pub fn user(id: i64, login: &str) -> PlatformUser {
    PlatformUser {
        id,
        login: login.to_string(),
        avatar_url: Some(format!("https://avatars.test/{id}")),
    }
}

pub fn repo(id: i64, owner: &PlatformUser, name: &str, created_at: DateTime<Utc>) -> PlatformRepo {
    PlatformRepo {
        id,
        owner: owner.clone(),
        name: name.to_string(),
        full_name: format!("{}/{}", owner.login, name),
        html_url: format!("https://github.test/{}/{}", owner.login, name),
        is_fork: false,
        is_private: false,
        created_at,
        pushed_at: Some(created_at),
    }
}

pub fn commit(sha: &str, authored_at: DateTime<Utc>) -> PlatformCommit {
    PlatformCommit {
        sha: sha.to_string(),
        message: format!("commit {sha}"),
        author_name: "Octo Cat".to_string(),
        authored_at,
        html_url: format!("https://github.test/commit/{sha}"),
    }
}

fn error_for(status: u16, resource: &str) -> PlatformError {
    match status {
        401 => PlatformError::AuthRequired,
        403 => PlatformError::forbidden(resource),
        404 => PlatformError::not_found(resource),
        409 => PlatformError::conflict(resource),
        429 => PlatformError::RateLimited {
            reset_at: Utc::now(),
        },
        0 => PlatformError::network(format!("connection reset: {resource}")),
        _ => PlatformError::api(status, resource),
    }
}

impl FakePlatform {
    pub fn new(user: PlatformUser) -> Self {
        let fake = Self::default();
        fake.lock().user = Some(user);
        fake
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_repo(self, repo: PlatformRepo) -> Self {
        self.lock().repos.push(repo);
        self
    }

    pub fn with_org(self, org: PlatformOrg, repos: Vec<PlatformRepo>) -> Self {
        {
            let mut state = self.lock();
            state.org_repos.insert(org.login.clone(), repos);
            state.orgs.push(org);
        }
        self
    }

    /// Organization whose repository listing fails with not-found.
    pub fn with_unlisted_org(self, org: PlatformOrg) -> Self {
        self.lock().orgs.push(org);
        self
    }

    pub fn with_commits(self, full_name: &str, commits: Vec<PlatformCommit>) -> Self {
        self.lock().commits.insert(full_name.to_string(), commits);
        self
    }

    /// Responses served in order; the last one repeats.
    pub fn with_stats(self, full_name: &str, responses: Vec<StatsAvailability>) -> Self {
        self.lock()
            .stats
            .insert(full_name.to_string(), responses.into());
        self
    }

    /// Fail `op` on `full_name` with `status`; 0 means a network error.
    pub fn failing(self, op: Op, full_name: &str, status: u16) -> Self {
        self.lock().failures.insert((op, full_name.to_string()), status);
        self
    }

    pub fn with_delay(self, full_name: &str, delay: Duration) -> Self {
        self.lock().delays.insert(full_name.to_string(), delay);
        self
    }

    pub fn panicking_on_commits(self, full_name: &str) -> Self {
        self.lock().panics.insert(full_name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, op: Op, call: String, full_name: &str) -> Result<Option<Duration>> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(status) = state.failures.get(&(op, full_name.to_string())) {
            return Err(error_for(*status, full_name));
        }
        Ok(state.delays.get(full_name).copied())
    }

    fn find_repo(&self, full_name: &str) -> Option<PlatformRepo> {
        let state = self.lock();
        state
            .repos
            .iter()
            .chain(state.org_repos.values().flatten())
            .find(|r| r.full_name == full_name)
            .cloned()
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn get_authenticated_user(&self) -> Result<PlatformUser> {
        self.lock().calls.push("user".to_string());
        self.lock().user.clone().ok_or(PlatformError::AuthRequired)
    }

    async fn list_accessible_repos(&self) -> Result<Vec<PlatformRepo>> {
        let mut state = self.lock();
        state.calls.push("repos".to_string());
        Ok(state.repos.clone())
    }

    async fn list_user_orgs(&self) -> Result<Vec<PlatformOrg>> {
        let mut state = self.lock();
        state.calls.push("orgs".to_string());
        Ok(state.orgs.clone())
    }

    async fn list_org_member_repos(&self, org: &str) -> Result<Vec<PlatformRepo>> {
        let mut state = self.lock();
        state.calls.push(format!("org_repos {org}"));
        state
            .org_repos
            .get(org)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(org))
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<PlatformRepo> {
        let full_name = format!("{owner}/{name}");
        self.record(Op::GetRepo, format!("get_repo {full_name}"), &full_name)?;
        self.find_repo(&full_name)
            .ok_or_else(|| PlatformError::not_found(full_name))
    }

    async fn list_commits(
        &self,
        owner: &str,
        name: &str,
        query: &CommitQuery,
    ) -> Result<Vec<PlatformCommit>> {
        let full_name = format!("{owner}/{name}");
        let delay = self.record(Op::ListCommits, format!("list_commits {full_name}"), &full_name)?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.lock().panics.contains(&full_name) {
            panic!("simulated worker crash for {full_name}");
        }

        let mut matching: Vec<PlatformCommit> = self
            .lock()
            .commits
            .get(&full_name)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|c| query.since.is_none_or(|since| c.authored_at >= since))
            .filter(|c| query.until.is_none_or(|until| c.authored_at <= until))
            .collect();
        if let Some(max_pages) = query.max_pages {
            matching.truncate((max_pages * query.per_page) as usize);
        }
        Ok(matching)
    }

    async fn contributor_stats(&self, owner: &str, name: &str) -> Result<StatsAvailability> {
        let full_name = format!("{owner}/{name}");
        self.record(Op::Stats, format!("stats {full_name}"), &full_name)?;
        let mut state = self.lock();
        let queue = state.stats.entry(full_name).or_default();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(next.unwrap_or(StatsAvailability::Ready(Vec::new())))
    }
}
