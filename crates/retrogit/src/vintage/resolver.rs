use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Semaphore;

use super::record::{Vintage, VintageKey, VintageRecord, VintageResolution};
use super::scheduler::{ComputeVintageTask, ScheduleError, TaskHandler, TaskScheduler};
use super::store::{VintageStore, VintageStoreError};
use crate::platform::{CommitQuery, PlatformClient, PlatformError, PlatformUser, StatsAvailability};
use crate::repos::Repository;

/// Delay before re-asking for contributor statistics that were still computing.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_VINTAGE_CONCURRENCY: usize = 8;

/// Step of the vintage computation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VintageStage {
    Metadata,
    CommitProbe,
    ContributorStats,
}

impl std::fmt::Display for VintageStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            VintageStage::Metadata => "repository lookup",
            VintageStage::CommitProbe => "commit probe",
            VintageStage::ContributorStats => "contributor stats",
        })
    }
}

#[derive(Debug, Error)]
pub enum VintageError {
    #[error(transparent)]
    Store(#[from] VintageStoreError),

    #[error("{stage} failed for {repo}: {source}")]
    Upstream {
        repo: String,
        stage: VintageStage,
        #[source]
        source: PlatformError,
    },

    #[error("could not schedule vintage retry for {repo}: {source}")]
    Schedule {
        repo: String,
        #[source]
        source: ScheduleError,
    },

    #[error("vintage computation for {repo} ended abnormally: {message}")]
    Task { repo: String, message: String },
}

impl VintageError {
    fn upstream(repo: &str, stage: VintageStage, source: PlatformError) -> Self {
        Self::Upstream {
            repo: repo.to_string(),
            stage,
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VintageOptions {
    pub retry_delay: Duration,
    /// Repositories computed at once during a bulk fill.
    pub concurrency: usize,
}

impl Default for VintageOptions {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            concurrency: DEFAULT_VINTAGE_CONCURRENCY,
        }
    }
}

#[derive(Debug)]
pub struct VintageFailure {
    pub repo: String,
    pub error: VintageError,
}

/// Outcome of one [`VintageResolver::fill_vintages`] call.
#[derive(Debug, Default)]
pub struct VintageReport {
    /// Final vintages read from the store.
    pub stored: usize,
    /// Final vintages computed during this call.
    pub computed: usize,
    pub unresolvable: usize,
    /// Full names of repositories awaiting a scheduled retry.
    pub pending: Vec<String>,
    pub failures: Vec<VintageFailure>,
}

impl VintageReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.failures.is_empty()
    }
}

/// Computes and persists the earliest commit date of a user per repository.
///
/// Records are final once written: a stored [`Vintage`] is returned without
/// any upstream call. When contributor statistics are still being computed
/// upstream, the resolver schedules a retry and reports
/// [`VintageResolution::Pending`] instead of waiting.
pub struct VintageResolver<C> {
    client: C,
    store: Arc<dyn VintageStore>,
    scheduler: Arc<dyn TaskScheduler>,
    options: VintageOptions,
}

impl<C: Clone> Clone for VintageResolver<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            store: Arc::clone(&self.store),
            scheduler: Arc::clone(&self.scheduler),
            options: self.options.clone(),
        }
    }
}

impl<C: PlatformClient + Clone + 'static> VintageResolver<C> {
    pub fn new(
        client: C,
        store: Arc<dyn VintageStore>,
        scheduler: Arc<dyn TaskScheduler>,
        options: VintageOptions,
    ) -> Self {
        Self {
            client,
            store,
            scheduler,
            options,
        }
    }

    /// Resolve every repository in `repos` for `user`, updating `vintage` in
    /// place for each final answer.
    ///
    /// Existing records are read in a single batch; a failure of that read
    /// fails the whole call. Missing records are computed concurrently and
    /// their failures are collected per repository in the report.
    #[tracing::instrument(skip_all, fields(user = %user.login, repos = repos.len()))]
    pub async fn fill_vintages(
        &self,
        user: &PlatformUser,
        repos: &mut [Repository],
    ) -> Result<VintageReport, VintageError> {
        let mut report = VintageReport::default();
        if repos.is_empty() {
            return Ok(report);
        }

        let keys: Vec<VintageKey> = repos
            .iter()
            .map(|r| VintageKey::new(user.id, r.repo.id))
            .collect();
        let existing = self.store.get_many(&keys).await?;

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut handles = Vec::new();

        for (index, (repo, record)) in repos.iter_mut().zip(existing).enumerate() {
            match record.map(|r| r.vintage) {
                Some(Vintage::Final(date)) => {
                    repo.vintage = date;
                    report.stored += 1;
                }
                Some(Vintage::Unresolvable) => report.unresolvable += 1,
                None => {
                    let task = ComputeVintageTask {
                        user_id: user.id,
                        user_login: user.login.clone(),
                        repo_id: repo.repo.id,
                        owner_login: repo.repo.owner.login.clone(),
                        repo_name: repo.repo.name.clone(),
                    };
                    let this = self.clone();
                    let semaphore = Arc::clone(&semaphore);

                    let handle = tokio::spawn(async move {
                        let _permit =
                            semaphore
                                .acquire_owned()
                                .await
                                .map_err(|_| VintageError::Task {
                                    repo: task.full_name(),
                                    message: "semaphore closed unexpectedly".to_string(),
                                })?;
                        this.compute_vintage(&task).await
                    });
                    handles.push((index, handle));
                }
            }
        }

        for (index, handle) in handles {
            let repo = &mut repos[index];
            let full_name = repo.repo.full_name.clone();
            let outcome = handle.await.unwrap_or_else(|e| {
                Err(VintageError::Task {
                    repo: full_name.clone(),
                    message: e.to_string(),
                })
            });

            match outcome {
                Ok(VintageResolution::Final(date)) => {
                    repo.vintage = date;
                    report.computed += 1;
                }
                Ok(VintageResolution::Unresolvable) => report.unresolvable += 1,
                Ok(VintageResolution::Pending) => report.pending.push(full_name),
                Err(error) => {
                    tracing::warn!(repo = %full_name, error = %error, "vintage computation failed");
                    report.failures.push(VintageFailure {
                        repo: full_name,
                        error,
                    });
                }
            }
        }

        tracing::debug!(
            stored = report.stored,
            computed = report.computed,
            unresolvable = report.unresolvable,
            pending = report.pending.len(),
            failed = report.failures.len(),
            "vintages filled"
        );
        Ok(report)
    }

    /// Entry point for scheduled retries. A record written since the retry
    /// was scheduled short-circuits the computation.
    pub async fn run_task(
        &self,
        task: &ComputeVintageTask,
    ) -> Result<VintageResolution, VintageError> {
        if let Some(record) = self.store.get(task.key()).await? {
            tracing::debug!(repo = %task.full_name(), "vintage already recorded, skipping");
            return Ok(record.vintage.into());
        }
        self.compute_vintage(task).await
    }

    /// Compute the vintage of one repository from upstream data and persist it.
    pub async fn compute_vintage(
        &self,
        task: &ComputeVintageTask,
    ) -> Result<VintageResolution, VintageError> {
        let full_name = task.full_name();
        let key = task.key();

        let repo = match self
            .client
            .get_repo(&task.owner_login, &task.repo_name)
            .await
        {
            Ok(repo) => repo,
            Err(e) if e.is_inaccessible() => {
                tracing::warn!(repo = %full_name, error = %e, "repository inaccessible, recording as unresolvable");
                self.store
                    .put(VintageRecord::new(key, Vintage::Unresolvable))
                    .await?;
                return Ok(VintageResolution::Unresolvable);
            }
            Err(e) => return Err(VintageError::upstream(&full_name, VintageStage::Metadata, e)),
        };

        let mut vintage = repo.created_at;
        let probe = CommitQuery::probe(&task.user_login, repo.created_at - chrono::Duration::days(1));
        let commits = match self
            .client
            .list_commits(&task.owner_login, &task.repo_name, &probe)
            .await
        {
            Ok(commits) => commits,
            // Empty repositories answer the commits endpoint with a conflict.
            Err(e) if e.is_conflict() => Vec::new(),
            Err(e) => {
                return Err(VintageError::upstream(&full_name, VintageStage::CommitProbe, e));
            }
        };

        if let Some(oldest) = commits.iter().map(|c| c.authored_at).min() {
            vintage = vintage.min(oldest);

            let stats = self
                .client
                .contributor_stats(&task.owner_login, &task.repo_name)
                .await
                .map_err(|e| VintageError::upstream(&full_name, VintageStage::ContributorStats, e))?;

            match stats {
                StatsAvailability::Computing => return self.defer(task, &full_name).await,
                StatsAvailability::Ready(stats) => {
                    if let Some(week) = earliest_week(&stats, task.user_id, vintage) {
                        vintage = week;
                    }
                }
            }
        }

        self.store
            .put(VintageRecord::new(key, Vintage::Final(vintage)))
            .await?;
        tracing::debug!(repo = %full_name, %vintage, "vintage recorded");
        Ok(VintageResolution::Final(vintage))
    }

    async fn defer(
        &self,
        task: &ComputeVintageTask,
        full_name: &str,
    ) -> Result<VintageResolution, VintageError> {
        let delay = self.options.retry_delay;
        tracing::info!(repo = %full_name, delay_secs = delay.as_secs(), "contributor stats not ready, retrying later");

        if let Err(source) = self.scheduler.schedule(task.clone(), delay).await {
            // The pending resolution is lost unless someone notices.
            tracing::error!(repo = %full_name, error = %source, "failed to schedule vintage retry");
            return Err(VintageError::Schedule {
                repo: full_name.to_string(),
                source,
            });
        }
        Ok(VintageResolution::Pending)
    }
}

/// Earliest week bucket of `user_id` that precedes `candidate`.
fn earliest_week(
    stats: &[crate::platform::ContributorStats],
    user_id: i64,
    candidate: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    stats
        .iter()
        .find(|s| s.author_id == user_id)
        .and_then(|s| s.first_week())
        .filter(|week| *week < candidate)
}

#[async_trait]
impl<C: PlatformClient + Clone + 'static> TaskHandler for VintageResolver<C> {
    async fn handle(&self, task: ComputeVintageTask) {
        match self.run_task(&task).await {
            Ok(resolution) => {
                tracing::debug!(repo = %task.full_name(), ?resolution, "deferred vintage task done");
            }
            Err(e) => {
                tracing::error!(repo = %task.full_name(), error = %e, "deferred vintage task failed");
            }
        }
    }
}
