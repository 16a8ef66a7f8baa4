use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};

use super::window::DigestWindow;
use super::{Digest, DigestError, DigestOptions, RepoDigest};
use crate::platform::{CommitQuery, PlatformClient, PlatformError, PlatformUser};
use crate::repos::Repository;

type WorkerResult = Result<RepoDigest, DigestError>;

/// Fetch the commits `user` authored in `window` for every repository.
///
/// One task per repository lists commits concurrently, bounded by
/// `options.concurrency` (`0` means no bound). Every task reports exactly once
/// over a shared channel and the call waits for all of them, even after a
/// failure, so no request outlives it. The first failure received fails the
/// whole digest. On success, repository digests are sorted by full name.
#[tracing::instrument(skip_all, fields(user = %user.login, repos = repos.len()))]
pub async fn fetch_digest<C>(
    client: &C,
    user: &PlatformUser,
    window: DigestWindow,
    repos: Vec<Repository>,
    options: &DigestOptions,
) -> Result<Digest, DigestError>
where
    C: PlatformClient + Clone + 'static,
{
    if let Some(invalid) = repos
        .iter()
        .find(|r| r.repo.owner.login.is_empty() || r.repo.name.is_empty())
    {
        return Err(DigestError::InvalidRepository {
            repo_id: invalid.repo.id,
            full_name: invalid.repo.full_name.clone(),
        });
    }

    let mut seen = HashSet::new();
    let repos: Vec<Repository> = repos
        .into_iter()
        .filter(|r| seen.insert(r.repo.id))
        .collect();

    let mut digest = Digest {
        user: user.clone(),
        window,
        repo_digests: Vec::with_capacity(repos.len()),
    };
    if repos.is_empty() {
        return Ok(digest);
    }

    let expected = repos.len();
    let permits = match options.concurrency {
        0 => expected,
        n => n.min(expected),
    };
    let semaphore = Arc::new(Semaphore::new(permits));
    let (tx, rx) = mpsc::channel::<WorkerResult>(expected);

    for repo in repos {
        let client = client.clone();
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        let query = CommitQuery::window(&user.login, window.start, window.end);

        tokio::spawn(async move {
            let full_name = repo.repo.full_name.clone();
            let listed = match semaphore.acquire().await {
                Ok(_permit) => {
                    client
                        .list_commits(&repo.repo.owner.login, &repo.repo.name, &query)
                        .await
                }
                Err(_) => Err(PlatformError::internal("Semaphore closed unexpectedly")),
            };
            let result = listed
                .map(|commits| RepoDigest { repo, commits })
                .map_err(|source| DigestError::Upstream {
                    repo: full_name,
                    source,
                });
            // The receiver only goes away once every report is in.
            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    digest.repo_digests = fan_in(rx, expected).await?;
    digest
        .repo_digests
        .sort_by(|a, b| a.repo.repo.full_name.cmp(&b.repo.repo.full_name));

    tracing::debug!(
        repos = digest.repo_digests.len(),
        commits = digest.commit_count(),
        "digest fetched"
    );
    Ok(digest)
}

/// Receive exactly `expected` reports, keeping the first error.
async fn fan_in(
    mut rx: mpsc::Receiver<WorkerResult>,
    expected: usize,
) -> Result<Vec<RepoDigest>, DigestError> {
    let mut received = 0usize;
    let mut first_error: Option<DigestError> = None;
    let mut collected = Vec::with_capacity(expected);

    while received < expected {
        let Some(report) = rx.recv().await else {
            break;
        };
        received += 1;
        match report {
            Ok(repo_digest) => collected.push(repo_digest),
            Err(e) => {
                if first_error.is_none() {
                    tracing::warn!(error = %e, "digest fetch failed, draining remaining workers");
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    if received < expected {
        tracing::error!(expected, received, "digest worker exited without reporting");
        return Err(DigestError::WorkerLost { expected, received });
    }
    Ok(collected)
}
