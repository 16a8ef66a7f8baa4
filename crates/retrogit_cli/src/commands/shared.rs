use std::sync::Arc;
use std::time::Duration;

use retrogit::cache::{CacheStore, CachingTransport, DbCacheStore, MemoryCacheStore};
use retrogit::github::GitHubClient;
use retrogit::http::HttpTransport;
use retrogit::http::reqwest_transport::ReqwestTransport;
use retrogit::platform::ApiRateLimiter;
use retrogit::vintage::{
    DbVintageStore, DeferredQueue, DeferredTaskWorker, TaskHandler, VintageResolver,
    deferred_queue,
};
use sea_orm::DatabaseConnection;

use crate::config::{CacheBackend, Config};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed past the retry delay for a deferred computation to finish.
const DEFERRED_GRACE: Duration = Duration::from_secs(5);

/// Everything the `repos` and `digest` commands talk to.
pub(crate) struct Services {
    pub(crate) client: GitHubClient,
    pub(crate) resolver: VintageResolver<GitHubClient>,
    pub(crate) worker: DeferredTaskWorker,
    pub(crate) queue: DeferredQueue,
    pub(crate) cache: Option<CachingTransport>,
}

fn missing_token() -> Box<dyn std::error::Error> {
    "GitHub token not configured. Set RETROGIT_GITHUB_TOKEN or [github].token in the config file."
        .into()
}

pub(crate) fn build_services(
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<Services, Box<dyn std::error::Error>> {
    let token = config.github_token().ok_or_else(missing_token)?;

    let origin: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::with_timeout(HTTP_TIMEOUT)?);
    let cache = config.cache.enabled.then(|| {
        let store: Arc<dyn CacheStore> = match config.cache.backend {
            CacheBackend::Database => Arc::new(DbCacheStore::new(Arc::clone(db))),
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new(config.cache.capacity)),
        };
        CachingTransport::new(Arc::clone(&origin), store, config.cache.namespace.clone())
    });
    let transport: Arc<dyn HttpTransport> = match cache {
        Some(ref caching) => Arc::new(caching.clone()),
        None => origin,
    };

    let rate_limiter = match config.github.requests_per_second {
        0 => None,
        rps => Some(ApiRateLimiter::new(rps)),
    };
    let client =
        GitHubClient::new_with_transport(&config.github.api_url, Some(token), rate_limiter, transport);

    let (queue, worker) = deferred_queue();
    let resolver = VintageResolver::new(
        client.clone(),
        Arc::new(DbVintageStore::new(Arc::clone(db))),
        Arc::new(queue.clone()),
        config.vintage_options(),
    );

    Ok(Services {
        client,
        resolver,
        worker,
        queue,
        cache,
    })
}

/// How long to keep the process alive for deferred vintage computations.
///
/// An explicit `--wait` wins; otherwise one retry cycle is allowed so that
/// scheduled work is not dropped when the command returns.
pub(crate) fn deferred_limit(wait: Option<u64>, config: &Config) -> Duration {
    match wait {
        Some(secs) => Duration::from_secs(secs),
        None => config.vintage_options().retry_delay + DEFERRED_GRACE,
    }
}

/// Result of running the deferred worker before exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Settled {
    pub(crate) executed: usize,
    pub(crate) abandoned: usize,
}

/// Run deferred tasks until the queue is idle or `limit` elapses.
///
/// Tasks still outstanding at the deadline are lost with the process and
/// logged at error level.
pub(crate) async fn settle_deferred<H: TaskHandler>(
    worker: DeferredTaskWorker,
    queue: &DeferredQueue,
    handler: Arc<H>,
    limit: Duration,
) -> Settled {
    if queue.outstanding() == 0 {
        return Settled {
            executed: 0,
            abandoned: 0,
        };
    }

    tracing::info!(
        outstanding = queue.outstanding(),
        limit_secs = limit.as_secs(),
        "waiting for deferred vintage computations"
    );
    match tokio::time::timeout(limit, worker.run_until_idle(handler)).await {
        Ok(executed) => {
            tracing::debug!(executed, "deferred vintages settled");
            Settled {
                executed,
                abandoned: 0,
            }
        }
        Err(_) => {
            let abandoned = queue.outstanding();
            tracing::error!(
                abandoned,
                "abandoning deferred vintage computations; rerun to resume them"
            );
            Settled {
                executed: 0,
                abandoned,
            }
        }
    }
}

/// Log cache effectiveness at debug level once a command is done.
pub(crate) fn log_cache_stats(cache: Option<&CachingTransport>) {
    if let Some(cache) = cache {
        let stats = cache.stats();
        tracing::debug!(
            hits = stats.hits,
            misses = stats.misses,
            lookup_errors = stats.lookup_errors,
            corrupt_entries = stats.corrupt_entries,
            store_errors = stats.store_errors,
            "response cache"
        );
    }
}
