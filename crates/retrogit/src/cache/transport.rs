use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::http::{
    HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport, header_values,
};

use super::capture::{decode_head_response, decode_response, encode_response};
use super::store::CacheStore;

/// Credential segment used when a request carries no `Authorization` header.
pub const UNAUTHORIZED: &str = "Unauthorized";

/// Counters describing how the cache has been serving requests.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    lookup_errors: AtomicU64,
    corrupt_entries: AtomicU64,
    store_errors: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub lookup_errors: u64,
    pub corrupt_entries: u64,
    pub store_errors: u64,
}

impl CacheStats {
    #[must_use]
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            lookup_errors: self.lookup_errors.load(Ordering::Relaxed),
            corrupt_entries: self.corrupt_entries.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Build the cache key for a request.
///
/// `namespace:fullURL#auth1#auth2`, or `namespace:fullURL#Unauthorized` when no
/// credential is present. HEAD requests live under `namespace/HEAD` so their
/// bodiless captures never answer a GET.
#[must_use]
pub fn cache_key(namespace: &str, request: &HttpRequest) -> String {
    let auth = header_values(&request.headers, "authorization");
    let credential = if auth.is_empty() {
        UNAUTHORIZED.to_string()
    } else {
        auth.join("#")
    };

    match request.method {
        HttpMethod::Head => format!("{namespace}/HEAD:{}#{credential}", request.url),
        _ => format!("{namespace}:{}#{credential}", request.url),
    }
}

/// Only settled successes are worth replaying. 202 means the upstream is
/// still computing and a later request will differ.
fn is_cacheable(response: &HttpResponse) -> bool {
    response.is_success() && response.status != 202
}

/// An [`HttpTransport`] that answers idempotent reads from a [`CacheStore`].
///
/// The cache is best-effort: a failing or corrupt cache degrades to a plain
/// origin request and is only ever logged.
#[derive(Clone)]
pub struct CachingTransport {
    inner: Arc<dyn HttpTransport>,
    store: Arc<dyn CacheStore>,
    namespace: String,
    stats: Arc<CacheStats>,
}

impl CachingTransport {
    pub const DEFAULT_NAMESPACE: &'static str = "CachingTransport";

    pub fn new(
        inner: Arc<dyn HttpTransport>,
        store: Arc<dyn CacheStore>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            store,
            namespace: namespace.into(),
            stats: Arc::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    async fn lookup(&self, method: HttpMethod, key: &str, url: &str) -> Option<HttpResponse> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                CacheStats::bump(&self.stats.misses);
                return None;
            }
            Err(e) => {
                CacheStats::bump(&self.stats.lookup_errors);
                tracing::warn!(url, error = %e, "cache lookup failed, going to origin");
                return None;
            }
        };

        let decoded = match method {
            HttpMethod::Head => decode_head_response(&bytes),
            _ => decode_response(&bytes),
        };
        match decoded {
            Ok(response) => {
                CacheStats::bump(&self.stats.hits);
                tracing::trace!(url, "cache hit");
                Some(response)
            }
            Err(e) => {
                CacheStats::bump(&self.stats.corrupt_entries);
                tracing::warn!(url, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    async fn store(&self, key: &str, url: &str, response: &HttpResponse) {
        if let Err(e) = self.store.set(key, encode_response(response)).await {
            CacheStats::bump(&self.stats.store_errors);
            tracing::warn!(url, error = %e, "failed to store response in cache");
        }
    }
}

#[async_trait]
impl HttpTransport for CachingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        if !request.method.is_idempotent_read() {
            return self.inner.send(request).await;
        }

        let key = cache_key(&self.namespace, &request);
        let url = request.url.clone();

        if let Some(cached) = self.lookup(request.method, &key, &url).await {
            return Ok(cached);
        }

        let response = self.inner.send(request).await?;
        if is_cacheable(&response) {
            self.store(&key, &url, &response).await;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{CacheError, MemoryCacheStore};
    use crate::http::MockTransport;

    const URL: &str = "https://api.test/repos/o/r";

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    fn get(auth: &[&str]) -> HttpRequest {
        HttpRequest::get(
            URL,
            auth.iter()
                .map(|v| ("Authorization".to_string(), (*v).to_string()))
                .collect(),
        )
    }

    /// Store whose lookups and writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    fn caching(mock: &MockTransport, store: Arc<dyn CacheStore>) -> CachingTransport {
        CachingTransport::new(Arc::new(mock.clone()), store, "ns")
    }

    #[test]
    fn key_joins_all_authorization_values() {
        assert_eq!(cache_key("ns", &get(&[])), format!("ns:{URL}#Unauthorized"));
        assert_eq!(cache_key("ns", &get(&["token a"])), format!("ns:{URL}#token a"));
        assert_eq!(
            cache_key("ns", &get(&["token a", "token b"])),
            format!("ns:{URL}#token a#token b")
        );
    }

    #[test]
    fn head_requests_use_their_own_namespace() {
        let mut req = get(&["token a"]);
        req.method = HttpMethod::Head;
        assert_eq!(cache_key("ns", &req), format!("ns/HEAD:{URL}#token a"));
        assert_ne!(cache_key("ns", &req), cache_key("ns", &get(&["token a"])));
    }

    #[tokio::test]
    async fn second_identical_read_is_served_from_cache() {
        let mock = MockTransport::new();
        mock.push_response(HttpMethod::Get, URL, ok(r#"{"id":1}"#));
        let transport = caching(&mock, Arc::new(MemoryCacheStore::default()));

        let first = transport.send(get(&["token a"])).await.expect("origin");
        let second = transport.send(get(&["token a"])).await.expect("cache");

        assert_eq!(first, second);
        assert_eq!(mock.request_count(URL), 1);
        let stats = transport.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn head_reply_with_content_length_is_served_from_cache() {
        let mock = MockTransport::new();
        mock.push_response(
            HttpMethod::Head,
            URL,
            HttpResponse {
                status: 200,
                headers: vec![("Content-Length".to_string(), "1234".to_string())],
                body: Vec::new(),
            },
        );
        let transport = caching(&mock, Arc::new(MemoryCacheStore::default()));
        let head = || {
            let mut req = get(&["token a"]);
            req.method = HttpMethod::Head;
            req
        };

        let first = transport.send(head()).await.expect("origin");
        let second = transport.send(head()).await.expect("cache");

        assert_eq!(first, second);
        assert_eq!(second.header("content-length"), Some("1234"));
        assert_eq!(mock.request_count(URL), 1);
        let stats = transport.stats();
        assert_eq!((stats.hits, stats.misses, stats.corrupt_entries), (1, 1, 0));
    }

    #[tokio::test]
    async fn different_credentials_never_share_entries() {
        let mock = MockTransport::new();
        mock.push_response(HttpMethod::Get, URL, ok("alice"));
        mock.push_response(HttpMethod::Get, URL, ok("bob"));
        mock.push_response(HttpMethod::Get, URL, ok("anon"));
        let transport = caching(&mock, Arc::new(MemoryCacheStore::default()));

        let a = transport.send(get(&["token alice"])).await.expect("a");
        let b = transport.send(get(&["token bob"])).await.expect("b");
        let anon = transport.send(get(&[])).await.expect("anon");

        assert_eq!(a.body, b"alice");
        assert_eq!(b.body, b"bob");
        assert_eq!(anon.body, b"anon");
        assert_eq!(mock.request_count(URL), 3);
    }

    #[tokio::test]
    async fn failing_store_degrades_to_origin() {
        let mock = MockTransport::new();
        mock.push_response(HttpMethod::Get, URL, ok("one"));
        mock.push_response(HttpMethod::Get, URL, ok("two"));
        let transport = caching(&mock, Arc::new(BrokenStore));

        let first = transport.send(get(&["t"])).await.expect("origin despite cache");
        let second = transport.send(get(&["t"])).await.expect("origin again");

        assert_eq!(first.body, b"one");
        assert_eq!(second.body, b"two");
        let stats = transport.stats();
        assert_eq!(stats.lookup_errors, 2);
        assert_eq!(stats.store_errors, 2);
    }

    #[tokio::test]
    async fn corrupt_entry_falls_through_and_is_replaced() {
        let mock = MockTransport::new();
        mock.push_response(HttpMethod::Get, URL, ok("fresh"));
        let store = Arc::new(MemoryCacheStore::default());
        let key = cache_key("ns", &get(&["t"]));
        store.set(&key, b"not an http message".to_vec()).await.expect("seed");
        let transport = caching(&mock, store.clone());

        let resp = transport.send(get(&["t"])).await.expect("origin");
        assert_eq!(resp.body, b"fresh");
        assert_eq!(transport.stats().corrupt_entries, 1);

        let cached = store.get(&key).await.expect("get").expect("replaced");
        assert_eq!(decode_response(&cached).expect("decodes").body, b"fresh");
    }

    #[tokio::test]
    async fn writes_bypass_the_cache() {
        let mock = MockTransport::new();
        let reply = HttpResponse {
            status: 201,
            headers: Vec::new(),
            body: Vec::new(),
        };
        mock.push_response(HttpMethod::Post, URL, reply.clone());
        mock.push_response(HttpMethod::Post, URL, reply);
        let store = Arc::new(MemoryCacheStore::default());
        let transport = caching(&mock, store.clone());

        for _ in 0..2 {
            let mut req = get(&["t"]);
            req.method = HttpMethod::Post;
            transport.send(req).await.expect("post");
        }

        assert_eq!(mock.request_count(URL), 2);
        assert!(store.is_empty());
        assert_eq!(transport.stats(), CacheStatsSnapshot::default());
    }

    #[tokio::test]
    async fn accepted_and_error_responses_are_not_stored() {
        let mock = MockTransport::new();
        for status in [202, 404] {
            mock.push_response(
                HttpMethod::Get,
                URL,
                HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: Vec::new(),
                },
            );
        }
        let store = Arc::new(MemoryCacheStore::default());
        let transport = caching(&mock, store.clone());

        assert_eq!(transport.send(get(&["t"])).await.expect("202").status, 202);
        assert_eq!(transport.send(get(&["t"])).await.expect("404").status, 404);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn transport_errors_propagate_and_store_nothing() {
        let mock = MockTransport::new();
        mock.push_failure(HttpMethod::Get, URL, 1);
        let store = Arc::new(MemoryCacheStore::default());
        let transport = caching(&mock, store.clone());

        let err = transport.send(get(&["t"])).await.expect_err("origin failed");
        assert!(matches!(err, HttpError::Transport(_)));
        assert!(store.is_empty());
    }
}
