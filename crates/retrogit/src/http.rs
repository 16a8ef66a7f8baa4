//! Transport boundary for every upstream HTTP call.
//!
//! Platform clients never talk to reqwest directly. They build an
//! [`HttpRequest`] and hand it to an [`HttpTransport`], which lets the
//! caching layer wrap the real transport and lets tests swap in
//! [`MockTransport`].

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
        }
    }

    /// Whether the method is a read that never changes upstream state.
    #[must_use]
    pub fn is_idempotent_read(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Head)
    }
}

/// Ordered header list. Names compare case-insensitively in the helpers.
pub type HttpHeaders = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// A bodiless GET request.
    #[must_use]
    pub fn get(url: impl Into<String>, headers: HttpHeaders) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers,
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// First value of header `name`, case-insensitive.
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Every value of header `name` in the order they appear.
#[must_use]
pub fn header_values<'a>(headers: &'a HttpHeaders, name: &str) -> Vec<&'a str> {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
        .collect()
}

pub mod reqwest_transport {
    use super::*;

    use std::time::Duration as StdDuration;

    /// The production transport.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| HttpError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Head => reqwest::Method::HEAD,
                HttpMethod::Post => reqwest::Method::POST,
            };

            let mut builder = self.client.request(method, &request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }
            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let headers: HttpHeaders = resp
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();

            let body = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?
                .to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Scripted transport for unit tests. Responses are queued per method and URL.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<HttpResponse>>,
    failures: HashMap<(HttpMethod, String), usize>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response. Several responses for one key are served FIFO.
    pub fn push_response(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        response: HttpResponse,
    ) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner
            .routes
            .entry((method, url.into()))
            .or_default()
            .push_back(response);
    }

    /// Make the next `times` sends to this key fail with a transport error.
    pub fn push_failure(&self, method: HttpMethod, url: impl Into<String>, times: usize) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        *inner.failures.entry((method, url.into())).or_default() += times;
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner.requests.clone()
    }

    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");

        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        if let Some(remaining) = inner.failures.get_mut(&key)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(HttpError::Transport(format!("connection reset: {}", key.1)));
        }

        match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(resp) => Ok(resp),
            None => Err(HttpError::NoMockResponse {
                method: key.0.as_str().to_string(),
                url: key.1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn header_lookup_ignores_case_and_keeps_order() {
        let headers: HttpHeaders = vec![
            ("Authorization".to_string(), "token a".to_string()),
            ("X-Other".to_string(), "1".to_string()),
            ("authorization".to_string(), "token b".to_string()),
        ];
        assert_eq!(header_get(&headers, "AUTHORIZATION"), Some("token a"));
        assert_eq!(
            header_values(&headers, "authorization"),
            vec!["token a", "token b"]
        );
        assert!(header_values(&headers, "missing").is_empty());
    }

    #[test]
    fn only_get_and_head_are_idempotent_reads() {
        assert!(HttpMethod::Get.is_idempotent_read());
        assert!(HttpMethod::Head.is_idempotent_read());
        assert!(!HttpMethod::Post.is_idempotent_read());
        assert_eq!(HttpMethod::Head.as_str(), "HEAD");
    }

    #[tokio::test]
    async fn mock_transport_serves_queued_responses_in_order() {
        let transport = MockTransport::new();
        let url = "https://api.test/user";
        for status in [200, 304] {
            transport.push_response(
                HttpMethod::Get,
                url,
                HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: Vec::new(),
                },
            );
        }

        let first = transport
            .send(HttpRequest::get(url, Vec::new()))
            .await
            .expect("first response");
        let second = transport
            .send(HttpRequest::get(url, Vec::new()))
            .await
            .expect("second response");
        assert_eq!((first.status, second.status), (200, 304));
        assert_eq!(transport.request_count(url), 2);

        let err = transport
            .send(HttpRequest::get(url, Vec::new()))
            .await
            .expect_err("queue is drained");
        assert!(matches!(err, HttpError::NoMockResponse { .. }));
    }

    #[tokio::test]
    async fn mock_transport_injects_failures_before_responses() {
        let transport = MockTransport::new();
        let url = "https://api.test/flaky";
        transport.push_failure(HttpMethod::Get, url, 1);
        transport.push_response(
            HttpMethod::Get,
            url,
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"ok".to_vec(),
            },
        );

        let err = transport
            .send(HttpRequest::get(url, Vec::new()))
            .await
            .expect_err("first send fails");
        assert!(matches!(err, HttpError::Transport(_)));

        let resp = transport
            .send(HttpRequest::get(url, Vec::new()))
            .await
            .expect("second send succeeds");
        assert_eq!(resp.body, b"ok".to_vec());
    }

    #[test]
    fn reqwest_transport_with_timeout_builds_client() {
        let transport = reqwest_transport::ReqwestTransport::with_timeout(Duration::from_millis(1))
            .expect("reqwest transport should build");
        let _ = transport;
    }

    #[tokio::test]
    async fn reqwest_transport_reports_invalid_url_as_transport_error() {
        let transport = reqwest_transport::ReqwestTransport::new(reqwest::Client::new());
        let err = transport
            .send(HttpRequest::get("not a url", Vec::new()))
            .await
            .expect_err("expected error");
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
