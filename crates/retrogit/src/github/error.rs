//! GitHub API error types.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::http::{HttpError, HttpHeaders, header_get};
use crate::platform::PlatformError;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("API error ({status}) for {resource}: {message}")]
    Api {
        status: u16,
        resource: String,
        message: String,
    },

    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GitHubError {
    /// Classify a non-success response.
    ///
    /// GitHub signals the primary rate limit with 403 and
    /// `x-ratelimit-remaining: 0`, and secondary limits with 403/429 plus
    /// `retry-after`. Anything else is an ordinary API error.
    pub fn from_status(status: u16, headers: &HttpHeaders, resource: &str, body: &[u8]) -> Self {
        if let Some(reset_at) = rate_limit_reset(status, headers) {
            return GitHubError::RateLimited { reset_at };
        }

        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

        GitHubError::Api {
            status,
            resource: resource.to_string(),
            message,
        }
    }
}

fn rate_limit_reset(status: u16, headers: &HttpHeaders) -> Option<DateTime<Utc>> {
    if status != 403 && status != 429 {
        return None;
    }

    if let Some(secs) = header_get(headers, "retry-after").and_then(|v| v.parse::<i64>().ok()) {
        return Some(Utc::now() + Duration::seconds(secs));
    }

    let exhausted = header_get(headers, "x-ratelimit-remaining") == Some("0");
    if !exhausted && status == 403 {
        return None;
    }

    let reset_at = header_get(headers, "x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
        .unwrap_or_else(|| Utc::now() + Duration::minutes(1));
    Some(reset_at)
}

impl From<GitHubError> for PlatformError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Http(e) => PlatformError::network(e.to_string()),
            GitHubError::Json(e) => PlatformError::internal(format!("JSON parse error: {e}")),
            GitHubError::Url(e) => PlatformError::internal(format!("invalid URL: {e}")),
            GitHubError::Api {
                status,
                resource,
                message,
            } => match status {
                401 => PlatformError::AuthRequired,
                403 => PlatformError::forbidden(resource),
                404 => PlatformError::not_found(resource),
                409 => PlatformError::conflict(resource),
                _ => PlatformError::api(status, format!("{resource}: {message}")),
            },
            GitHubError::RateLimited { reset_at } => PlatformError::RateLimited { reset_at },
            GitHubError::Config(msg) => PlatformError::internal(msg),
        }
    }
}

pub fn is_rate_limit_error(err: &GitHubError) -> bool {
    matches!(err, GitHubError::RateLimited { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HttpHeaders {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn exhausted_quota_403_is_rate_limited() {
        let err = GitHubError::from_status(
            403,
            &headers(&[
                ("X-RateLimit-Remaining", "0"),
                ("X-RateLimit-Reset", "1700000000"),
            ]),
            "/user/repos",
            b"{}",
        );
        match err {
            GitHubError::RateLimited { reset_at } => {
                assert_eq!(reset_at.timestamp(), 1_700_000_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn secondary_limit_uses_retry_after() {
        let before = Utc::now();
        let err = GitHubError::from_status(429, &headers(&[("Retry-After", "30")]), "/x", b"");
        match err {
            GitHubError::RateLimited { reset_at } => {
                assert!(reset_at >= before + Duration::seconds(30));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plain_403_is_forbidden() {
        let err = GitHubError::from_status(
            403,
            &headers(&[("X-RateLimit-Remaining", "4999")]),
            "/repos/o/r",
            br#"{"message": "Must have admin rights"}"#,
        );
        assert!(!is_rate_limit_error(&err));
        assert!(err.to_string().contains("Must have admin rights"));

        let platform: PlatformError = err.into();
        assert!(matches!(platform, PlatformError::Forbidden { ref resource } if resource == "/repos/o/r"));
    }

    #[test]
    fn status_codes_map_to_platform_errors() {
        let map = |status| -> PlatformError {
            GitHubError::from_status(status, &Vec::new(), "/r", b"nope").into()
        };
        assert!(matches!(map(401), PlatformError::AuthRequired));
        assert!(matches!(map(404), PlatformError::NotFound { .. }));
        assert!(matches!(map(409), PlatformError::Conflict { .. }));
        assert!(matches!(map(429), PlatformError::RateLimited { .. }));
        assert!(matches!(map(502), PlatformError::Api { status: 502, .. }));
    }

    #[test]
    fn transport_errors_are_network_errors() {
        let platform: PlatformError =
            GitHubError::Http(HttpError::Transport("reset".to_string())).into();
        assert!(matches!(platform, PlatformError::Network { .. }));
    }
}
