//! Byte-exact capture of an HTTP response in HTTP/1.1 message form.

use thiserror::Error;

use crate::http::{HttpHeaders, HttpResponse, header_get};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("captured response has no header terminator")]
    MissingTerminator,

    #[error("malformed status line: {0}")]
    StatusLine(String),

    #[error("malformed header line: {0}")]
    Header(String),

    #[error("body length {actual} does not match content-length {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Serialize a response into `HTTP/1.1 <status> <reason>\r\n<headers>\r\n\r\n<body>`.
///
/// Header order is preserved. The body is written as-is; a `Content-Length`
/// header from the origin, if present, is kept so that decoding can detect
/// truncated entries.
#[must_use]
pub fn encode_response(response: &HttpResponse) -> Vec<u8> {
    let reason = reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("");

    let mut out = Vec::with_capacity(response.body.len() + 256);
    out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", response.status, reason).as_bytes());
    for (name, value) in &response.headers {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&response.body);
    out
}

/// Parse bytes written by [`encode_response`].
pub fn decode_response(bytes: &[u8]) -> Result<HttpResponse, CaptureError> {
    decode(bytes, true)
}

/// Parse a captured HEAD response.
///
/// HEAD replies carry the `Content-Length` of the representation a GET would
/// return while the body is always empty, so the length is not checked.
pub fn decode_head_response(bytes: &[u8]) -> Result<HttpResponse, CaptureError> {
    decode(bytes, false)
}

fn decode(bytes: &[u8], check_length: bool) -> Result<HttpResponse, CaptureError> {
    let split = bytes
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .ok_or(CaptureError::MissingTerminator)?;

    let head = String::from_utf8_lossy(&bytes[..split]);
    let body = bytes[split + HEADER_TERMINATOR.len()..].to_vec();

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let status = parse_status_line(status_line)?;

    let mut headers: HttpHeaders = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CaptureError::Header(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CaptureError::Header(line.to_string()));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }

    if check_length
        && let Some(declared) = header_get(&headers, "content-length")
        && let Ok(expected) = declared.parse::<usize>()
        && expected != body.len()
    {
        return Err(CaptureError::LengthMismatch {
            expected,
            actual: body.len(),
        });
    }

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn parse_status_line(line: &str) -> Result<u16, CaptureError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(CaptureError::StatusLine(line.to_string()));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..600).contains(code))
        .ok_or_else(|| CaptureError::StatusLine(line.to_string()))
}
