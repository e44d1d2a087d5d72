//! Status handling shared by the Gemini client and the image downloader.
//!
//! Both talk to third-party hosts that answer 429 when throttling and may
//! return an HTML error page on failure. [`ensure_success`] turns such
//! responses into a [`ResponseError`] that each client maps into its own
//! error type.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Wait assumed when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Longest error body kept in [`ResponseError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// A response the caller cannot use.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// 429 Too Many Requests.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds the host asked us to wait.
        retry_after_secs: u64,
    },

    /// Any other non-2xx status.
    #[error("HTTP status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        message: String,
    },
}

/// Pass a 2xx response through, otherwise describe why it failed.
pub async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ResponseError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| retry_after_secs(v, Utc::now()))
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ResponseError::RateLimited { retry_after_secs });
    }

    let body = resp.text().await.unwrap_or_default();
    Err(ResponseError::Status {
        status: status.as_u16(),
        message: truncate_body(body.trim()),
    })
}

/// Seconds encoded by a `Retry-After` value: delta-seconds or an HTTP date.
fn retry_after_secs(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc).signed_duration_since(now).num_seconds();
    Some(wait.max(0) as u64)
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> reqwest::Response {
        let mut builder = ::http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        reqwest::Response::from(builder.body(body.to_string()).unwrap())
    }

    #[test]
    fn test_retry_after_forms() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        assert_eq!(retry_after_secs(" 7 ", now), Some(7));
        assert_eq!(
            retry_after_secs("Sat, 01 Mar 2025 12:01:30 GMT", now),
            Some(90)
        );
        assert_eq!(retry_after_secs("Sat, 01 Mar 2025 11:00:00 GMT", now), Some(0));
        assert_eq!(retry_after_secs("later", now), None);
    }

    #[tokio::test]
    async fn test_gemini_quota_response_is_rate_limited() {
        let resp = response(429, &[("Retry-After", "12")], "RESOURCE_EXHAUSTED");
        assert!(matches!(
            ensure_success(resp).await.unwrap_err(),
            ResponseError::RateLimited {
                retry_after_secs: 12
            }
        ));

        let bare = response(429, &[], "");
        assert!(matches!(
            ensure_success(bare).await.unwrap_err(),
            ResponseError::RateLimited {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS
            }
        ));
    }

    #[tokio::test]
    async fn test_image_host_error_page_is_truncated() {
        let page = format!("<html>{}</html>", "x".repeat(2000));
        match ensure_success(response(502, &[], &page)).await.unwrap_err() {
            ResponseError::Status { status, message } => {
                assert_eq!(status, 502);
                assert!(message.starts_with("<html>xxx"));
                assert!(message.ends_with("..."));
                assert_eq!(message.chars().count(), MAX_ERROR_BODY_CHARS + 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let resp = ensure_success(response(200, &[], "{\"candidates\":[]}"))
            .await
            .unwrap();
        assert_eq!(resp.text().await.unwrap(), "{\"candidates\":[]}");
    }
}
