//! RemoteClient: HTTP client for the platform REST API
//!
//! One request per call, no retries. Rate-limit refusals are surfaced as
//! `SdkError::RateLimited` so callers can fail fast.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::client::{GraphClient, DEFAULT_PAGE_SIZE};
use crate::error::{SdkError, SdkResult};
use crate::models::{FollowingUser, UserRef};

/// Default REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("followscout/", env!("CARGO_PKG_VERSION"));
const MEDIA_TYPE: &str = "application/vnd.github+json";

/// Network client for the platform API.
///
/// Every request carries `Authorization: token <token>`.
pub struct RemoteClient {
    api_base_url: String,
    token: String,
    http_client: Client,
    page_size: u32,
}

impl RemoteClient {
    /// Create a client against the public API with a 30 second request timeout.
    ///
    /// # Example
    /// ```no_run
    /// # use followscout_sdk::RemoteClient;
    /// let client = RemoteClient::new("ghp_example").unwrap();
    /// ```
    pub fn new(token: &str) -> SdkResult<Self> {
        Self::with_timeout(token, Duration::from_secs(30))
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(token: &str, timeout: Duration) -> SdkResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            token: token.to_string(),
            http_client,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Point the client at a different API root (e.g. an enterprise host)
    pub fn with_base_url(mut self, api_base_url: &str) -> Self {
        self.api_base_url = api_base_url.trim_end_matches('/').to_string();
        self
    }

    /// Override the followings page size
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }

    fn viewer_url(&self) -> String {
        format!("{}/user", self.api_base_url)
    }

    fn profile_url(&self, login: &str) -> String {
        format!("{}/users/{}", self.api_base_url, login)
    }

    fn following_url(&self, login: &str, page: u32) -> String {
        format!(
            "{}/users/{}/following?per_page={}&page={}",
            self.api_base_url, login, self.page_size, page
        )
    }

    /// Execute a GET request and decode the JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: &str, login: Option<&str>) -> SdkResult<T> {
        debug!("GET {}", url);
        let response = self.http_client.get(url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, MEDIA_TYPE)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &headers, &body, login))
    }
}

/// Map a non-success response onto an `SdkError`.
///
/// 403 is ambiguous on this API: it is used both for rate limiting and for
/// plain permission problems, so the headers and body decide.
pub(crate) fn classify_failure(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    login: Option<&str>,
) -> SdkError {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let exhausted = header("x-ratelimit-remaining") == Some("0");
    let retry_after = header("retry-after").and_then(|v| v.trim().parse::<i64>().ok());
    let mentions_limit = body.to_ascii_lowercase().contains("rate limit");

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (exhausted || retry_after.is_some() || mentions_limit))
    {
        let reset_at = header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| {
                retry_after
                    .and_then(chrono::Duration::try_seconds)
                    .and_then(|wait| Utc::now().checked_add_signed(wait))
            });
        return SdkError::RateLimited { reset_at };
    }

    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    match status {
        StatusCode::UNAUTHORIZED => SdkError::Unauthorized(message),
        StatusCode::NOT_FOUND => SdkError::NotFound(login.unwrap_or("<viewer>").to_string()),
        _ => SdkError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl GraphClient for RemoteClient {
    async fn fetch_viewer(&self) -> SdkResult<UserRef> {
        self.get_json(&self.viewer_url(), None).await
    }

    async fn fetch_profile(&self, login: &str) -> SdkResult<UserRef> {
        self.get_json(&self.profile_url(login), Some(login)).await
    }

    async fn fetch_followings_page(&self, login: &str, page: u32) -> SdkResult<Vec<FollowingUser>> {
        self.get_json(&self.following_url(login, page), Some(login)).await
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_urls() {
        let client = RemoteClient::new("t").unwrap().with_base_url("https://ghe.example.com/api/v3/");
        assert_eq!(client.base_url(), "https://ghe.example.com/api/v3");
        assert_eq!(client.viewer_url(), "https://ghe.example.com/api/v3/user");
        assert_eq!(client.profile_url("alice"), "https://ghe.example.com/api/v3/users/alice");
        assert_eq!(
            client.following_url("alice", 3),
            "https://ghe.example.com/api/v3/users/alice/following?per_page=30&page=3"
        );
    }

    #[test]
    fn test_page_size_override() {
        let client = RemoteClient::new("t").unwrap().with_page_size(100);
        assert_eq!(client.page_size(), 100);
        assert!(client.following_url("bob", 1).contains("per_page=100"));

        let client = RemoteClient::new("t").unwrap().with_page_size(0);
        assert_eq!(client.page_size(), 1);
    }

    #[test]
    fn test_forbidden_with_exhausted_quota_is_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let err = classify_failure(StatusCode::FORBIDDEN, &headers, "{}", Some("alice"));
        match err {
            SdkError::RateLimited { reset_at } => {
                assert_eq!(reset_at.map(|t| t.timestamp()), Some(1_700_000_000));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_retry_after_leaves_reset_unknown() {
        for value in ["100000000000000", "-100000000000000", "9223372036854775807"] {
            let mut headers = HeaderMap::new();
            headers.insert("retry-after", HeaderValue::from_str(value).unwrap());
            let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, &headers, "", Some("a"));
            match err {
                SdkError::RateLimited { reset_at } => assert_eq!(reset_at, None, "retry-after {}", value),
                other => panic!("expected rate limit, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_secondary_rate_limit_detected_from_body() {
        let body = r#"{"message": "You have exceeded a secondary rate limit."}"#;
        let err = classify_failure(StatusCode::FORBIDDEN, &HeaderMap::new(), body, None);
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_too_many_requests_is_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("60"));
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, &headers, "", None);
        match err {
            SdkError::RateLimited { reset_at } => assert!(reset_at.is_some()),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_forbidden_is_status() {
        let body = r#"{"message": "Resource not accessible by integration"}"#;
        let err = classify_failure(StatusCode::FORBIDDEN, &HeaderMap::new(), body, None);
        match err {
            SdkError::Status { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Resource not accessible by integration");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found_and_unauthorized() {
        let err = classify_failure(StatusCode::NOT_FOUND, &HeaderMap::new(), "", Some("ghost"));
        assert!(matches!(err, SdkError::NotFound(ref login) if login == "ghost"));

        let body = r#"{"message": "Bad credentials"}"#;
        let err = classify_failure(StatusCode::UNAUTHORIZED, &HeaderMap::new(), body, None);
        assert!(matches!(err, SdkError::Unauthorized(ref m) if m == "Bad credentials"));
    }

    #[test]
    fn test_server_error_without_body_uses_reason() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "", None);
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    }
}
