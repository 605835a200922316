//! EmbeddedClient: in-process follow graph
//!
//! Holds users and follow lists in memory, no network needed. Used by the
//! pipeline tests, demos and benchmarks, with knobs for latency and failure
//! injection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::client::{GraphClient, DEFAULT_PAGE_SIZE};
use crate::error::{SdkError, SdkResult};
use crate::models::{FollowingUser, UserRef};

/// Kind of failure to inject for a login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    RateLimited,
    Transport,
}

impl FailureKind {
    fn to_error(self, login: &str) -> SdkError {
        match self {
            FailureKind::NotFound => SdkError::NotFound(login.to_string()),
            FailureKind::RateLimited => SdkError::RateLimited { reset_at: None },
            FailureKind::Transport => SdkError::Status {
                status: 502,
                message: format!("injected transport failure for {}", login),
            },
        }
    }
}

#[derive(Debug, Default)]
struct GraphState {
    viewer: Option<String>,
    users: HashMap<String, UserRef>,
    /// Ordered follow lists; duplicates are kept on purpose
    follows: HashMap<String, Vec<String>>,
    followers: HashMap<String, u64>,
    reported_following: HashMap<String, u64>,
    profile_failures: HashMap<String, FailureKind>,
    followings_failures: HashMap<String, FailureKind>,
}

impl GraphState {
    fn ensure_user(&mut self, login: &str) {
        self.users
            .entry(login.to_string())
            .or_insert_with(|| UserRef::new(login));
    }

    fn profile(&self, login: &str) -> SdkResult<UserRef> {
        if let Some(kind) = self.profile_failures.get(login) {
            return Err(kind.to_error(login));
        }
        let mut user = self
            .users
            .get(login)
            .cloned()
            .ok_or_else(|| SdkError::NotFound(login.to_string()))?;

        user.following = match self.reported_following.get(login) {
            Some(n) => *n,
            None => self.follows.get(login).map(|f| f.len() as u64).unwrap_or(0),
        };
        if user.followers == 0 {
            user.followers = self.followers.get(login).copied().unwrap_or(0);
        }
        Ok(user)
    }
}

/// Call counters for an `EmbeddedClient`
#[derive(Debug, Default)]
pub struct CallStats {
    pub viewer_calls: AtomicU64,
    pub profile_calls: AtomicU64,
    pub page_calls: AtomicU64,
    pages_in_flight: AtomicUsize,
    peak_pages_in_flight: AtomicUsize,
}

/// In-process client over an in-memory follow graph.
///
/// Profiles report `following` as the length of the user's follow list
/// (unless pinned with `set_reported_following`) and `followers` as the
/// number of incoming follows (unless the stored profile carries a
/// non-zero value).
pub struct EmbeddedClient {
    state: RwLock<GraphState>,
    page_size: u32,
    latency: Option<Duration>,
    stats: CallStats,
    page_log: Mutex<HashMap<String, u32>>,
}

impl Default for EmbeddedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedClient {
    /// Create an empty graph with the default page size
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            page_size: DEFAULT_PAGE_SIZE,
            latency: None,
            stats: CallStats::default(),
            page_log: Mutex::new(HashMap::new()),
        }
    }

    /// Set the authenticated user, creating it if needed
    pub fn with_viewer(mut self, login: &str) -> Self {
        let state = self.state.get_mut();
        state.ensure_user(login);
        state.viewer = Some(login.to_string());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Delay every call by `latency` to widen concurrency windows
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert or replace a profile
    pub fn add_user(&mut self, user: UserRef) -> &mut Self {
        self.state.get_mut().users.insert(user.login.clone(), user);
        self
    }

    /// Record that `source` follows `target`; unknown users are created
    pub fn follow(&mut self, source: &str, target: &str) -> &mut Self {
        let state = self.state.get_mut();
        state.ensure_user(source);
        state.ensure_user(target);
        state
            .follows
            .entry(source.to_string())
            .or_default()
            .push(target.to_string());
        *state.followers.entry(target.to_string()).or_insert(0) += 1;
        self
    }

    /// Record `source` following every login in `targets`
    pub fn follow_all<'a>(&mut self, source: &str, targets: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for target in targets {
            self.follow(source, target);
        }
        self
    }

    /// Pin the `following` total a profile reports, independent of its list
    pub fn set_reported_following(&mut self, login: &str, following: u64) -> &mut Self {
        self.state
            .get_mut()
            .reported_following
            .insert(login.to_string(), following);
        self
    }

    /// Make profile lookups of `login` fail
    pub fn fail_profile(&mut self, login: &str, kind: FailureKind) -> &mut Self {
        self.state.get_mut().profile_failures.insert(login.to_string(), kind);
        self
    }

    /// Make followings-page lookups of `login` fail
    pub fn fail_followings(&mut self, login: &str, kind: FailureKind) -> &mut Self {
        self.state
            .get_mut()
            .followings_failures
            .insert(login.to_string(), kind);
        self
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }

    /// Number of followings pages fetched for `login` so far
    pub fn pages_fetched_for(&self, login: &str) -> u32 {
        let log = self.page_log.lock().unwrap_or_else(|e| e.into_inner());
        log.get(login).copied().unwrap_or(0)
    }

    /// Highest number of followings-page calls observed in flight at once
    pub fn peak_pages_in_flight(&self) -> usize {
        self.stats.peak_pages_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl GraphClient for EmbeddedClient {
    async fn fetch_viewer(&self) -> SdkResult<UserRef> {
        self.stats.viewer_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        let state = self.state.read().await;
        let login = state
            .viewer
            .clone()
            .ok_or_else(|| SdkError::Unauthorized("no viewer configured".to_string()))?;
        state.profile(&login)
    }

    async fn fetch_profile(&self, login: &str) -> SdkResult<UserRef> {
        self.stats.profile_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        self.state.read().await.profile(login)
    }

    async fn fetch_followings_page(&self, login: &str, page: u32) -> SdkResult<Vec<FollowingUser>> {
        self.stats.page_calls.fetch_add(1, Ordering::Relaxed);
        {
            let mut log = self.page_log.lock().unwrap_or_else(|e| e.into_inner());
            *log.entry(login.to_string()).or_insert(0) += 1;
        }

        let in_flight = self.stats.pages_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_pages_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.simulate_latency().await;
        self.stats.pages_in_flight.fetch_sub(1, Ordering::SeqCst);

        let state = self.state.read().await;
        if let Some(kind) = state.followings_failures.get(login) {
            return Err(kind.to_error(login));
        }
        if !state.users.contains_key(login) {
            return Err(SdkError::NotFound(login.to_string()));
        }

        let follows = state.follows.get(login).map(Vec::as_slice).unwrap_or(&[]);
        let page_size = self.page_size as usize;
        let start = (page.saturating_sub(1) as usize).saturating_mul(page_size);
        if page == 0 || start >= follows.len() {
            return Ok(Vec::new());
        }
        let end = (start + page_size).min(follows.len());

        Ok(follows[start..end]
            .iter()
            .map(|target| match state.users.get(target) {
                Some(user) => FollowingUser::from(user),
                None => FollowingUser {
                    login: target.clone(),
                    ..Default::default()
                },
            })
            .collect())
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_viewer_and_derived_counts() {
        let mut client = EmbeddedClient::new().with_viewer("me");
        client.follow_all("me", ["a", "b"]).follow("a", "b");

        let me = client.fetch_viewer().await.unwrap();
        assert_eq!(me.login, "me");
        assert_eq!(me.following, 2);

        let b = client.fetch_profile("b").await.unwrap();
        assert_eq!(b.followers, 2);
        assert_eq!(b.following, 0);
    }

    #[tokio::test]
    async fn test_missing_viewer_is_unauthorized() {
        let client = EmbeddedClient::new();
        let err = client.fetch_viewer().await.unwrap_err();
        assert!(matches!(err, SdkError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_pagination() {
        let mut client = EmbeddedClient::new().with_page_size(2);
        client.follow_all("u", ["a", "b", "c"]);

        let p1 = client.fetch_followings_page("u", 1).await.unwrap();
        let p2 = client.fetch_followings_page("u", 2).await.unwrap();
        let p3 = client.fetch_followings_page("u", 3).await.unwrap();

        assert_eq!(p1.iter().map(|f| f.login.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(p2.iter().map(|f| f.login.as_str()).collect::<Vec<_>>(), ["c"]);
        assert!(p3.is_empty());
        assert_eq!(client.pages_fetched_for("u"), 3);
        assert_eq!(client.stats().page_calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_explicit_followers_and_reported_following() {
        let mut user = UserRef::new("star");
        user.followers = 5000;
        let mut client = EmbeddedClient::new();
        client.add_user(user).follow("x", "star").set_reported_following("star", 1200);

        let star = client.fetch_profile("star").await.unwrap();
        assert_eq!(star.followers, 5000);
        assert_eq!(star.following, 1200);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mut client = EmbeddedClient::new();
        client
            .follow("a", "b")
            .fail_profile("a", FailureKind::RateLimited)
            .fail_followings("b", FailureKind::Transport);

        assert!(client.fetch_profile("a").await.unwrap_err().is_rate_limit());
        assert!(client.fetch_profile("ghost").await.unwrap_err().is_not_found());

        let err = client.fetch_followings_page("b", 1).await.unwrap_err();
        assert!(matches!(err, SdkError::Status { status: 502, .. }));
    }
}
