//! GraphClient trait: the unified interface for remote and embedded modes

use async_trait::async_trait;
use crate::error::SdkResult;
use crate::models::{FollowingUser, UserRef};

/// Number of entries the platform returns per followings page
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Read-only access to the follow graph.
///
/// Implemented by:
/// - `RemoteClient`: talks to the platform REST API over HTTP
/// - `EmbeddedClient`: in-process, in-memory graph (for tests, demos, benches)
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Fetch the profile of the authenticated user
    async fn fetch_viewer(&self) -> SdkResult<UserRef>;

    /// Fetch the profile of `login`
    async fn fetch_profile(&self, login: &str) -> SdkResult<UserRef>;

    /// Fetch one 1-based page of the accounts `login` follows
    async fn fetch_followings_page(&self, login: &str, page: u32) -> SdkResult<Vec<FollowingUser>>;

    /// Entries per followings page
    fn page_size(&self) -> u32 {
        DEFAULT_PAGE_SIZE
    }
}
