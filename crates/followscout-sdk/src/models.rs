//! Data models for the followscout SDK
//!
//! These types mirror the user documents returned by the platform API and
//! are produced by both `RemoteClient` and `EmbeddedClient`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public web host used to derive profile URLs for locally built users
pub const PROFILE_HOST: &str = "https://github.com";

/// A full user profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// Unique login name
    pub login: String,
    /// Numeric account ID
    #[serde(default)]
    pub id: u64,
    /// Profile page URL
    #[serde(default)]
    pub html_url: String,
    /// Account type ("User" or "Organization")
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub site_admin: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub hireable: Option<bool>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub twitter_username: Option<String>,
    /// Number of public repositories
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub public_gists: u64,
    /// Number of accounts following this user
    #[serde(default)]
    pub followers: u64,
    /// Number of accounts this user follows
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserRef {
    /// Create a bare profile for `login` with a derived profile URL
    pub fn new(login: impl Into<String>) -> Self {
        let login = login.into();
        Self {
            html_url: format!("{}/{}", PROFILE_HOST, login),
            kind: "User".to_string(),
            login,
            ..Default::default()
        }
    }

    /// Number of followings pages of `page_size` needed to list every followed account
    pub fn following_pages(&self, page_size: u32) -> u32 {
        if page_size == 0 {
            return 0;
        }
        let pages = self.following.div_ceil(u64::from(page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

/// A followings-list entry (summary form of a user)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowingUser {
    pub login: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub html_url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub site_admin: bool,
}

impl From<&UserRef> for FollowingUser {
    fn from(user: &UserRef) -> Self {
        Self {
            login: user.login.clone(),
            id: user.id,
            html_url: user.html_url.clone(),
            kind: user.kind.clone(),
            site_admin: user.site_admin,
        }
    }
}
