//! followscout SDK: follow-graph client library
//!
//! Provides two client implementations:
//!
//! - **`RemoteClient`**: talks to the platform REST API over HTTP with a
//!   personal access token. For production runs.
//!
//! - **`EmbeddedClient`**: in-process, in-memory follow graph. Ideal for
//!   tests, demos and benchmarks.
//!
//! Both implement the `GraphClient` trait consumed by the recommendation
//! pipeline.
//!
//! # Quick Start
//!
//! ```rust
//! use followscout_sdk::{EmbeddedClient, GraphClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = EmbeddedClient::new().with_viewer("me");
//!     client.follow("me", "alice");
//!
//!     let me = client.fetch_viewer().await.unwrap();
//!     let page = client.fetch_followings_page("me", 1).await.unwrap();
//!     println!("{} follows {} account(s)", me.login, page.len());
//! }
//! ```

pub mod client;
pub mod embedded;
pub mod error;
pub mod models;
pub mod remote;

pub use client::{GraphClient, DEFAULT_PAGE_SIZE};
pub use embedded::{CallStats, EmbeddedClient, FailureKind};
pub use error::{SdkError, SdkResult};
pub use models::{FollowingUser, UserRef};
pub use remote::{RemoteClient, DEFAULT_API_URL};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
