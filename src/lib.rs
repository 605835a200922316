//! followscout
//!
//! Recommends accounts to follow by aggregating the two-hop follow graph
//! around a user: the accounts followed by the accounts you follow.
//!
//! # Architecture
//!
//! - The follow graph is read through `followscout_sdk::GraphClient`
//!   (`RemoteClient` over HTTP, `EmbeddedClient` in memory).
//! - `pipeline` streams first-degree followings into a bounded worker pool,
//!   counts second-degree followings concurrently, waits on an explicit
//!   completion barrier, then resolves and ranks the qualifying candidates.
//! - A run owns all of its state; nothing is shared between runs.
//!
//! ## Example Usage
//!
//! ```rust
//! use followscout::{PipelineConfig, RecommendationPipeline};
//! use followscout_sdk::EmbeddedClient;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut client = EmbeddedClient::new().with_viewer("me");
//! client.follow_all("me", ["a", "b"]);
//! client.follow("a", "x").follow("b", "x");
//!
//! let pipeline = RecommendationPipeline::new(Arc::new(client), PipelineConfig::default().with_threshold(1));
//! let refs = pipeline.resolve_reference_users(None).await.unwrap();
//! let recs = pipeline.run(&refs).await.unwrap();
//!
//! assert_eq!(recs.candidates.len(), 1);
//! assert_eq!(recs.candidates[0].shared, 2);
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    Candidate, FirstDegreeSet, FrequencyCounter, FrequencySnapshot, PipelineStats,
    Recommendations, RecommendationPipeline, ReferenceUsers, ResolutionFailure,
    rank_by_followers, select_candidates,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
