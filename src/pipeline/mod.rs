//! Two-hop recommendation pipeline
//!
//! Stages, in order:
//!
//! 1. `first_degree`: pages the reference users' followings onto a bounded
//!    stream and builds the exclusion set.
//! 2. `expansion`: a fixed pool of workers resolves each streamed user and
//!    counts the accounts it follows.
//! 3. Barrier: both the producer's handle and every worker are joined.
//! 4. `resolver`: filters the frozen counts and resolves the candidates.
//!
//! All mutable state (counter, exclusion set, claimed logins, statistics)
//! is created inside `RecommendationPipeline::run` and dropped with it.

pub mod counter;
pub mod expansion;
pub mod first_degree;
pub mod resolver;
pub mod stats;

use dashmap::DashSet;
use followscout_sdk::{FollowingUser, GraphClient, SdkResult, UserRef};
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

pub use counter::{FrequencyCounter, FrequencySnapshot};
pub use first_degree::FirstDegreeSet;
pub use resolver::{rank_by_followers, select_candidates, Candidate, ResolutionFailure};
pub use stats::PipelineStats;

use stats::RunStats;

/// The accounts a run is computed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceUsers {
    /// Authenticated user; their followings form the exclusion set
    pub viewer: UserRef,
    /// User whose followings are expanded; defaults to the viewer
    pub entry: UserRef,
}

impl ReferenceUsers {
    /// Use the viewer as its own entry user
    pub fn viewer_only(viewer: UserRef) -> Self {
        Self {
            entry: viewer.clone(),
            viewer,
        }
    }

    /// Logins on this platform are case-insensitive
    pub fn is_same_identity(&self) -> bool {
        self.viewer.login.eq_ignore_ascii_case(&self.entry.login)
    }
}

/// Output of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    /// Resolved candidates, most followers first
    pub candidates: Vec<Candidate>,
    /// Candidates dropped because their profile could not be fetched
    pub failures: Vec<ResolutionFailure>,
    pub stats: PipelineStats,
}

/// Per-run shared state handed to every stage and task
#[derive(Clone)]
pub(crate) struct RunContext {
    pub client: Arc<dyn GraphClient>,
    pub config: Arc<PipelineConfig>,
    pub token: CancellationToken,
    pub page_permits: Arc<Semaphore>,
    pub stats: Arc<RunStats>,
    claimed: Arc<DashSet<String, FxBuildHasher>>,
}

impl RunContext {
    fn new(client: Arc<dyn GraphClient>, config: PipelineConfig, token: CancellationToken) -> Self {
        Self {
            client,
            page_permits: Arc::new(Semaphore::new(config.page_budget)),
            config: Arc::new(config),
            token,
            stats: Arc::new(RunStats::default()),
            claimed: Arc::new(DashSet::with_hasher(FxBuildHasher)),
        }
    }

    /// Race a remote call against cancellation
    pub async fn guarded<T, F, C>(&self, call: F, context: C) -> PipelineResult<T>
    where
        F: Future<Output = SdkResult<T>>,
        C: FnOnce() -> String,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(PipelineError::Cancelled),
            result = call => result.map_err(|e| PipelineError::from_sdk(context(), e)),
        }
    }

    /// Fetch one followings page under the shared page budget
    pub async fn fetch_page(&self, login: &str, page: u32) -> PipelineResult<Vec<FollowingUser>> {
        let _permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(PipelineError::Cancelled),
            permit = self.page_permits.acquire() => permit.map_err(|_| PipelineError::Cancelled)?,
        };
        let entries = self
            .guarded(self.client.fetch_followings_page(login, page), || {
                format!("fetching followings page {} of {}", page, login)
            })
            .await?;
        self.stats.record_page();
        debug!(login, page, entries = entries.len(), "Fetched followings page");
        Ok(entries)
    }

    /// Mark a first-degree login as taken; false if another worker has it
    pub fn claim(&self, login: &str) -> bool {
        self.claimed.insert(login.to_ascii_lowercase())
    }
}

/// Recommends accounts reachable through many of the entry user's followings.
///
/// # Example
///
/// ```rust
/// use followscout::{PipelineConfig, RecommendationPipeline};
/// use followscout_sdk::EmbeddedClient;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let mut client = EmbeddedClient::new().with_viewer("me");
///     client.follow_all("me", ["a", "b", "c"]);
///     for friend in ["a", "b", "c"] {
///         client.follow(friend, "x");
///     }
///
///     let pipeline = RecommendationPipeline::new(
///         Arc::new(client),
///         PipelineConfig::default().with_threshold(2),
///     );
///     let refs = pipeline.resolve_reference_users(None).await.unwrap();
///     let recs = pipeline.run(&refs).await.unwrap();
///     assert_eq!(recs.candidates[0].user.login, "x");
/// }
/// ```
pub struct RecommendationPipeline {
    client: Arc<dyn GraphClient>,
    config: PipelineConfig,
    shutdown: CancellationToken,
}

impl RecommendationPipeline {
    pub fn new(client: Arc<dyn GraphClient>, config: PipelineConfig) -> Self {
        Self {
            client,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Tie runs to an external token (e.g. cancelled on Ctrl-C)
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch the viewer and, when named and distinct, the entry user
    pub async fn resolve_reference_users(&self, entry: Option<&str>) -> PipelineResult<ReferenceUsers> {
        let viewer = self
            .client
            .fetch_viewer()
            .await
            .map_err(|e| PipelineError::setup("fetching the authenticated user", e))?;
        info!(login = %viewer.login, following = viewer.following, "Resolved viewer");

        let entry = match entry.map(str::trim).filter(|login| !login.is_empty()) {
            None => return Ok(ReferenceUsers::viewer_only(viewer)),
            Some(login) if login.eq_ignore_ascii_case(&viewer.login) => {
                return Ok(ReferenceUsers::viewer_only(viewer))
            }
            Some(login) => self
                .client
                .fetch_profile(login)
                .await
                .map_err(|e| PipelineError::setup(format!("fetching entry user {}", login), e))?,
        };
        info!(login = %entry.login, following = entry.following, "Resolved entry user");

        Ok(ReferenceUsers { viewer, entry })
    }

    /// Run the pipeline once for `refs`
    pub async fn run(&self, refs: &ReferenceUsers) -> PipelineResult<Recommendations> {
        self.config.validate()?;
        let started = Instant::now();
        let ctx = RunContext::new(
            Arc::clone(&self.client),
            self.config.clone(),
            self.shutdown.child_token(),
        );

        info!(
            viewer = %refs.viewer.login,
            entry = %refs.entry.login,
            threshold = self.config.threshold,
            "Starting recommendation run"
        );

        let stream = first_degree::spawn_producer(&ctx, refs);
        let expanded = expansion::expand(&ctx, stream.receiver).await;
        if expanded.is_err() {
            ctx.token.cancel();
        }
        let recorded = stream
            .completion
            .await
            .unwrap_or_else(|e| Err(PipelineError::Worker(format!("first-degree producer failed: {}", e))));

        // Both completions observed; nothing writes the counts or the set past here
        let (snapshot, first_degree) = match (expanded, recorded) {
            (Ok(snapshot), Ok(first_degree)) => (snapshot, first_degree),
            (Err(a), Err(b)) => return Err(b.prefer(a)),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
        };

        let mut excluded = Vec::new();
        if self.config.exclude_reference_users {
            excluded.push(refs.viewer.login.as_str());
            excluded.push(refs.entry.login.as_str());
        }
        let selected = select_candidates(&snapshot, &first_degree, self.config.threshold, &excluded);
        info!(
            distinct = snapshot.len(),
            first_degree = first_degree.len(),
            qualifying = selected.len(),
            "Aggregation complete, resolving candidates"
        );

        let mut stats = PipelineStats::from_run(&ctx.stats);
        stats.first_degree_set = first_degree.len() as u64;
        stats.distinct_second_degree = snapshot.len() as u64;
        stats.qualifying = selected.len() as u64;

        let (candidates, failures) = resolver::resolve_candidates(&ctx, selected).await?;

        stats.resolved = candidates.len() as u64;
        stats.resolution_failures = failures.len() as u64;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            candidates = candidates.len(),
            failures = failures.len(),
            elapsed_ms = stats.elapsed_ms,
            "Recommendation run finished"
        );

        Ok(Recommendations {
            candidates,
            failures,
            stats,
        })
    }
}
