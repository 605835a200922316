//! Candidate resolver
//!
//! Runs after the completion barrier: filters the frozen counts by the
//! threshold and the exclusion set, resolves the surviving profiles with a
//! bounded number of requests in flight, and ranks them by followers.

use followscout_sdk::UserRef;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::counter::FrequencySnapshot;
use super::first_degree::FirstDegreeSet;
use super::RunContext;
use crate::error::{PipelineError, PipelineResult};

/// A recommended account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub user: UserRef,
    /// Distinct first-degree users that follow this account
    pub shared: u64,
}

/// A candidate whose profile could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub login: String,
    pub message: String,
}

/// Logins with a count strictly above `threshold` that are neither in the
/// first-degree set nor in `excluded`, highest count first.
pub fn select_candidates(
    snapshot: &FrequencySnapshot,
    first_degree: &FirstDegreeSet,
    threshold: u64,
    excluded: &[&str],
) -> Vec<(String, u64)> {
    let mut selected: Vec<(String, u64)> = snapshot
        .iter()
        .filter(|(login, count)| {
            *count > threshold && !first_degree.contains(login) && !excluded.contains(login)
        })
        .map(|(login, count)| (login.to_string(), count))
        .collect();
    selected.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    selected
}

/// Order candidates by follower count, highest first.
///
/// Ties fall back to the shared count, then the login, so the order does
/// not depend on which lookup finished first.
pub fn rank_by_followers(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.user
            .followers
            .cmp(&a.user.followers)
            .then_with(|| b.shared.cmp(&a.shared))
            .then_with(|| a.user.login.cmp(&b.user.login))
    });
}

/// Resolve full profiles for the selected logins.
///
/// A failed lookup drops that candidate and is reported in the returned
/// failures; a rate-limit refusal aborts the whole stage.
pub(crate) async fn resolve_candidates(
    ctx: &RunContext,
    selected: Vec<(String, u64)>,
) -> PipelineResult<(Vec<Candidate>, Vec<ResolutionFailure>)> {
    let client = &ctx.client;
    let mut lookups = stream::iter(selected)
        .map(|(login, shared)| async move {
            let result = client.fetch_profile(&login).await;
            (login, shared, result)
        })
        .buffer_unordered(ctx.config.resolve_concurrency);

    let mut candidates = Vec::new();
    let mut failures = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => return Err(PipelineError::Cancelled),
            next = lookups.next() => next,
        };
        let Some((login, shared, result)) = next else {
            break;
        };

        match result {
            Ok(user) => {
                debug!(login = %user.login, shared, "Resolved candidate");
                candidates.push(Candidate { user, shared });
            }
            Err(e) if e.is_rate_limit() => {
                return Err(PipelineError::from_sdk(format!("resolving {}", login), e));
            }
            Err(e) => {
                warn!("Failed to resolve candidate {}: {}", login, e);
                failures.push(ResolutionFailure {
                    login,
                    message: e.to_string(),
                });
            }
        }
    }

    rank_by_followers(&mut candidates);
    Ok((candidates, failures))
}
