//! Bounded expansion pool
//!
//! A fixed number of workers drain the first-degree stream. Each worker
//! resolves a first-degree user's profile, skips users above the fan-out
//! cap, and otherwise counts every distinct account that user follows.

use followscout_sdk::{FollowingUser, UserRef};
use futures::future::try_join_all;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::counter::{FrequencyCounter, FrequencySnapshot};
use super::RunContext;
use crate::error::{PipelineError, PipelineResult};

type SharedReceiver = Arc<Mutex<mpsc::Receiver<FollowingUser>>>;

/// Run `config.workers` workers until the stream is closed and drained.
///
/// Returns only after every worker has finished. The first failure cancels
/// the run token so siblings stop at their next remote call.
pub(crate) async fn expand(
    ctx: &RunContext,
    receiver: mpsc::Receiver<FollowingUser>,
) -> PipelineResult<FrequencySnapshot> {
    let counter = Arc::new(FrequencyCounter::new());
    let receiver: SharedReceiver = Arc::new(Mutex::new(receiver));
    let workers = ctx.config.workers;

    info!(workers, fan_out_cap = ctx.config.fan_out_cap, "Starting expansion pool");

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        let ctx = ctx.clone();
        let counter = Arc::clone(&counter);
        let receiver = Arc::clone(&receiver);
        pool.spawn(async move {
            let result = run_worker(worker_id, &ctx, &counter, &receiver).await;
            if let Err(ref e) = result {
                if !e.is_cancelled() {
                    error!(worker_id, "Expansion worker failed: {}", e);
                }
                ctx.token.cancel();
            }
            result
        });
    }
    // Workers hold the remaining handles
    drop(receiver);

    let mut failure: Option<PipelineError> = None;
    while let Some(joined) = pool.join_next().await {
        let outcome = joined.unwrap_or_else(|e| Err(PipelineError::Worker(format!("expansion worker failed: {}", e))));
        if let Err(e) = outcome {
            ctx.token.cancel();
            failure = Some(match failure {
                Some(first) => first.prefer(e),
                None => e,
            });
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }

    let counter = Arc::try_unwrap(counter)
        .map_err(|_| PipelineError::Worker("frequency counter still shared after expansion".to_string()))?;
    let snapshot = counter.into_snapshot();
    info!(distinct = snapshot.len(), "Expansion complete");
    Ok(snapshot)
}

async fn run_worker(
    worker_id: usize,
    ctx: &RunContext,
    counter: &FrequencyCounter,
    receiver: &SharedReceiver,
) -> PipelineResult<()> {
    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => return Err(PipelineError::Cancelled),
            next = async { receiver.lock().await.recv().await } => next,
        };

        let Some(user) = next else {
            debug!(worker_id, "Stream drained, worker exiting");
            return Ok(());
        };

        if !ctx.claim(&user.login) {
            debug!(worker_id, login = %user.login, "Already expanded, skipping");
            ctx.stats.record_duplicate();
            continue;
        }

        expand_user(ctx, counter, &user.login).await?;
    }
}

/// Count the distinct accounts followed by one first-degree user
async fn expand_user(ctx: &RunContext, counter: &FrequencyCounter, login: &str) -> PipelineResult<()> {
    let profile = ctx
        .guarded(ctx.client.fetch_profile(login), || format!("fetching profile of {}", login))
        .await?;

    if profile.following > ctx.config.fan_out_cap {
        warn!(
            login,
            following = profile.following,
            cap = ctx.config.fan_out_cap,
            "Skipping high fan-out user"
        );
        ctx.stats.record_skip();
        return Ok(());
    }

    let followings = fetch_followings(ctx, &profile).await?;
    for target in &followings {
        counter.increment(target);
    }
    ctx.stats.record_expanded();
    debug!(login, distinct = followings.len(), "Expanded");
    Ok(())
}

/// Fetch every page of `user`'s followings concurrently, deduplicated.
///
/// Pagination may repeat an entry across pages; the set keeps one
/// increment per login for this user.
async fn fetch_followings(ctx: &RunContext, user: &UserRef) -> PipelineResult<FxHashSet<String>> {
    let pages = user.following_pages(ctx.client.page_size());
    let fetched = try_join_all((1..=pages).map(|page| ctx.fetch_page(&user.login, page))).await?;

    let mut logins = FxHashSet::default();
    let mut entries = 0usize;
    for entry in fetched.into_iter().flatten() {
        entries += 1;
        logins.insert(entry.login);
    }
    if entries > logins.len() {
        warn!(
            login = %user.login,
            repeated = entries - logins.len(),
            "Followings pages repeated entries"
        );
    }
    Ok(logins)
}
