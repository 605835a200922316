//! First-degree stream producer
//!
//! Pages through the followings of the reference users with one task per
//! page, forwarding entries to the expansion workers as they arrive and
//! recording the viewer's followings into the exclusion set.

use dashmap::DashSet;
use followscout_sdk::FollowingUser;
use rustc_hash::{FxBuildHasher, FxHashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use super::{ReferenceUsers, RunContext};
use crate::error::{PipelineError, PipelineResult};

/// Logins the viewer already follows.
///
/// Only obtainable from the producer's completion handle, after every
/// page of the viewer's followings has been recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstDegreeSet {
    logins: FxHashSet<String>,
}

impl FirstDegreeSet {
    pub fn contains(&self, login: &str) -> bool {
        self.logins.contains(login)
    }

    pub fn len(&self) -> usize {
        self.logins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.logins.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FirstDegreeSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            logins: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// What happens to the entries of one reference user's followings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Route {
    record: bool,
    forward: bool,
}

/// Receiving end of the producer plus its completion barrier
pub(crate) struct FirstDegreeStream {
    pub receiver: mpsc::Receiver<FollowingUser>,
    pub completion: JoinHandle<PipelineResult<FirstDegreeSet>>,
}

/// Start paging the reference users' followings.
///
/// When viewer and entry are the same account its followings are both
/// recorded and forwarded. Otherwise the viewer's are only recorded and
/// the entry's only forwarded. The stream closes once, after the last
/// page task of every reference user has finished.
pub(crate) fn spawn_producer(ctx: &RunContext, refs: &ReferenceUsers) -> FirstDegreeStream {
    let (sender, receiver) = mpsc::channel(ctx.config.stream_capacity);

    let routes = if refs.is_same_identity() {
        vec![(refs.viewer.clone(), Route { record: true, forward: true })]
    } else {
        vec![
            (refs.viewer.clone(), Route { record: true, forward: false }),
            (refs.entry.clone(), Route { record: false, forward: true }),
        ]
    };

    let ctx = ctx.clone();
    let completion = tokio::spawn(async move {
        let recorder: Arc<DashSet<String, FxBuildHasher>> = Arc::new(DashSet::with_hasher(FxBuildHasher));
        let page_size = ctx.client.page_size();
        let mut pages = JoinSet::new();

        for (user, route) in routes {
            let page_count = user.following_pages(page_size);
            info!(
                login = %user.login,
                following = user.following,
                pages = page_count,
                record = route.record,
                forward = route.forward,
                "Paging first-degree followings"
            );

            for page in 1..=page_count {
                let ctx = ctx.clone();
                let login = user.login.clone();
                let recorder = Arc::clone(&recorder);
                let sender = sender.clone();
                pages.spawn(async move {
                    let entries = ctx.fetch_page(&login, page).await?;
                    for entry in entries {
                        if route.record {
                            recorder.insert(entry.login.clone());
                        }
                        if route.forward {
                            forward(&ctx, &sender, entry).await?;
                        }
                    }
                    Ok::<(), PipelineError>(())
                });
            }
        }

        // Page tasks own the only other senders
        drop(sender);

        let mut failure: Option<PipelineError> = None;
        while let Some(joined) = pages.join_next().await {
            let outcome = joined.unwrap_or_else(|e| Err(PipelineError::Worker(format!("page task failed: {}", e))));
            if let Err(e) = outcome {
                if !e.is_cancelled() {
                    error!("First-degree paging failed: {}", e);
                }
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

        let recorder = Arc::try_unwrap(recorder)
            .map_err(|_| PipelineError::Worker("first-degree set still shared after paging".to_string()))?;
        let set: FirstDegreeSet = recorder.into_iter().collect();
        debug!(size = set.len(), "First-degree set complete");
        Ok(set)
    });

    FirstDegreeStream { receiver, completion }
}

async fn forward(
    ctx: &RunContext,
    sender: &mpsc::Sender<FollowingUser>,
    entry: FollowingUser,
) -> PipelineResult<()> {
    tokio::select! {
        biased;
        _ = ctx.token.cancelled() => Err(PipelineError::Cancelled),
        sent = sender.send(entry) => {
            // A closed channel means every worker has already stopped
            sent.map_err(|_| PipelineError::Cancelled)?;
            ctx.stats.record_streamed();
            Ok(())
        }
    }
}
