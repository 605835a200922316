//! Concurrency properties: order independence and prompt group cancellation

use async_trait::async_trait;
use followscout::{PipelineConfig, PipelineError, RecommendationPipeline};
use followscout_sdk::{EmbeddedClient, FollowingUser, GraphClient, SdkError, SdkResult, UserRef};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Random follow graph: (viewer followings, per-user followings)
fn random_graph(seed: u64) -> (Vec<String>, HashMap<String, Vec<String>>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let population: Vec<String> = (0..80).map(|i| format!("user{}", i)).collect();

    let mut first_degree: Vec<String> = population.choose_multiple(&mut rng, 25).cloned().collect();
    first_degree.sort();

    let mut follows = HashMap::new();
    for login in &population {
        let count = rng.gen_range(0..20);
        let targets: Vec<String> = population.choose_multiple(&mut rng, count).cloned().collect();
        follows.insert(login.clone(), targets);
    }
    (first_degree, follows)
}

/// Build an embedded client, inserting edges in a shuffled order
fn build_client(
    first_degree: &[String],
    follows: &HashMap<String, Vec<String>>,
    rng: &mut StdRng,
    latency: Option<Duration>,
) -> EmbeddedClient {
    let mut client = EmbeddedClient::new().with_viewer("viewer").with_page_size(4);
    if let Some(latency) = latency {
        client = client.with_latency(latency);
    }

    let mut viewer_follows = first_degree.to_vec();
    viewer_follows.shuffle(rng);
    for target in &viewer_follows {
        client.follow("viewer", target);
    }

    let mut sources: Vec<&String> = follows.keys().collect();
    sources.shuffle(rng);
    for source in sources {
        for target in &follows[source] {
            client.follow(source, target);
        }
    }
    client
}

fn expected_counts(first_degree: &[String], follows: &HashMap<String, Vec<String>>) -> HashMap<String, u64> {
    let excluded: HashSet<&String> = first_degree.iter().collect();
    let mut counts = HashMap::new();
    for user in first_degree {
        let distinct: HashSet<&String> = follows[user].iter().collect();
        for target in distinct {
            *counts.entry(target.clone()).or_insert(0) += 1;
        }
    }
    counts.retain(|login, _| !excluded.contains(login) && login != "viewer");
    counts
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_counts_independent_of_arrival_order_and_worker_count() {
    let (first_degree, follows) = random_graph(7);
    let expected = expected_counts(&first_degree, &follows);
    assert!(!expected.is_empty());

    let mut rng = StdRng::seed_from_u64(99);
    for (workers, latency) in [(1, None), (4, Some(Duration::from_millis(1))), (32, Some(Duration::from_millis(2)))] {
        let client = build_client(&first_degree, &follows, &mut rng, latency);
        let config = PipelineConfig {
            threshold: 0,
            workers,
            page_budget: 8,
            ..Default::default()
        };
        let pipeline = RecommendationPipeline::new(Arc::new(client), config);
        let refs = pipeline.resolve_reference_users(None).await.unwrap();
        let recs = pipeline.run(&refs).await.unwrap();

        let actual: HashMap<String, u64> = recs
            .candidates
            .iter()
            .map(|c| (c.user.login.clone(), c.shared))
            .collect();
        assert_eq!(actual, expected, "workers = {}", workers);

        for pair in recs.candidates.windows(2) {
            assert!(pair[0].user.followers >= pair[1].user.followers);
        }
    }
}

/// Fails one first-degree profile immediately and stalls every other call
struct StallingClient {
    inner: EmbeddedClient,
    stall: Duration,
    stalled_calls: AtomicU64,
}

#[async_trait]
impl GraphClient for StallingClient {
    async fn fetch_viewer(&self) -> SdkResult<UserRef> {
        self.inner.fetch_viewer().await
    }

    async fn fetch_profile(&self, login: &str) -> SdkResult<UserRef> {
        if login == "broken" {
            return Err(SdkError::Status {
                status: 500,
                message: "boom".to_string(),
            });
        }
        self.stalled_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.stall).await;
        self.inner.fetch_profile(login).await
    }

    async fn fetch_followings_page(&self, login: &str, page: u32) -> SdkResult<Vec<FollowingUser>> {
        self.inner.fetch_followings_page(login, page).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_first_failure_cancels_stalled_siblings() {
    let mut inner = EmbeddedClient::new().with_viewer("viewer");
    inner.follow_all("viewer", ["slow1", "slow2", "slow3", "broken", "slow4"]);
    let client = Arc::new(StallingClient {
        inner,
        stall: Duration::from_secs(30),
        stalled_calls: AtomicU64::new(0),
    });

    let config = PipelineConfig {
        threshold: 0,
        workers: 8,
        ..Default::default()
    };
    let pipeline = RecommendationPipeline::new(client.clone(), config);
    let refs = pipeline.resolve_reference_users(None).await.unwrap();

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(10), pipeline.run(&refs)).await;
    let err = outcome.expect("run should stop long before the stalled calls return").unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        PipelineError::Transport { context, .. } => assert!(context.contains("broken")),
        other => panic!("expected transport error, got {:?}", other),
    }
}

/// Delays profile lookups of one login
struct SlowProfileClient {
    inner: EmbeddedClient,
    slow_login: &'static str,
}

#[async_trait]
impl GraphClient for SlowProfileClient {
    async fn fetch_viewer(&self) -> SdkResult<UserRef> {
        self.inner.fetch_viewer().await
    }

    async fn fetch_profile(&self, login: &str) -> SdkResult<UserRef> {
        if login == self.slow_login {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        self.inner.fetch_profile(login).await
    }

    async fn fetch_followings_page(&self, login: &str, page: u32) -> SdkResult<Vec<FollowingUser>> {
        self.inner.fetch_followings_page(login, page).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_follower_ties_ordered_by_login_regardless_of_lookup_speed() {
    let mut inner = EmbeddedClient::new().with_viewer("viewer");
    for login in ["tie_a", "tie_b"] {
        let mut user = UserRef::new(login);
        user.followers = 50;
        inner.add_user(user);
    }
    inner.follow_all("viewer", ["f1", "f2"]);
    for friend in ["f1", "f2"] {
        inner.follow_all(friend, ["tie_a", "tie_b"]);
    }

    let client = Arc::new(SlowProfileClient { inner, slow_login: "tie_a" });
    let pipeline = RecommendationPipeline::new(client, PipelineConfig::default().with_threshold(1));
    let refs = pipeline.resolve_reference_users(None).await.unwrap();
    let recs = pipeline.run(&refs).await.unwrap();

    let logins: Vec<_> = recs.candidates.iter().map(|c| c.user.login.as_str()).collect();
    assert_eq!(logins, ["tie_a", "tie_b"]);
}
