//! Run statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters updated by the pipeline stages while a run is in progress
#[derive(Debug, Default)]
pub(crate) struct RunStats {
    pub first_degree_streamed: AtomicU64,
    pub first_degree_duplicates: AtomicU64,
    pub expanded: AtomicU64,
    pub skipped_fan_out: AtomicU64,
    pub pages_fetched: AtomicU64,
}

impl RunStats {
    pub fn record_streamed(&self) {
        self.first_degree_streamed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.first_degree_duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expanded(&self) {
        self.expanded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped_fan_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// First-degree users forwarded to the expansion workers
    pub first_degree_streamed: u64,
    /// Forwarded users that had already been claimed by a worker
    pub first_degree_duplicates: u64,
    /// Size of the exclusion set built from the viewer's followings
    pub first_degree_set: u64,
    /// First-degree users whose followings were counted
    pub expanded: u64,
    /// First-degree users skipped because they follow too many accounts
    pub skipped_fan_out: u64,
    /// Followings pages fetched across the producer and the workers
    pub pages_fetched: u64,
    /// Distinct logins seen at the second degree
    pub distinct_second_degree: u64,
    /// Logins above the threshold and outside the exclusion set
    pub qualifying: u64,
    pub resolved: u64,
    pub resolution_failures: u64,
    pub elapsed_ms: u64,
}

impl PipelineStats {
    pub(crate) fn from_run(stats: &RunStats) -> Self {
        Self {
            first_degree_streamed: stats.first_degree_streamed.load(Ordering::Relaxed),
            first_degree_duplicates: stats.first_degree_duplicates.load(Ordering::Relaxed),
            expanded: stats.expanded.load(Ordering::Relaxed),
            skipped_fan_out: stats.skipped_fan_out.load(Ordering::Relaxed),
            pages_fetched: stats.pages_fetched.load(Ordering::Relaxed),
            ..Default::default()
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}
