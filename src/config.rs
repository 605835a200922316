//! Pipeline configuration

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Tunables for one recommendation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// A candidate qualifies only with a shared count strictly above this
    pub threshold: u64,
    /// Number of expansion workers
    pub workers: usize,
    /// First-degree users following more accounts than this are not expanded
    pub fan_out_cap: u64,
    /// Followings-page fetches allowed in flight at once, across all stages
    pub page_budget: usize,
    /// Candidate profiles resolved concurrently
    pub resolve_concurrency: usize,
    /// Buffered first-degree users between the producer and the workers
    pub stream_capacity: usize,
    /// Drop the viewer and entry logins from the candidates
    pub exclude_reference_users: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            workers: 200,
            fan_out_cap: 300,
            page_budget: 400,
            resolve_concurrency: 32,
            stream_capacity: 1024,
            exclude_reference_users: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let zero = [
            ("workers", self.workers),
            ("page_budget", self.page_budget),
            ("resolve_concurrency", self.resolve_concurrency),
            ("stream_capacity", self.stream_capacity),
        ];
        match zero.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(PipelineError::Config(format!("{} must be at least 1", name))),
            None => Ok(()),
        }
    }
}
