//! Pipeline error types

use chrono::{DateTime, Utc};
use followscout_sdk::SdkError;
use thiserror::Error;

/// Errors that abort a recommendation run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The viewer or entry user could not be resolved before the run started
    #[error("Setup error: {0}")]
    Setup(String),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The API rate limit was hit; never retried
    #[error("Rate limit exceeded{}", reset_suffix(.reset_at))]
    RateLimited {
        reset_at: Option<DateTime<Utc>>,
    },

    /// A remote call failed while paging or expanding
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: SdkError,
    },

    /// The run was cancelled before it finished
    #[error("Run cancelled")]
    Cancelled,

    /// A worker task panicked or outlived the completion barrier
    #[error("Worker failure: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Wrap an SDK error raised while paging or expanding.
    ///
    /// Rate-limit refusals keep their own variant wherever they occur.
    pub fn from_sdk(context: impl Into<String>, err: SdkError) -> Self {
        match err {
            SdkError::RateLimited { reset_at } => PipelineError::RateLimited { reset_at },
            source => PipelineError::Transport {
                context: context.into(),
                source,
            },
        }
    }

    /// Wrap an SDK error raised while resolving the reference users
    pub fn setup(context: impl Into<String>, err: SdkError) -> Self {
        match err {
            SdkError::RateLimited { reset_at } => PipelineError::RateLimited { reset_at },
            other => PipelineError::Setup(format!("{}: {}", context.into(), other)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, PipelineError::RateLimited { .. })
    }

    /// Keep the more informative of two errors; `Cancelled` only wins alone
    pub(crate) fn prefer(self, other: PipelineError) -> PipelineError {
        if self.is_cancelled() && !other.is_cancelled() {
            other
        } else {
            self
        }
    }
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    reset_at
        .map(|at| format!(" (resets at {})", at.to_rfc3339()))
        .unwrap_or_default()
}

pub type PipelineResult<T> = Result<T, PipelineError>;
