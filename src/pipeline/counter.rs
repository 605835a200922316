//! Concurrent frequency counter
//!
//! Workers share a `FrequencyCounter` behind an `Arc` and only ever call
//! `increment`. The counts become readable once the counter is consumed
//! into a `FrequencySnapshot`, which needs sole ownership, so no reader can
//! observe it while any worker still holds a handle.

use dashmap::DashMap;
use rustc_hash::{FxBuildHasher, FxHashMap};

/// login → number of distinct first-degree users following it
#[derive(Debug, Default)]
pub struct FrequencyCounter {
    counts: DashMap<String, u64, FxBuildHasher>,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self {
            counts: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Increment the count for `login`, starting at 1, and return the new value
    pub fn increment(&self, login: &str) -> u64 {
        if let Some(mut count) = self.counts.get_mut(login) {
            *count += 1;
            return *count;
        }
        let mut count = self.counts.entry(login.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Freeze the counts
    pub fn into_snapshot(self) -> FrequencySnapshot {
        FrequencySnapshot {
            counts: self.counts.into_iter().collect(),
        }
    }
}

/// Immutable counts taken after every increment has landed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencySnapshot {
    counts: FxHashMap<String, u64>,
}

impl FrequencySnapshot {
    pub fn get(&self, login: &str) -> u64 {
        self.counts.get(login).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(login, count)| (login.as_str(), *count))
    }
}

impl FromIterator<(String, u64)> for FrequencySnapshot {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_initializes_and_counts() {
        let counter = FrequencyCounter::new();
        assert_eq!(counter.increment("x"), 1);
        assert_eq!(counter.increment("x"), 2);
        assert_eq!(counter.increment("y"), 1);

        let snapshot = counter.into_snapshot();
        assert_eq!(snapshot.get("x"), 2);
        assert_eq!(snapshot.get("y"), 1);
        assert_eq!(snapshot.get("z"), 0);
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_increments_are_not_lost() {
        let counter = Arc::new(FrequencyCounter::new());

        let mut handles = Vec::new();
        for worker in 0..16 {
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                for i in 0..500 {
                    counter.increment("shared");
                    counter.increment(&format!("w{}-{}", worker, i % 10));
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = Arc::try_unwrap(counter).unwrap().into_snapshot();
        assert_eq!(snapshot.get("shared"), 16 * 500);
        assert_eq!(snapshot.get("w3-7"), 50);
        assert_eq!(snapshot.len(), 1 + 16 * 10);
    }
}
