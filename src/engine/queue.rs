// src/engine/queue.rs

use std::collections::VecDeque;
use std::time::Duration;

use tracing::debug;

use crate::config::model::Repository;

/// One scheduled attempt at a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryUnit {
    pub repository: Repository,
    pub attempt: u32,
}

/// What to do after an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    /// Queued again as attempt `next_attempt`.
    Retry { next_attempt: u32 },
    /// Out of retries.
    GiveUp,
}

/// Bounded retry over a configuration's repositories.
///
/// Semantics:
/// - Starts with `(repository, 0)` for each repository, in declaration
///   order.
/// - A failed unit with attempts left goes to the *back* of the queue, so a
///   retry of A may run after the first attempt of B.
/// - Before attempt `n > 0`, the caller sleeps `n * retry_wait` seconds.
///
/// The queue itself never sleeps or runs anything; the pipeline drives it.
#[derive(Debug)]
pub struct RetryQueue {
    pending: VecDeque<RetryUnit>,
    retries: u32,
    retry_wait: Duration,
}

impl RetryQueue {
    pub fn new(repositories: &[Repository], retries: u32, retry_wait_seconds: u64) -> Self {
        Self {
            pending: repositories
                .iter()
                .map(|repository| RetryUnit {
                    repository: repository.clone(),
                    attempt: 0,
                })
                .collect(),
            retries,
            retry_wait: Duration::from_secs(retry_wait_seconds),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Next unit to run and how long to wait before running it.
    pub fn next(&mut self) -> Option<(RetryUnit, Duration)> {
        let unit = self.pending.pop_front()?;
        let delay = self.retry_wait * unit.attempt;
        Some((unit, delay))
    }

    /// Record a hard failure of `unit`.
    pub fn record_failure(&mut self, unit: RetryUnit) -> FailureDecision {
        if unit.attempt < self.retries {
            let next_attempt = unit.attempt + 1;
            debug!(
                repository = %unit.repository.display_label(),
                next_attempt,
                "queueing retry"
            );
            self.pending.push_back(RetryUnit {
                repository: unit.repository,
                attempt: next_attempt,
            });
            FailureDecision::Retry { next_attempt }
        } else {
            FailureDecision::GiveUp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn repos(paths: &[&str]) -> Vec<Repository> {
        paths.iter().map(|p| Repository::new(*p)).collect()
    }

    #[test]
    fn retries_interleave_with_other_repositories() {
        let mut queue = RetryQueue::new(&repos(&["a", "b"]), 1, 10);

        let (a0, delay) = queue.next().unwrap();
        assert_eq!((a0.repository.path.as_str(), a0.attempt, delay), ("a", 0, Duration::ZERO));
        assert_eq!(queue.record_failure(a0), FailureDecision::Retry { next_attempt: 1 });

        let (b0, _) = queue.next().unwrap();
        assert_eq!(b0.repository.path, "b");

        let (a1, delay) = queue.next().unwrap();
        assert_eq!((a1.repository.path.as_str(), a1.attempt), ("a", 1));
        assert_eq!(delay, Duration::from_secs(10));
        assert_eq!(queue.record_failure(a1), FailureDecision::GiveUp);
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn always_failing_repository_runs_retries_plus_one_times(
            retries in 0u32..8,
            retry_wait in 0u64..120,
        ) {
            let mut queue = RetryQueue::new(&repos(&["/r"]), retries, retry_wait);
            let mut attempts = 0u32;
            let mut slept = Duration::ZERO;

            while let Some((unit, delay)) = queue.next() {
                attempts += 1;
                slept += delay;
                queue.record_failure(unit);
            }

            let triangle = u64::from(retries) * u64::from(retries + 1) / 2;
            prop_assert_eq!(attempts, retries + 1);
            prop_assert_eq!(slept, Duration::from_secs(retry_wait * triangle));
        }
    }
}
