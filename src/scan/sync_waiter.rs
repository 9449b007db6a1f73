//! Sync Waiter
//!
//! After a fresh connect the client populates its chat list asynchronously and
//! never says when it is done. We poll the chat count and call the session
//! synced once the count has held steady for a number of consecutive samples.

use crate::config::SyncConfig;
use crate::error::{SessionError, WorkflowError};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub check_interval: Duration,
    /// Number of consecutive equal samples that count as stable
    pub required_stable_checks: u32,
    pub max_wait: Duration,
    /// `max_wait` only ends the wait when this is set; otherwise it just logs
    pub enforce_max_wait: bool,
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            check_interval: Duration::from_millis(config.check_interval_ms),
            required_stable_checks: config.required_stable_checks,
            max_wait: Duration::from_millis(config.max_wait_ms),
            enforce_max_wait: config.enforce_max_wait,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub chat_count: usize,
    pub samples: u32,
    pub elapsed: Duration,
}

/// Tracks the run of consecutive equal chat-count samples.
#[derive(Debug)]
pub struct StabilityTracker {
    previous: Option<usize>,
    /// Repeats of `previous` since it was first seen
    stable_count: u32,
    required: u32,
}

impl StabilityTracker {
    pub fn new(required: u32) -> Self {
        Self {
            previous: None,
            stable_count: 0,
            required: required.max(1),
        }
    }

    /// Record a sample. Returns true once `required` consecutive samples
    /// (the first occurrence plus its repeats) have been equal.
    pub fn observe(&mut self, count: usize) -> bool {
        if self.previous == Some(count) {
            self.stable_count += 1;
        } else {
            self.stable_count = 0;
        }
        self.previous = Some(count);
        self.stable_count + 1 >= self.required
    }

    pub fn run_length(&self) -> u32 {
        if self.previous.is_some() {
            self.stable_count + 1
        } else {
            0
        }
    }
}

/// Poll `chat_count` every `check_interval` until it stabilizes.
///
/// Provider errors propagate on the first failure. The wait only gives up on
/// `max_wait` when `enforce_max_wait` is set.
pub async fn wait_for_stable<F, Fut>(
    mut chat_count: F,
    options: &SyncOptions,
    cancel: &CancellationToken,
) -> Result<SyncOutcome, WorkflowError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<usize, SessionError>>,
{
    let started = Instant::now();
    let mut tracker = StabilityTracker::new(options.required_stable_checks);
    let mut samples = 0u32;
    let mut overdue_logged = false;

    tracing::info!(
        "Sync: waiting for chat list to settle ({} equal samples, every {:?})",
        options.required_stable_checks,
        options.check_interval
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
            _ = tokio::time::sleep(options.check_interval) => {}
        }

        let count = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
            count = chat_count() => count?,
        };
        samples += 1;

        let stable = tracker.observe(count);
        tracing::debug!(
            "Sync: sample {} = {} chats (run {}/{})",
            samples,
            count,
            tracker.run_length(),
            options.required_stable_checks
        );

        if stable {
            let elapsed = started.elapsed();
            tracing::info!(
                "Sync: chat list stable at {} chats after {} samples ({:?})",
                count,
                samples,
                elapsed
            );
            return Ok(SyncOutcome {
                chat_count: count,
                samples,
                elapsed,
            });
        }

        let elapsed = started.elapsed();
        if elapsed >= options.max_wait {
            if options.enforce_max_wait {
                tracing::warn!("Sync: gave up after {:?}", elapsed);
                return Err(WorkflowError::SyncTimeout {
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            if !overdue_logged {
                overdue_logged = true;
                tracing::warn!(
                    "Sync: still settling after {:?} (max wait {:?} not enforced)",
                    elapsed,
                    options.max_wait
                );
            }
        }
    }
}
