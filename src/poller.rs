use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Ready(T),
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollLimit {
    /// Run the check exactly this many times at most.
    Attempts(u32),
    /// Keep checking until this much wall-clock time has passed.
    Deadline(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub limit: PollLimit,
}

impl PollPolicy {
    pub fn attempts(max_attempts: u32, interval: Duration) -> Self {
        Self {
            interval,
            limit: PollLimit::Attempts(max_attempts),
        }
    }

    pub fn deadline(timeout: Duration, interval: Duration) -> Self {
        Self {
            interval,
            limit: PollLimit::Deadline(timeout),
        }
    }
}

/// Runs `check` until it reports ready, returns an error, or the policy's
/// budget runs out. Sleeps only between attempts.
pub async fn poll<T, E, F, Fut>(policy: PollPolicy, mut check: F) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, E>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if let Attempt::Ready(value) = check(attempts).await? {
            return Ok(PollOutcome::Ready(value));
        }
        let exhausted = match policy.limit {
            PollLimit::Attempts(max) => attempts >= max,
            PollLimit::Deadline(timeout) => started.elapsed() + policy.interval > timeout,
        };
        if exhausted {
            return Ok(PollOutcome::TimedOut { attempts });
        }
        sleep(policy.interval).await;
    }
}
