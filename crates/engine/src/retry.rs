// SPDX-License-Identifier: MIT

//! Exponential backoff for failed files: caps attempts, and makes a file
//! ineligible for another attempt until its backoff window has elapsed.

use crate::processor::ProcessOutcome;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(5), max_delay: Duration::from_secs(60) }
    }
}

impl RetryPolicy {
    /// Backoff delay before attempt number `attempts_so_far + 1`.
    pub fn delay_for(&self, attempts_so_far: u32) -> Duration {
        let factor = 1u64.checked_shl(attempts_so_far).unwrap_or(u64::MAX);
        let scaled = self.base_delay.as_secs().saturating_mul(factor);
        Duration::from_secs(scaled.min(self.max_delay.as_secs()))
    }
}

#[derive(Debug, Clone, Default)]
struct RetryInfo {
    attempts: u32,
    last_attempt_ms: u64,
}

/// Tracks retry attempts per file across a run so the scheduler can decide
/// whether, and when, to re-enqueue a failure.
pub struct RetryController {
    policy: RetryPolicy,
    entries: HashMap<String, RetryInfo>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, entries: HashMap::new() }
    }

    /// Whether `relative_path` is eligible for another attempt right now.
    pub fn should_retry(&self, relative_path: &str, now_ms: u64) -> bool {
        let Some(info) = self.entries.get(relative_path) else {
            return true;
        };
        if info.attempts >= self.policy.max_attempts {
            return false;
        }
        let delay_ms = self.policy.delay_for(info.attempts).as_millis() as u64;
        now_ms.saturating_sub(info.last_attempt_ms) >= delay_ms
    }

    pub fn record_attempt(&mut self, relative_path: &str, now_ms: u64) {
        let entry = self.entries.entry(relative_path.to_string()).or_default();
        entry.attempts += 1;
        entry.last_attempt_ms = now_ms;
    }

    pub fn attempts(&self, relative_path: &str) -> u32 {
        self.entries.get(relative_path).map(|i| i.attempts).unwrap_or(0)
    }

    pub fn clear(&mut self, relative_path: &str) {
        self.entries.remove(relative_path);
    }

    pub fn exhausted(&self, relative_path: &str) -> bool {
        self.attempts(relative_path) >= self.policy.max_attempts
    }

    /// Re-attempt every retry-eligible file in `failed`. Ineligible files
    /// (attempts exhausted, or still inside their backoff window) are
    /// reported as `skipped` without ever calling `process_fn`. Eligible
    /// files are attempted one at a time, sleeping the computed backoff
    /// delay first — the sleep is what satisfies the backoff, there is no
    /// separate gate at attempt time. A success clears the file's retry
    /// entry; a failure records another attempt.
    pub async fn retry_failed<F, Fut>(&mut self, failed: &[String], now_ms: impl Fn() -> u64, mut process_fn: F) -> (RetryOutcome, Vec<(String, ProcessOutcome)>)
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ProcessOutcome>,
    {
        let retryable: Vec<String> = failed.iter().cloned().filter(|id| self.should_retry(id, now_ms())).collect();
        let skipped: Vec<String> = failed.iter().filter(|id| !retryable.contains(id)).cloned().collect();

        let mut outcome = RetryOutcome { attempted: 0, recovered: 0, still_failed: Vec::new(), skipped };
        let mut results = Vec::with_capacity(retryable.len());

        for relative_path in retryable {
            let delay = self.policy.delay_for(self.attempts(&relative_path));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            outcome.attempted += 1;
            let result = process_fn(relative_path.clone()).await;
            if result.success {
                outcome.recovered += 1;
                self.clear(&relative_path);
            } else {
                outcome.still_failed.push(relative_path.clone());
                self.record_attempt(&relative_path, now_ms());
            }
            results.push((relative_path, result));
        }

        (outcome, results)
    }
}

/// Tally from [`RetryController::retry_failed`].
#[derive(Debug, Clone, Default)]
pub struct RetryOutcome {
    pub attempted: usize,
    pub recovered: usize,
    pub still_failed: Vec<String>,
    pub skipped: Vec<String>,
}
