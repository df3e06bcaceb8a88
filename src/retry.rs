// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Transport-level retry with exponential backoff.
//!
//! The resource manager throttles aggressively (429) and its gateways return
//! occasional 5xx. Those are retried here, below the poller, the same way the
//! resource manager SDK pipeline retries them. Anything still failing when the
//! budget runs out surfaces as a fatal [`VerifyError::Transport`].
//!
//! Resource-state signals (rejections, not-found) are never retried.

use crate::errors::{Result, VerifyError};
use crate::http_errors::{classify_status, ResponseClass};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// HTTP retry initial interval (50ms)
const HTTP_INITIAL_INTERVAL_MILLIS: u64 = 50;

/// HTTP retry maximum interval (10 seconds)
const HTTP_MAX_INTERVAL_SECS: u64 = 10;

/// HTTP retry maximum elapsed time (2 minutes)
const HTTP_MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Exponential backoff with jitter and an overall time budget.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Interval returned by the next call to [`next_backoff`](Self::next_backoff)
    pub current_interval: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Total budget; `None` retries forever
    pub max_elapsed_time: Option<Duration>,
    pub multiplier: f64,
    /// e.g. 0.1 for ±10%
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Next interval to wait, or `None` once the time budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    /// Restart the schedule and the elapsed-time budget.
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
        self.start_time = Instant::now();
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff for resource manager HTTP calls.
///
/// Retries occur at approximately 50ms, 100ms, 200ms, ... capped at 10s,
/// until 2 minutes have elapsed.
#[must_use]
pub fn http_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(HTTP_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(HTTP_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(HTTP_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Whether an error is a transient transport condition.
///
/// Connection failures (no status) and 408/429/500/502/503/504 are retryable.
/// Rejections, not-found, and every resource-state error are not.
#[must_use]
pub fn is_retryable_error(err: &VerifyError) -> bool {
    match err {
        VerifyError::Transport { status: None, .. } => true,
        VerifyError::Transport {
            status: Some(code), ..
        } => classify_status(*code) == ResponseClass::Retryable,
        _ => false,
    }
}

/// Retry an HTTP call on transient transport errors.
///
/// # Errors
///
/// Returns the first non-retryable error unchanged, or the last transport
/// error once the backoff budget is exhausted.
pub async fn retry_http_call<T, F, Fut>(
    backoff: &mut ExponentialBackoff,
    mut operation: F,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "HTTP call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if !is_retryable_error(&e) => return Err(e),
            Err(e) => {
                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable HTTP error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
