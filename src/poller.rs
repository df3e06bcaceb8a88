// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Poll-until-terminal state machine.
//!
//! ```text
//!             fetch ──► NonTerminal ──(wait interval)──► fetch ...
//!               │  └──► NotFound (visibility lag) ─┘
//!               ├─────► TerminalSuccess ─► Ok(PollResult)
//!               ├─────► TerminalFailure ─► Ok(PollResult)
//!               └─────► other error     ─► Err(error)       (fatal)
//!   elapsed ≥ timeout ─► Err(Timeout)
//!   token canceled    ─► Err(Canceled)
//! ```
//!
//! The first fetch happens immediately and later fetches follow a fixed
//! wall-clock cadence. Once a terminal state is seen the fetch closure is
//! never invoked again. A terminal failure is returned as a [`PollResult`]
//! because negative scenarios expect it; [`PollResult::into_success`] turns it
//! into [`VerifyError::AsyncFailure`] for positive ones.

use crate::constants::{MAX_POLL_TIMEOUT_SECS, STANDARD_POLL_INTERVAL_SECS};
use crate::errors::{Result, VerifyError};
use crate::metrics;
use crate::models::Observation;
use crate::provisioning::{classify, Classification, ProvisioningState};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fetch cadence and overall budget for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    interval: Duration,
    timeout: Duration,
}

impl PollConfig {
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidPollConfig`] unless
    /// `interval > 0`, `timeout > interval` and `timeout` is at most 24 hours.
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(VerifyError::InvalidPollConfig {
                reason: "interval must be greater than zero".to_string(),
            });
        }
        if timeout <= interval {
            return Err(VerifyError::InvalidPollConfig {
                reason: format!(
                    "timeout ({timeout:?}) must be greater than interval ({interval:?})"
                ),
            });
        }
        let max_timeout = Duration::from_secs(MAX_POLL_TIMEOUT_SECS);
        if timeout > max_timeout {
            return Err(VerifyError::InvalidPollConfig {
                reason: format!("timeout ({timeout:?}) must not exceed {max_timeout:?}"),
            });
        }
        Ok(Self { interval, timeout })
    }

    /// Standard 10 second interval with the given timeout.
    ///
    /// # Errors
    ///
    /// Same as [`PollConfig::new`].
    pub fn standard(timeout: Duration) -> Result<Self> {
        Self::new(Duration::from_secs(STANDARD_POLL_INTERVAL_SECS), timeout)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Terminal observation plus bookkeeping about how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub observation: Observation,
    pub classification: Classification,
    /// Number of fetch calls made, including the terminal one
    pub attempts: u32,
    pub elapsed: Duration,
}

impl PollResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.classification == Classification::TerminalSuccess
    }

    #[must_use]
    pub fn state(&self) -> &ProvisioningState {
        &self.observation.state
    }

    /// Accept only a terminal success.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::AsyncFailure`] for a terminal failure.
    pub fn into_success(self, operation: &str, resource: &str) -> Result<Observation> {
        if self.is_success() {
            return Ok(self.observation);
        }
        Err(VerifyError::AsyncFailure {
            operation: operation.to_string(),
            resource: resource.to_string(),
            state: self.observation.state,
            error: self.observation.error,
        })
    }
}

/// Reusable poller parameterized by a [`PollConfig`].
#[derive(Debug, Clone)]
pub struct Poller {
    config: PollConfig,
    operation: String,
    resource: String,
}

impl Poller {
    #[must_use]
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            operation: "poll".to_string(),
            resource: "<unnamed>".to_string(),
        }
    }

    /// Label errors and log lines with the operation and resource being polled.
    #[must_use]
    pub fn for_operation(mut self, operation: impl Into<String>, resource: impl Into<String>) -> Self {
        self.operation = operation.into();
        self.resource = resource.into();
        self
    }

    #[must_use]
    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Invoke `fetch` until it reports a terminal state.
    ///
    /// # Errors
    ///
    /// - [`VerifyError::Timeout`] when no terminal state is seen within the timeout
    /// - [`VerifyError::Canceled`] when `cancel` fires
    /// - any non-NotFound error returned by `fetch`, unchanged
    pub async fn poll_until_terminal<F, Fut>(
        &self,
        mut fetch: F,
        cancel: &CancellationToken,
    ) -> Result<PollResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Observation>>,
    {
        let start = Instant::now();
        let deadline = start + self.config.timeout;
        let mut attempts: u32 = 0;
        let mut last_state: Option<ProvisioningState> = None;

        loop {
            attempts += 1;
            metrics::record_poll_attempt(&self.operation);

            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.canceled()),
                result = fetch() => result,
            };

            match fetched {
                Ok(observation) => {
                    let classification = classify(&observation.state);
                    if classification.is_terminal() {
                        let elapsed = start.elapsed();
                        info!(
                            operation = %self.operation,
                            resource = %self.resource,
                            state = %observation.state,
                            attempts,
                            elapsed = ?elapsed,
                            "Terminal state observed"
                        );
                        return Ok(PollResult {
                            observation,
                            classification,
                            attempts,
                            elapsed,
                        });
                    }
                    debug!(
                        operation = %self.operation,
                        resource = %self.resource,
                        state = %observation.state,
                        attempts,
                        "Still converging"
                    );
                    last_state = Some(observation.state);
                }
                Err(e) if e.is_not_found() => {
                    debug!(
                        operation = %self.operation,
                        resource = %self.resource,
                        attempts,
                        "Resource not visible yet, continuing to poll"
                    );
                }
                Err(e) => {
                    warn!(
                        operation = %self.operation,
                        resource = %self.resource,
                        attempts,
                        error = %e,
                        "Status fetch failed, aborting poll"
                    );
                    return Err(e);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let elapsed = now - start;
                warn!(
                    operation = %self.operation,
                    resource = %self.resource,
                    attempts,
                    elapsed = ?elapsed,
                    "Poll timed out"
                );
                return Err(VerifyError::Timeout {
                    operation: self.operation.clone(),
                    resource: self.resource.clone(),
                    elapsed,
                    last_state,
                });
            }

            // Fixed cadence from the start; the final wait is clipped to the deadline.
            let next_tick = (start + self.config.interval * attempts).min(deadline);
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.canceled()),
                () = sleep_until(next_tick) => {}
            }
        }
    }

    fn canceled(&self) -> VerifyError {
        warn!(
            operation = %self.operation,
            resource = %self.resource,
            "Poll canceled"
        );
        VerifyError::Canceled {
            operation: self.operation.clone(),
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod poller_tests;
