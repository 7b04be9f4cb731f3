// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry helpers for Docker API calls.
//!
//! Network topology races (a network announced before its members are
//! attached, a proxy container that is still starting) are absorbed by a short
//! fixed retry. Losing the event subscription is retried with exponential
//! backoff. Every wait observes [`Shutdown`].

use crate::shutdown::Shutdown;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Initial reconnect interval for the event stream (1 second)
const EVENT_STREAM_INITIAL_INTERVAL_MILLIS: u64 = 1000;

/// Maximum reconnect interval for the event stream (30 seconds)
const EVENT_STREAM_MAX_INTERVAL_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Simple exponential backoff.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Interval restored by [`ExponentialBackoff::reset`]
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(initial_interval: Duration, max_interval: Duration, multiplier: f64) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            multiplier,
        }
    }

    /// Get the next backoff interval and advance the schedule.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);
        interval
    }

    /// Restart the schedule from the initial interval.
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
    }
}

/// Backoff used to re-subscribe to the Docker event stream.
///
/// # Retry Schedule
///
/// 1. 1s
/// 2. 2s
/// 3. 4s
/// 4. 8s
/// 5. 16s
/// 6. 30s (capped at max interval), then 30s until the stream is back
///
/// The schedule never gives up; the caller resets it once a subscription
/// succeeds.
#[must_use]
pub fn event_stream_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(EVENT_STREAM_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(EVENT_STREAM_MAX_INTERVAL_SECS),
        BACKOFF_MULTIPLIER,
    )
}

/// Fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Run `operation` until it succeeds, the attempts are exhausted, or
    /// shutdown is triggered.
    ///
    /// # Arguments
    ///
    /// * `operation_name` - Human-readable name for logging (e.g., "connect proxy")
    /// * `shutdown` - Cancels the pause between attempts
    /// * `operation` - Async closure performing one attempt
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation_name: &str,
        shutdown: &Shutdown,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?self.delay,
                        error = %e,
                        "Operation failed, will retry"
                    );
                    if !shutdown.sleep(self.delay).await {
                        return Err(e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
