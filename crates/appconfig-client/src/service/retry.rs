// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Retry delays for failed background polls.

use std::time::Duration;

/// How the poller spaces out retries after failed background polls.
///
/// The n-th consecutive failure waits `first_delay * multiplier^(n-1)`,
/// never more than `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub first_delay: Duration,
    pub multiplier: f64,
    /// Clamped into the 2 to 5 minute window when the service is built.
    pub max_delay: Duration,
    /// Successful polls needed to step the failure count back down. `0` steps
    /// down on every success.
    pub successes_to_recover: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_delay: Duration::from_secs(2 * 60),
            successes_to_recover: 2,
        }
    }
}

/// Failure bookkeeping owned by the poller task.
#[derive(Debug)]
pub(crate) struct RetryBackoff {
    config: BackoffConfig,
    failures: u32,
    successes: u32,
}

impl RetryBackoff {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
            successes: 0,
        }
    }

    /// Records a failed poll and returns the delay before retrying.
    pub(crate) fn on_failure(&mut self) -> Duration {
        self.successes = 0;
        self.failures = self.failures.saturating_add(1);
        let steps = self.failures.saturating_sub(1).min(64) as i32;
        let secs = self.config.first_delay.as_secs_f64() * self.config.multiplier.powi(steps);
        Duration::from_secs_f64(secs.clamp(0.0, self.config.max_delay.as_secs_f64()))
    }

    /// Records a successful poll; enough in a row forgive two failures.
    pub(crate) fn on_success(&mut self) {
        self.successes = self.successes.saturating_add(1);
        if self.successes >= self.config.successes_to_recover {
            self.failures = self.failures.saturating_sub(2);
            self.successes = 0;
        }
    }
}
