// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Static configuration for the configuration service runtime.

use std::time::Duration;

use tracing::warn;

use super::retry::BackoffConfig;

/// Poll cadence used when the provider does not supply one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Floor applied to every scheduled poll so a zero interval cannot spin.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Smallest minimum-interval the provider accepts when opening a session.
pub const MIN_REQUIRED_POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Media type payloads must carry.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
/// Minimum backoff cap for background retries.
pub const MIN_BACKOFF_INTERVAL: Duration = Duration::from_secs(2 * 60);
/// Maximum backoff cap for background retries.
pub const MAX_BACKOFF_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Settings controlling the poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Delay before the next poll when the provider omits an interval.
    pub default_poll_interval: Duration,
    /// Lower bound applied to every scheduled delay.
    pub min_poll_interval: Duration,
    /// Media type accepted for payloads (parameters such as `charset` are ignored).
    pub expected_content_type: String,
    /// Minimum poll interval advertised when opening the session.
    pub required_minimum_poll_interval: Option<Duration>,
    /// Backoff applied to failed background polls; `None` halts polling on the first failure.
    pub background_retry: Option<BackoffConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_poll_interval: DEFAULT_POLL_INTERVAL,
            min_poll_interval: MIN_POLL_INTERVAL,
            expected_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            required_minimum_poll_interval: None,
            background_retry: Some(BackoffConfig::default()),
        }
    }
}

impl ServiceConfig {
    /// Clamps values into the ranges the poll loop relies on.
    pub(crate) fn sanitise(mut self) -> Self {
        if self.default_poll_interval.is_zero() {
            warn!(
                "default poll interval must be > 0; using {:?}",
                DEFAULT_POLL_INTERVAL
            );
            self.default_poll_interval = DEFAULT_POLL_INTERVAL;
        }

        if self.min_poll_interval.is_zero() {
            self.min_poll_interval = MIN_POLL_INTERVAL;
        }
        if self.min_poll_interval > self.default_poll_interval {
            warn!(
                "min poll interval {:?} exceeds default poll interval {:?}; aligning with default",
                self.min_poll_interval, self.default_poll_interval
            );
            self.min_poll_interval = self.default_poll_interval;
        }

        if self.expected_content_type.trim().is_empty() {
            warn!("expected content type is blank; using {DEFAULT_CONTENT_TYPE}");
            self.expected_content_type = DEFAULT_CONTENT_TYPE.to_string();
        }

        if let Some(required) = self.required_minimum_poll_interval {
            if required < MIN_REQUIRED_POLL_INTERVAL {
                warn!(
                    ?required,
                    minimum = ?MIN_REQUIRED_POLL_INTERVAL,
                    "required minimum poll interval below the provider minimum; raising"
                );
                self.required_minimum_poll_interval = Some(MIN_REQUIRED_POLL_INTERVAL);
            }
        }

        if let Some(backoff) = self.background_retry.as_mut() {
            if backoff.first_delay.is_zero() {
                backoff.first_delay = BackoffConfig::default().first_delay;
            }
            if backoff.multiplier < 1.0 || !backoff.multiplier.is_finite() {
                backoff.multiplier = BackoffConfig::default().multiplier;
            }
            let capped = backoff
                .max_delay
                .clamp(MIN_BACKOFF_INTERVAL, MAX_BACKOFF_INTERVAL);
            if capped != backoff.max_delay {
                warn!(
                    "retry delay cap {:?} outside {:?}..={:?}; using {:?}",
                    backoff.max_delay, MIN_BACKOFF_INTERVAL, MAX_BACKOFF_INTERVAL, capped
                );
                backoff.max_delay = capped;
            }
        }

        self
    }

    /// Resolves the delay before the next poll from the server-supplied interval.
    pub(crate) fn next_delay(&self, server_interval: Option<Duration>) -> Duration {
        server_interval
            .unwrap_or(self.default_poll_interval)
            .max(self.min_poll_interval)
    }

    /// Returns `true` when `content_type` names the expected media type.
    pub(crate) fn accepts_content_type(&self, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return false;
        };
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        media_type.eq_ignore_ascii_case(self.expected_content_type.trim())
    }
}
