// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Poll bookkeeping exposed through [`ServiceSnapshot`].

use std::time::Duration;

use tokio::time::Instant;

use super::{ConfigChange, FetchOutcome, ServiceError};

/// Where the service is in its start/stop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, `start()` not yet completed.
    Idle,
    /// First fetch succeeded; background polling active.
    Running,
    /// `stop()` was called. Terminal.
    Stopped,
}

/// Diagnostic view of the poll loop.
#[derive(Debug, Clone)]
pub struct ServiceSnapshot {
    pub lifecycle: LifecycleState,
    /// Whether a configuration value has been published.
    pub has_value: bool,
    /// Whether a session token is currently held.
    pub session_active: bool,
    /// Number of completed poll cycles (success or failure).
    pub polls: u64,
    /// Number of configuration changes published.
    pub updates: u64,
    /// Number of consecutive failed cycles.
    pub consecutive_errors: u32,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
    /// When the last cycle started.
    pub last_attempt: Option<Instant>,
    /// When the last successful cycle completed.
    pub last_success: Option<Instant>,
    /// Delay the poller is currently waiting on, if scheduled.
    pub next_poll: Option<Duration>,
    /// Live subscriber count.
    pub subscribers: usize,
}

#[derive(Debug, Default)]
pub(super) struct PollState {
    pub(super) polls: u64,
    pub(super) updates: u64,
    pub(super) consecutive_errors: u32,
    pub(super) last_attempt: Option<Instant>,
    pub(super) last_success: Option<Instant>,
    pub(super) last_error: Option<String>,
    pub(super) next_poll: Option<Duration>,
}

impl PollState {
    pub(super) fn record_attempt(&mut self) {
        self.last_attempt = Some(Instant::now());
    }

    pub(super) fn record_success(&mut self, outcome: &FetchOutcome) {
        self.polls += 1;
        if outcome.change == ConfigChange::Updated {
            self.updates += 1;
        }
        self.consecutive_errors = 0;
        self.last_error = None;
        self.last_success = Some(Instant::now());
    }

    pub(super) fn record_error(&mut self, error: &ServiceError) {
        self.polls += 1;
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.last_error = Some(error.to_string());
    }
}
