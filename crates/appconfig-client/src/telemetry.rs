// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ready-made [`PollerTelemetry`] implementations.
//!
//! [`CountingTelemetry`] keeps atomic counters that the embedder can export
//! through whatever metrics pipeline it already runs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::service::{PollerTelemetry, ServiceError};

/// Aggregated telemetry counters (all values use relaxed atomics).
#[derive(Debug, Default)]
pub struct TelemetryCounters {
    sessions_started: AtomicU64,
    updates: AtomicU64,
    unchanged: AtomicU64,
    poll_errors: AtomicU64,
    retries_scheduled: AtomicU64,
    last_retry_delay_ms: AtomicU64,
}

impl TelemetryCounters {
    /// Captures a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            last_retry_delay_ms: self.last_retry_delay_ms.load(Ordering::Relaxed),
        }
    }
}

/// Plain data representation of [`TelemetryCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Number of sessions opened.
    pub sessions_started: u64,
    /// Number of configuration changes published.
    pub updates: u64,
    /// Number of polls that reported no change.
    pub unchanged: u64,
    /// Number of failed poll cycles.
    pub poll_errors: u64,
    /// Number of background retries scheduled after a failure.
    pub retries_scheduled: u64,
    /// Most recent retry delay, in milliseconds.
    pub last_retry_delay_ms: u64,
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sessions_started={}, updates={}, unchanged={}, poll_errors={}, retries_scheduled={}, last_retry_delay_ms={}",
            self.sessions_started,
            self.updates,
            self.unchanged,
            self.poll_errors,
            self.retries_scheduled,
            self.last_retry_delay_ms
        )
    }
}

/// Telemetry implementation that maintains atomic counters for every signal.
#[derive(Debug, Clone)]
pub struct CountingTelemetry {
    counters: Arc<TelemetryCounters>,
}

impl CountingTelemetry {
    pub fn new(counters: Arc<TelemetryCounters>) -> Self {
        Self { counters }
    }

    /// Returns the underlying counter set.
    pub fn counters(&self) -> Arc<TelemetryCounters> {
        self.counters.clone()
    }
}

impl Default for CountingTelemetry {
    fn default() -> Self {
        Self::new(Arc::new(TelemetryCounters::default()))
    }
}

impl PollerTelemetry for CountingTelemetry {
    fn on_session_started(&self) {
        self.counters
            .sessions_started
            .fetch_add(1, Ordering::Relaxed);
    }

    fn on_configuration_updated(&self, _next_interval: Duration) {
        self.counters.updates.fetch_add(1, Ordering::Relaxed);
    }

    fn on_configuration_unchanged(&self, _next_interval: Duration) {
        self.counters.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    fn on_poll_error(&self, _error: &ServiceError) {
        self.counters.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn on_retry_scheduled(&self, delay: Duration) {
        self.counters
            .retries_scheduled
            .fetch_add(1, Ordering::Relaxed);
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.counters
            .last_retry_delay_ms
            .store(millis, Ordering::Relaxed);
    }
}
