// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Service-level telemetry hooks.
//!
//! Embedders implement [`PollerTelemetry`] to observe poll outcomes without
//! depending on internal service state. Every hook defaults to a no-op.

use std::time::Duration;

use super::ServiceError;

/// Hook invoked on significant poll-loop events.
pub trait PollerTelemetry: Send + Sync {
    /// A new configuration session was opened.
    fn on_session_started(&self) {}
    /// A changed configuration was decoded and published.
    fn on_configuration_updated(&self, _next_interval: Duration) {}
    /// The provider reported no change.
    fn on_configuration_unchanged(&self, _next_interval: Duration) {}
    /// A poll cycle failed.
    fn on_poll_error(&self, _error: &ServiceError) {}
    /// A failed background poll will be retried after `delay`.
    fn on_retry_scheduled(&self, _delay: Duration) {}
}

#[derive(Debug, Default)]
pub(crate) struct NoopTelemetry;

impl PollerTelemetry for NoopTelemetry {}
