// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration service module facade.
//!
//! Re-exports the high-level service API and wires the submodules that
//! implement session handling, polling, change fan-out and diagnostics.

pub(crate) mod broadcast;
pub(crate) mod config;
mod core;
pub(crate) mod poll;
pub(crate) mod retry;
pub(crate) mod session;
pub(crate) mod state;
pub(crate) mod telemetry;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod util;

pub use broadcast::{ChangeBroadcaster, SubscriptionHandle};
pub use config::ServiceConfig;
pub use retry::BackoffConfig;
pub use self::core::*;
pub use state::{LifecycleState, ServiceSnapshot};
pub use telemetry::PollerTelemetry;
