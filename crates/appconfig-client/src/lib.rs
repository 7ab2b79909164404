// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Live remote configuration over a session-based long-poll protocol.
//!
//! A [`ConfigService`] opens a session against a [`ConfigProvider`], polls on
//! the cadence the provider asks for, rotates the continuation token after
//! every poll and fans decoded snapshots out to subscribers exactly once per
//! real change. [`HttpProvider`] speaks the AppConfig Data wire shape;
//! [`AppConfigEnv`] assembles everything from environment variables.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod decode;
pub mod http;
pub mod provider;
pub mod service;
pub mod telemetry;

pub use config::{AppConfigEnv, EnvError};
pub use decode::{DecodeError, Deserializer, JsonDeserializer};
pub use http::{Auth, HttpClientOptions, HttpError, HttpProvider};
pub use provider::{
    ConfigIdentifiers, ConfigProvider, PollResult, ProviderError, SessionRequest, SessionToken,
};
pub use service::{
    BackoffConfig, ChangeBroadcaster, ConfigChange, ConfigService, FetchOutcome, HostLifecycle,
    LifecycleState, PollerTelemetry, ServiceConfig, ServiceError, ServiceSnapshot,
    SubscriptionHandle,
};
pub use telemetry::{CountingTelemetry, TelemetryCounters, TelemetrySnapshot};
