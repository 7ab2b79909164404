// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Provider abstraction for the remote configuration store.
//!
//! The store is treated as an opaque service exposing two calls: opening a
//! polling session and polling with the current continuation token. The
//! service layer only talks to [`ConfigProvider`], which keeps the session and
//! poll machinery independent from the wire transport (see [`crate::http`]
//! for the bundled HTTP implementation).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::http::HttpError;

/// Identifiers selecting the configuration profile to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIdentifiers {
    /// Application the profile belongs to.
    pub application_id: String,
    /// Deployment environment (e.g. `prod`).
    pub environment_id: String,
    /// Configuration profile identifier.
    pub profile_id: String,
}

impl ConfigIdentifiers {
    pub fn new(
        application_id: impl Into<String>,
        environment_id: impl Into<String>,
        profile_id: impl Into<String>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            environment_id: environment_id.into(),
            profile_id: profile_id.into(),
        }
    }
}

/// Parameters sent when opening a polling session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub identifiers: ConfigIdentifiers,
    /// Lower bound on the poll cadence the provider may hand back.
    pub required_minimum_poll_interval: Option<Duration>,
}

/// Opaque continuation token authorising the next poll.
///
/// Tokens are credentials, so `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a provider-issued token, rejecting blank values.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&"<redacted>").finish()
    }
}

/// Raw outcome of a single poll call. Consumed immediately by the poll loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollResult {
    /// Transport status code reported by the provider.
    pub status: u16,
    /// Media type of the payload, as reported by the provider.
    pub content_type: Option<String>,
    /// Payload bytes; empty when the configuration did not change.
    pub payload: Vec<u8>,
    /// Token to use for the next poll.
    pub next_token: Option<String>,
    /// Server-directed delay before the next poll.
    pub next_interval: Option<Duration>,
}

impl PollResult {
    /// Returns `true` when the transport status is in the 2xx range.
    pub fn status_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure raised by a provider implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP-layer failure of the bundled provider.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// Failure reported by a custom provider implementation.
    #[error("{0}")]
    Other(String),
}

/// Remote configuration store consumed by the service.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Opens a polling session and returns the initial token, if any.
    ///
    /// A missing token is not an error at this layer; the session manager
    /// decides how to surface it.
    async fn start_session(
        &self,
        request: &SessionRequest,
    ) -> Result<Option<String>, ProviderError>;

    /// Polls the store with the supplied token.
    async fn poll(&self, token: &SessionToken) -> Result<PollResult, ProviderError>;
}
