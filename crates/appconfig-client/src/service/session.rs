// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Session establishment and continuation-token rotation.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::ServiceError;
use crate::provider::{ConfigIdentifiers, ConfigProvider, SessionRequest, SessionToken};

/// Owns the current continuation token for one configuration profile.
pub(crate) struct SessionManager {
    provider: Arc<dyn ConfigProvider>,
    request: SessionRequest,
    token: Mutex<Option<SessionToken>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("request", &self.request)
            .finish()
    }
}

impl SessionManager {
    pub(crate) fn new(
        provider: Arc<dyn ConfigProvider>,
        identifiers: ConfigIdentifiers,
        required_minimum_poll_interval: Option<std::time::Duration>,
    ) -> Self {
        Self {
            provider,
            request: SessionRequest {
                identifiers,
                required_minimum_poll_interval,
            },
            token: Mutex::new(None),
        }
    }

    pub(crate) fn provider(&self) -> &Arc<dyn ConfigProvider> {
        &self.provider
    }

    /// Returns the current token, opening a session first if none exists.
    ///
    /// The lock is held across the provider call so concurrent callers share
    /// one session instead of racing to open several.
    pub(crate) async fn ensure_session(&self) -> Result<SessionToken, ServiceError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        info!(
            application = %self.request.identifiers.application_id,
            environment = %self.request.identifiers.environment_id,
            profile = %self.request.identifiers.profile_id,
            "appconfig: initializing configuration session"
        );
        let initial = self
            .provider
            .start_session(&self.request)
            .await
            .map_err(|err| ServiceError::SessionInit(err.to_string()))?;
        let token = initial.and_then(SessionToken::new).ok_or_else(|| {
            ServiceError::SessionInit("provider returned no initial configuration token".into())
        })?;

        *guard = Some(token.clone());
        Ok(token)
    }

    /// Replaces the current token with the one returned by the latest poll.
    pub(crate) async fn rotate(&self, next: SessionToken) {
        *self.token.lock().await = Some(next);
    }

    /// Drops the current token so the next fetch opens a fresh session.
    pub(crate) async fn reset(&self) {
        if self.token.lock().await.take().is_some() {
            debug!("appconfig: configuration session reset");
        }
    }

    pub(crate) async fn is_active(&self) -> bool {
        self.token.lock().await.is_some()
    }

    #[cfg(test)]
    pub(crate) async fn current(&self) -> Option<SessionToken> {
        self.token.lock().await.clone()
    }
}
