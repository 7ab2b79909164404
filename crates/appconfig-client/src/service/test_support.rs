// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for service tests.
//!
//! [`ScriptedProvider`] replays queued poll results and records every call so
//! tests can assert on token rotation without a network round-trip.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{watch, Notify};

use super::{ConfigService, ServiceConfig};
use crate::provider::{
    ConfigIdentifiers, ConfigProvider, PollResult, ProviderError, SessionRequest, SessionToken,
};

pub(crate) fn identifiers() -> ConfigIdentifiers {
    ConfigIdentifiers::new("app", "env", "profile")
}

/// Successful poll carrying a JSON payload.
pub(crate) fn json_poll(payload: &str, next: &str, interval_secs: Option<u64>) -> PollResult {
    PollResult {
        status: 200,
        content_type: Some("application/json".into()),
        payload: payload.as_bytes().to_vec(),
        next_token: Some(next.into()),
        next_interval: interval_secs.map(Duration::from_secs),
    }
}

/// Successful poll reporting "no change".
pub(crate) fn empty_poll(next: &str) -> PollResult {
    json_poll("", next, None)
}

/// Config without background retry so failures surface deterministically.
pub(crate) fn strict_config() -> ServiceConfig {
    ServiceConfig {
        background_retry: None,
        ..ServiceConfig::default()
    }
}

pub(crate) fn json_service(
    provider: &Arc<ScriptedProvider>,
    config: ServiceConfig,
) -> ConfigService<Value> {
    ConfigService::json(provider.clone(), identifiers(), config)
}

/// Provider double driven by a queue of poll results.
pub(crate) struct ScriptedProvider {
    initial_token: Option<String>,
    session_error: Mutex<Option<String>>,
    session_requests: Mutex<Vec<SessionRequest>>,
    polls: Mutex<VecDeque<Result<PollResult, ProviderError>>>,
    poll_tokens: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    polls_entered: watch::Sender<usize>,
}

impl ScriptedProvider {
    pub(crate) fn new(initial_token: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            initial_token,
            session_error: Mutex::default(),
            session_requests: Mutex::default(),
            polls: Mutex::default(),
            poll_tokens: Mutex::default(),
            gate: Mutex::default(),
            polls_entered: watch::channel(0).0,
        })
    }

    pub(crate) fn with_session(initial_token: &str) -> Arc<Self> {
        Self::new(Some(initial_token.to_owned()))
    }

    pub(crate) fn fail_sessions(&self, message: &str) {
        *self.session_error.lock().unwrap() = Some(message.to_owned());
    }

    pub(crate) fn push(&self, result: PollResult) {
        self.polls.lock().unwrap().push_back(Ok(result));
    }

    pub(crate) fn push_error(&self, error: ProviderError) {
        self.polls.lock().unwrap().push_back(Err(error));
    }

    /// Makes subsequent polls wait until the returned gate is notified.
    pub(crate) fn hold_polls(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once `count` poll calls have entered the provider.
    pub(crate) async fn wait_for_polls(&self, count: usize) {
        let mut entered = self.polls_entered.subscribe();
        let _ = entered.wait_for(|entered| *entered >= count).await;
    }

    pub(crate) fn session_calls(&self) -> usize {
        self.session_requests.lock().unwrap().len()
    }

    pub(crate) fn session_requests(&self) -> Vec<SessionRequest> {
        self.session_requests.lock().unwrap().clone()
    }

    /// Tokens presented to `poll`, in call order.
    pub(crate) fn poll_tokens(&self) -> Vec<String> {
        self.poll_tokens.lock().unwrap().clone()
    }

    pub(crate) fn poll_calls(&self) -> usize {
        self.poll_tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl ConfigProvider for ScriptedProvider {
    async fn start_session(
        &self,
        request: &SessionRequest,
    ) -> Result<Option<String>, ProviderError> {
        self.session_requests.lock().unwrap().push(request.clone());
        if let Some(message) = self.session_error.lock().unwrap().clone() {
            return Err(ProviderError::Other(message));
        }
        Ok(self.initial_token.clone())
    }

    async fn poll(&self, token: &SessionToken) -> Result<PollResult, ProviderError> {
        self.poll_tokens
            .lock()
            .unwrap()
            .push(token.as_str().to_owned());
        self.polls_entered.send_modify(|entered| *entered += 1);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Other("no scripted poll result".into())))
    }
}
