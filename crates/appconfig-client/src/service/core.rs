// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration service orchestration.
//!
//! [`ConfigService`] wires the session manager, the poll loop and the change
//! broadcaster into one owned handle. `start()` performs the first fetch
//! inline, after which a background poller follows the provider-directed
//! cadence until `stop()`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcast::{ChangeBroadcaster, SubscriptionHandle};
use super::config::ServiceConfig;
use super::poll::{PollerSignal, ServiceShared};
use super::session::SessionManager;
use super::state::{LifecycleState, PollState, ServiceSnapshot};
use super::telemetry::{NoopTelemetry, PollerTelemetry};
use super::util::lock;
use crate::decode::{DecodeError, Deserializer, JsonDeserializer};
use crate::provider::{ConfigIdentifiers, ConfigProvider, ProviderError};

/// Error type surfaced by configuration service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The provider did not hand out a usable session token.
    #[error("session initialization failed: {0}")]
    SessionInit(String),
    /// The poll call completed with a non-success status.
    #[error("configuration poll failed with status {0}")]
    PollHttp(u16),
    /// The payload is not in the expected structured format.
    #[error("unexpected configuration content type: {}", .0.as_deref().unwrap_or("<missing>"))]
    PollContentType(Option<String>),
    /// The poll response carried no continuation token.
    #[error("configuration poll returned no continuation token")]
    PollToken,
    /// The first successful poll carried no payload.
    #[error("configuration is empty")]
    EmptyConfiguration,
    /// The payload could not be decoded.
    #[error("configuration decode failed: {0}")]
    Decode(#[from] DecodeError),
    /// Transport-level provider failure.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// The service was stopped, or stopped while the call was in flight.
    #[error("configuration service stopped")]
    Stopped,
}

impl ServiceError {
    /// Whether the held session should be discarded before retrying.
    pub(crate) fn invalidates_session(&self) -> bool {
        matches!(self, Self::PollHttp(status) if (400..500).contains(status))
    }
}

/// Whether a fetch produced a new snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    /// A new value was decoded and published.
    Updated,
    /// The provider reported no change; nothing was published.
    Unchanged,
}

/// Outcome of a fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    pub change: ConfigChange,
    /// Delay until the next scheduled poll.
    pub next_interval: Duration,
}

/// Live view of one remote configuration profile.
///
/// Cloning yields another handle to the same service.
pub struct ConfigService<T> {
    shared: Arc<ServiceShared<T>>,
}

impl<T> Clone for ConfigService<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for ConfigService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigService")
            .field("session", &self.shared.session)
            .field("broadcaster", &self.shared.broadcaster)
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<T> ConfigService<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Builds a service decoding payloads as JSON.
    pub fn json(
        provider: Arc<dyn ConfigProvider>,
        identifiers: ConfigIdentifiers,
        config: ServiceConfig,
    ) -> Self {
        Self::new(
            provider,
            identifiers,
            Arc::new(JsonDeserializer::<T>::new()),
            config,
        )
    }
}

impl<T> ConfigService<T>
where
    T: Send + Sync + 'static,
{
    /// Builds a service; the configuration is sanitised up-front.
    pub fn new(
        provider: Arc<dyn ConfigProvider>,
        identifiers: ConfigIdentifiers,
        deserializer: Arc<dyn Deserializer<T>>,
        config: ServiceConfig,
    ) -> Self {
        let config = config.sanitise();
        let shared = ServiceShared {
            session: SessionManager::new(
                provider,
                identifiers,
                config.required_minimum_poll_interval,
            ),
            broadcaster: ChangeBroadcaster::new(),
            deserializer,
            config,
            telemetry: RwLock::new(Arc::new(NoopTelemetry)),
            state: Mutex::new(PollState::default()),
            lifecycle: Mutex::new(LifecycleState::Idle),
            fetch_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            schedule: Mutex::new(None),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Installs a telemetry hook, replacing the previous one.
    pub fn set_telemetry(&self, telemetry: Arc<dyn PollerTelemetry>) {
        *self
            .shared
            .telemetry
            .write()
            .unwrap_or_else(PoisonError::into_inner) = telemetry;
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.shared.config
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        *lock(&self.shared.lifecycle)
    }

    /// Performs the first fetch and starts background polling.
    ///
    /// Errors from the first fetch propagate; on a fresh service no poller
    /// is armed in that case. Calling `start` on a running service is a no-op.
    pub async fn start(&self) -> Result<(), ServiceError> {
        match self.lifecycle_state() {
            LifecycleState::Stopped => return Err(ServiceError::Stopped),
            LifecycleState::Running => {
                debug!("appconfig: service already started");
                return Ok(());
            }
            LifecycleState::Idle => {}
        }

        let outcome = self.fetch_once().await?;

        let mut lifecycle = lock(&self.shared.lifecycle);
        if *lifecycle == LifecycleState::Stopped {
            return Err(ServiceError::Stopped);
        }
        *lifecycle = LifecycleState::Running;
        info!(
            next_poll = ?outcome.next_interval,
            "appconfig: configuration initialized successfully"
        );
        Ok(())
    }

    /// Cancels the pending poll and any in-flight provider call, then
    /// releases every subscriber. Idempotent.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
        let had_poller = self.shared.abort_poller();
        self.shared.broadcaster.close();
        lock(&self.shared.state).next_poll = None;

        let mut lifecycle = lock(&self.shared.lifecycle);
        if *lifecycle != LifecycleState::Stopped {
            *lifecycle = LifecycleState::Stopped;
            info!(had_poller, "appconfig: configuration service stopped");
        }
    }

    /// Runs one fetch cycle now.
    ///
    /// While the background poller is alive the request is handed to it, so
    /// its timer restarts from the returned interval. Otherwise the fetch runs
    /// inline and, on success, the poller is (re)armed.
    pub async fn fetch_once(&self) -> Result<FetchOutcome, ServiceError> {
        if self.shared.cancel.is_cancelled() {
            return Err(ServiceError::Stopped);
        }

        if let Some(signals) = self.shared.poller_signals() {
            let (tx, rx) = oneshot::channel();
            if signals.send(PollerSignal::Refresh(tx)).await.is_ok() {
                match rx.await {
                    Ok(result) => return result,
                    Err(_) if self.shared.cancel.is_cancelled() => {
                        return Err(ServiceError::Stopped)
                    }
                    // The poller exited before serving the request; fetch inline.
                    Err(_) => {}
                }
            }
        }

        let outcome = self.shared.fetch_cycle().await?;
        self.shared.schedule_next(outcome.next_interval);
        Ok(outcome)
    }

    /// Latest snapshot, if one has been fetched.
    pub fn current_value(&self) -> Option<Arc<T>> {
        self.shared.broadcaster.current()
    }

    /// Returns the current snapshot, fetching the first one if needed.
    pub async fn get_value(&self) -> Result<Arc<T>, ServiceError> {
        if let Some(value) = self.current_value() {
            return Ok(value);
        }
        if self.shared.cancel.is_cancelled() {
            return Err(ServiceError::Stopped);
        }
        let (waiter, next) = self.shared.broadcaster.await_next();
        if let Err(e) = self.fetch_once().await {
            waiter.unsubscribe();
            return Err(e);
        }
        next.await.map_err(|_| ServiceError::Stopped)
    }

    /// Registers `callback` for every new snapshot.
    ///
    /// The current snapshot, if any, is delivered before this returns. After
    /// `stop()` the returned handle is inactive and the callback never runs.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        if self.shared.broadcaster.is_closed() {
            warn!("appconfig: subscribe called on a stopped service");
        }
        self.shared.broadcaster.subscribe(callback)
    }

    /// Drops the held session token so the next fetch opens a new session.
    pub async fn reset_session(&self) {
        self.shared.session.reset().await;
    }

    /// Diagnostic view of the service.
    pub async fn snapshot(&self) -> ServiceSnapshot {
        let session_active = self.shared.session.is_active().await;
        let state = lock(&self.shared.state);
        ServiceSnapshot {
            lifecycle: self.lifecycle_state(),
            has_value: self.shared.broadcaster.has_value(),
            session_active,
            polls: state.polls,
            updates: state.updates,
            consecutive_errors: state.consecutive_errors,
            last_error: state.last_error.clone(),
            last_attempt: state.last_attempt,
            last_success: state.last_success,
            next_poll: state.next_poll,
            subscribers: self.shared.broadcaster.subscriber_count(),
        }
    }
}

/// Start/stop hooks driven by the embedding process.
#[async_trait]
pub trait HostLifecycle: Send + Sync {
    /// Called once when the host wants configuration available.
    async fn on_start(&self) -> Result<(), ServiceError>;
    /// Called once during shutdown.
    fn on_stop(&self);
}

#[async_trait]
impl<T> HostLifecycle for ConfigService<T>
where
    T: Send + Sync + 'static,
{
    async fn on_start(&self) -> Result<(), ServiceError> {
        self.start().await
    }

    fn on_stop(&self) {
        self.stop();
    }
}
