// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fetch cycle and background poll loop.
//!
//! A single poller task owns the timer. Explicit fetches issued while it is
//! alive are routed through its signal channel, so a manual refresh always
//! replaces the pending timer instead of running next to it.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument};

use super::broadcast::ChangeBroadcaster;
use super::config::ServiceConfig;
use super::retry::RetryBackoff;
use super::session::SessionManager;
use super::state::{LifecycleState, PollState};
use super::telemetry::PollerTelemetry;
use super::util::{lock, media_type};
use super::{ConfigChange, FetchOutcome, ServiceError};
use crate::decode::Deserializer;
use crate::provider::SessionToken;

/// Capacity of the poller signal channel.
const SIGNAL_CHANNEL_CAPACITY: usize = 8;

/// Instruction sent to a running poller.
pub(crate) enum PollerSignal {
    /// Fetch now and report the outcome to the caller.
    Refresh(oneshot::Sender<Result<FetchOutcome, ServiceError>>),
    /// Replace the pending delay.
    Reschedule(Duration),
}

/// Handle to the spawned poller task.
pub(crate) struct PollSchedule {
    signals: mpsc::Sender<PollerSignal>,
    handle: JoinHandle<()>,
}

impl PollSchedule {
    fn is_alive(&self) -> bool {
        !self.signals.is_closed() && !self.handle.is_finished()
    }
}

/// State shared between the public service handle and its poller task.
pub(crate) struct ServiceShared<T> {
    pub(crate) session: SessionManager,
    pub(crate) broadcaster: ChangeBroadcaster<T>,
    pub(crate) deserializer: Arc<dyn Deserializer<T>>,
    pub(crate) config: ServiceConfig,
    pub(crate) telemetry: RwLock<Arc<dyn PollerTelemetry>>,
    pub(crate) state: Mutex<PollState>,
    pub(crate) lifecycle: Mutex<LifecycleState>,
    /// Serialises fetch cycles so token rotation stays linear.
    pub(crate) fetch_lock: tokio::sync::Mutex<()>,
    pub(crate) cancel: CancellationToken,
    pub(crate) schedule: Mutex<Option<PollSchedule>>,
}

impl<T> ServiceShared<T>
where
    T: Send + Sync + 'static,
{
    fn telemetry(&self) -> Arc<dyn PollerTelemetry> {
        self.telemetry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Races `fut` against shutdown.
    async fn cancellable<F, R>(&self, fut: F) -> Result<R, ServiceError>
    where
        F: Future<Output = Result<R, ServiceError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Stopped),
            result = fut => result,
        }
    }

    /// Runs one session/poll/decode/publish cycle.
    pub(crate) async fn fetch_cycle(&self) -> Result<FetchOutcome, ServiceError> {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Stopped);
        }
        let _guard = self
            .cancellable(async { Ok(self.fetch_lock.lock().await) })
            .await?;
        lock(&self.state).record_attempt();

        let result = self.poll_and_publish().await;
        let telemetry = self.telemetry();
        match &result {
            Ok(outcome) => {
                lock(&self.state).record_success(outcome);
                match outcome.change {
                    ConfigChange::Updated => {
                        telemetry.on_configuration_updated(outcome.next_interval)
                    }
                    ConfigChange::Unchanged => {
                        telemetry.on_configuration_unchanged(outcome.next_interval)
                    }
                }
            }
            Err(ServiceError::Stopped) => {}
            Err(err) => {
                lock(&self.state).record_error(err);
                telemetry.on_poll_error(err);
            }
        }
        result
    }

    async fn poll_and_publish(&self) -> Result<FetchOutcome, ServiceError> {
        let had_session = self.session.is_active().await;
        let token = self.cancellable(self.session.ensure_session()).await?;
        if !had_session {
            self.telemetry().on_session_started();
        }

        let result = self
            .cancellable(async {
                self.session
                    .provider()
                    .poll(&token)
                    .await
                    .map_err(ServiceError::from)
            })
            .await?;

        if !result.status_ok() {
            return Err(ServiceError::PollHttp(result.status));
        }
        if !self
            .config
            .accepts_content_type(result.content_type.as_deref())
        {
            debug!(
                content_type = media_type(result.content_type.as_deref()),
                "appconfig: unexpected payload content type"
            );
            return Err(ServiceError::PollContentType(result.content_type));
        }
        let next_token = result
            .next_token
            .and_then(SessionToken::new)
            .ok_or(ServiceError::PollToken)?;

        let change = if result.payload.is_empty() {
            if !self.broadcaster.has_value() {
                return Err(ServiceError::EmptyConfiguration);
            }
            debug!("appconfig: configuration unchanged");
            ConfigChange::Unchanged
        } else {
            let value = self.deserializer.decode(&result.payload)?;
            if self.cancel.is_cancelled() {
                return Err(ServiceError::Stopped);
            }
            self.broadcaster.publish(value);
            debug!(bytes = result.payload.len(), "appconfig: configuration updated");
            ConfigChange::Updated
        };

        self.session.rotate(next_token).await;
        Ok(FetchOutcome {
            change,
            next_interval: self.config.next_delay(result.next_interval),
        })
    }

    /// Sender for the live poller, if one is running.
    pub(crate) fn poller_signals(&self) -> Option<mpsc::Sender<PollerSignal>> {
        lock(&self.schedule)
            .as_ref()
            .filter(|schedule| schedule.is_alive())
            .map(|schedule| schedule.signals.clone())
    }

    /// Arms the next poll, spawning the poller if none is alive.
    pub(crate) fn schedule_next(self: &Arc<Self>, delay: Duration) {
        let mut slot = lock(&self.schedule);
        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(schedule) = slot.as_ref().filter(|schedule| schedule.is_alive()) {
            if schedule
                .signals
                .try_send(PollerSignal::Reschedule(delay))
                .is_err()
            {
                debug!("appconfig: poller busy; keeping its pending schedule");
            }
            return;
        }

        lock(&self.state).next_poll = Some(delay);
        let (signals, rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let handle = tokio::spawn(Arc::clone(self).run_poller(delay, rx).in_current_span());
        *slot = Some(PollSchedule { signals, handle });
        debug!(?delay, "appconfig: background polling started");
    }

    /// Cancels the poller task. Returns `true` if one was running.
    pub(crate) fn abort_poller(&self) -> bool {
        match lock(&self.schedule).take() {
            Some(schedule) => {
                schedule.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Background loop: waits for the timer or a signal, fetches, reschedules.
    pub(crate) async fn run_poller(
        self: Arc<Self>,
        mut delay: Duration,
        mut signals: mpsc::Receiver<PollerSignal>,
    ) {
        let mut backoff = self.config.background_retry.map(RetryBackoff::new);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("appconfig: poller shutting down");
                    break;
                }
                Some(signal) = signals.recv() => match signal {
                    PollerSignal::Refresh(completion) => {
                        debug!("appconfig: explicit refresh requested");
                        let result = self.fetch_cycle().await;
                        let next = self.next_delay_after(&result, backoff.as_mut()).await;
                        let _ = completion.send(result);
                        next
                    }
                    PollerSignal::Reschedule(next) => Some(next),
                },
                _ = sleep(delay) => {
                    let result = self.fetch_cycle().await;
                    self.next_delay_after(&result, backoff.as_mut()).await
                }
            };

            match next {
                Some(next) => {
                    delay = next;
                    lock(&self.state).next_poll = Some(delay);
                }
                None => break,
            }
        }
        lock(&self.state).next_poll = None;
    }

    /// Delay before the next cycle, or `None` when polling should halt.
    async fn next_delay_after(
        &self,
        result: &Result<FetchOutcome, ServiceError>,
        backoff: Option<&mut RetryBackoff>,
    ) -> Option<Duration> {
        let err = match result {
            Ok(outcome) => {
                if let Some(backoff) = backoff {
                    backoff.on_success();
                }
                return Some(outcome.next_interval);
            }
            Err(ServiceError::Stopped) => return None,
            Err(err) => err,
        };

        let Some(backoff) = backoff else {
            error!(%err, "appconfig: background poll failed; polling halted until the next fetch");
            return None;
        };
        if err.invalidates_session() {
            self.session.reset().await;
        }
        let retry_in = backoff.on_failure();
        warn!(%err, ?retry_in, "appconfig: background poll failed; retrying");
        self.telemetry().on_retry_scheduled(retry_in);
        Some(retry_in)
    }
}
