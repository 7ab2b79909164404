// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Latest-value holder with replay-on-subscribe fan-out.
//!
//! Every published value gets a monotonically increasing sequence number.
//! Each subscriber remembers the highest sequence it has been handed and
//! serialises its own deliveries, so a subscriber never observes an older
//! snapshot after a newer one, even when a late subscriber's replay races a
//! concurrent publish.
//!
//! Fan-out runs under a re-entrant delivery gate. `unsubscribe_all` clears the
//! subscribers and then passes through the gate, so a callback already past its
//! activity check finishes before it returns. Callbacks may subscribe or stop
//! the service from inside the fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use parking_lot::ReentrantMutex;
use tokio::sync::oneshot;

use super::util::lock;

type Callback<T> = Box<dyn Fn(Arc<T>) + Send + Sync>;

struct Subscriber<T> {
    id: u64,
    active: Arc<AtomicBool>,
    /// Deactivate after the first delivery.
    once: bool,
    /// Highest sequence delivered. Held while the callback runs.
    delivered: Mutex<u64>,
    callback: Callback<T>,
}

impl<T> Subscriber<T> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deliver(&self, seq: u64, value: &Arc<T>) {
        let mut delivered = lock(&self.delivered);
        if !self.is_active() || seq <= *delivered {
            return;
        }
        *delivered = seq;
        if self.once {
            self.active.store(false, Ordering::Release);
        }
        (self.callback)(Arc::clone(value));
    }
}

struct State<T> {
    current: Option<(u64, Arc<T>)>,
    last_seq: u64,
    next_id: u64,
    /// Set by `close`; new registrations are refused.
    closed: bool,
    subscribers: Vec<Arc<Subscriber<T>>>,
}

/// Removes a subscriber by id without knowing the value type.
trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: Send + Sync> Detach for Mutex<State<T>> {
    fn detach(&self, id: u64) {
        lock(self).subscribers.retain(|subscriber| subscriber.id != id);
    }
}

/// Handle returned by [`ChangeBroadcaster::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`SubscriptionHandle::unsubscribe`] to stop receiving values.
pub struct SubscriptionHandle {
    id: u64,
    active: Arc<AtomicBool>,
    owner: Weak<dyn Detach>,
}

impl SubscriptionHandle {
    /// Returns `false` once the subscription was cancelled or the broadcaster drained.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn unsubscribe(self) {
        self.active.store(false, Ordering::Release);
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(self.id);
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Holds the latest configuration snapshot and fans it out to subscribers.
pub struct ChangeBroadcaster<T> {
    state: Arc<Mutex<State<T>>>,
    /// Held for the whole fan-out; taken before `state`.
    gate: Arc<ReentrantMutex<()>>,
}

impl<T> Clone for ChangeBroadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<T> Default for ChangeBroadcaster<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ChangeBroadcaster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ChangeBroadcaster")
            .field("has_value", &state.current.is_some())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl<T> ChangeBroadcaster<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                current: None,
                last_seq: 0,
                next_id: 0,
                closed: false,
                subscribers: Vec::new(),
            })),
            gate: Arc::new(ReentrantMutex::new(())),
        }
    }

    /// Returns the latest snapshot, if one was ever published.
    pub fn current(&self) -> Option<Arc<T>> {
        lock(&self.state)
            .current
            .as_ref()
            .map(|(_, value)| Arc::clone(value))
    }

    pub fn has_value(&self) -> bool {
        lock(&self.state).current.is_some()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state)
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.is_active())
            .count()
    }

    /// Stores `value` as the new snapshot and notifies subscribers in subscription order.
    pub fn publish(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let _gate = self.gate.lock();
        let (seq, subscribers) = {
            let mut state = lock(&self.state);
            state.last_seq += 1;
            let seq = state.last_seq;
            state.current = Some((seq, Arc::clone(&value)));
            state.subscribers.retain(|subscriber| subscriber.is_active());
            (seq, state.subscribers.clone())
        };
        for subscriber in subscribers {
            subscriber.deliver(seq, &value);
        }
        value
    }

    /// Registers `callback`; the current snapshot, if any, is replayed before returning.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.register(Box::new(callback), false)
    }

    /// Resolves with the first value delivered after the call (the current snapshot if one exists).
    ///
    /// The receiver errors if the broadcaster is drained before a value arrives.
    /// A caller that gives up waiting should unsubscribe the returned handle.
    pub fn await_next(&self) -> (SubscriptionHandle, oneshot::Receiver<Arc<T>>) {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let handle = self.register(
            Box::new(move |value| {
                if let Some(tx) = lock(&slot).take() {
                    let _ = tx.send(value);
                }
            }),
            true,
        );
        (handle, rx)
    }

    /// Removes every subscriber. No callback runs after this returns, except
    /// one on the calling thread's own stack.
    pub fn unsubscribe_all(&self) {
        let drained: Vec<_> = lock(&self.state).subscribers.drain(..).collect();
        for subscriber in &drained {
            subscriber.active.store(false, Ordering::Release);
        }
        // Wait out a fan-out that passed the activity check before the flags flipped.
        drop(self.gate.lock());
    }

    /// Drains subscribers and refuses new ones. The last snapshot stays readable.
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.unsubscribe_all();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    fn register(&self, callback: Callback<T>, once: bool) -> SubscriptionHandle {
        let owner: Weak<dyn Detach> = Arc::downgrade(&self.state) as Weak<dyn Detach>;
        let _gate = self.gate.lock();
        let (subscriber, replay) = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            if state.closed {
                return SubscriptionHandle {
                    id,
                    active: Arc::new(AtomicBool::new(false)),
                    owner,
                };
            }
            state.subscribers.retain(|subscriber| subscriber.is_active());
            let subscriber = Arc::new(Subscriber {
                id,
                active: Arc::new(AtomicBool::new(true)),
                once,
                delivered: Mutex::new(0),
                callback,
            });
            state.subscribers.push(Arc::clone(&subscriber));
            (subscriber, state.current.clone())
        };
        if let Some((seq, value)) = replay {
            subscriber.deliver(seq, &value);
        }

        SubscriptionHandle {
            id: subscriber.id,
            active: Arc::clone(&subscriber.active),
            owner,
        }
    }
}
