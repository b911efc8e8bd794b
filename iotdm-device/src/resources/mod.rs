//! Observable device state exposed to the management protocol.
//!
//! Every resource keeps its value, a revision counter and its observers behind
//! one lock. A mutation bumps the revision and notifies each observer exactly
//! once before the lock is released, so observers see mutations in commit
//! order. Observers must not call back into the resource they observe.
//!
//! One observer may be registered as the publisher, the notifier that reports
//! changes upstream and acknowledges them. A commit made while no publisher is
//! attached settles at once with [`AckOutcome::NotManaged`].

mod action;
mod device_data;
mod error_code;
mod firmware;
mod location;
mod log;

pub use action::{DeviceAction, DeviceActionEvent};
pub use device_data::{DeviceData, DeviceDataBuilder};
pub use error_code::{DiagnosticErrorCode, ErrorCodeChange};
pub use firmware::{DeviceFirmware, FirmwareAction, FirmwareChange};
pub use location::{DeviceLocation, LocationChange};
pub use log::{DiagnosticLog, LogChange};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

pub type ObserverId = u64;

pub type Observer<C> = Box<dyn Fn(&ResourceEvent<C>) + Send + Sync>;

/// Who caused a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Changed by the device itself; reported to the server.
    Device,
    /// Written by the server; never echoed back.
    Server,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent<C> {
    pub resource: &'static str,
    pub revision: u64,
    pub origin: Origin,
    pub change: C,
}

/// Server verdict on a published change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Pending,
    Accepted,
    Rejected(i32),
    TimedOut,
    PublishFailed,
    /// Management stopped before the server answered.
    Cancelled,
    /// No publisher was attached, so the change stayed local.
    NotManaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement {
    pub revision: u64,
    pub outcome: AckOutcome,
}

struct CoreState<T, C> {
    value: T,
    revision: u64,
    publisher: Option<ObserverId>,
    observers: Vec<(ObserverId, Observer<C>)>,
}

/// A resource the notifier pipeline can observe.
pub trait Resource: Send + Sync + 'static {
    type Value: Send + 'static;
    type Change: Clone + Send + Sync + 'static;

    fn core(&self) -> &ResourceCore<Self::Value, Self::Change>;
}

/// Shared machinery behind every concrete resource.
pub struct ResourceCore<T, C> {
    name: &'static str,
    state: Mutex<CoreState<T, C>>,
    next_observer: AtomicU64,
    wait_for_response: AtomicBool,
    ack: watch::Sender<Acknowledgement>,
}

impl<T, C> ResourceCore<T, C> {
    pub fn new(name: &'static str, value: T, wait_for_response: bool) -> Self {
        let (ack, _) = watch::channel(Acknowledgement {
            revision: 0,
            outcome: AckOutcome::Accepted,
        });

        Self {
            name,
            state: Mutex::new(CoreState {
                value,
                revision: 0,
                publisher: None,
                observers: Vec::new(),
            }),
            next_observer: AtomicU64::new(1),
            wait_for_response: AtomicBool::new(wait_for_response),
            ack,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, CoreState<T, C>> {
        // A panicking observer must not wedge the resource.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock().value)
    }

    /// Apply a mutation. `mutate` returns the change to announce, or `None`
    /// when nothing changed, in which case no revision is consumed.
    pub fn commit<F>(&self, origin: Origin, mutate: F) -> Option<u64>
    where
        F: FnOnce(&mut T) -> Option<C>,
    {
        let mut state = self.lock();
        let change = mutate(&mut state.value)?;

        state.revision += 1;

        let event = ResourceEvent {
            resource: self.name,
            revision: state.revision,
            origin,
            change,
        };
        for (_, observer) in &state.observers {
            observer(&event);
        }

        if state.publisher.is_none() {
            let outcome = match origin {
                Origin::Device => AckOutcome::NotManaged,
                Origin::Server => AckOutcome::Accepted,
            };
            self.acknowledge(event.revision, outcome);
        }

        Some(event.revision)
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Whether a committed change still waits for its verdict.
    pub fn is_dirty(&self) -> bool {
        let revision = self.revision();
        let last = self.last_acknowledgement();
        last.revision < revision || last.outcome == AckOutcome::Pending
    }

    pub fn add_observer(&self, observer: Observer<C>) -> ObserverId {
        let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        self.lock().observers.push((id, observer));
        id
    }

    /// Register the observer that publishes and acknowledges changes.
    /// Replaces any previous publisher.
    pub fn add_publisher(&self, observer: Observer<C>) -> ObserverId {
        let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        let mut state = self.lock();
        state.observers.push((id, observer));
        state.publisher = Some(id);
        id
    }

    pub fn has_publisher(&self) -> bool {
        self.lock().publisher.is_some()
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut state = self.lock();
        if state.publisher == Some(id) {
            state.publisher = None;
        }
        let before = state.observers.len();
        state.observers.retain(|(observer_id, _)| *observer_id != id);
        state.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    pub fn wait_for_response(&self) -> bool {
        self.wait_for_response.load(Ordering::Relaxed)
    }

    pub fn set_wait_for_response(&self, wait: bool) {
        self.wait_for_response.store(wait, Ordering::Relaxed);
    }

    pub fn acknowledge(&self, revision: u64, outcome: AckOutcome) {
        self.ack.send_replace(Acknowledgement { revision, outcome });
    }

    pub fn last_acknowledgement(&self) -> Acknowledgement {
        *self.ack.borrow()
    }

    /// Wait until the server verdict for `revision` (or a later one) is known.
    pub async fn wait_acknowledged(&self, revision: u64) -> AckOutcome {
        let mut rx = self.ack.subscribe();
        let result = rx
            .wait_for(|ack| ack.revision >= revision && ack.outcome != AckOutcome::Pending)
            .await;

        match result {
            Ok(ack) => ack.outcome,
            // The sender lives as long as `self`.
            Err(_) => AckOutcome::Pending,
        }
    }
}

/// Listeners for fire-and-forget action events.
///
/// Listeners are invoked outside the registry lock and may call back into the
/// resource that fired them.
pub struct ActionListeners<A> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ObserverId, Arc<dyn Fn(A) + Send + Sync>)>>,
}

impl<A: Copy> ActionListeners<A> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ObserverId
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Fire `action` to every listener; returns how many were notified.
    pub fn fire(&self, action: A) -> usize {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(action);
        }

        listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: Copy> Default for ActionListeners<A> {
    fn default() -> Self {
        Self::new()
    }
}
