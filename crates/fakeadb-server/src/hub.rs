//! State-change hubs and per-subscriber queues
//!
//! A hub fans events out to every subscriber registered at the moment of the
//! notification. Each subscriber owns a [`StateChangeQueue`] that its
//! connection task drains; the hub itself never writes to a socket.
//!
//! The hub lock guards both membership and enqueueing, so a subscriber
//! removed before a notification never sees it and one present during it
//! sees it exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

use fakeadb_core::prelude::*;

/// Events published by the server's device hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStateChange {
    /// A device was connected or disconnected
    DeviceListChanged,
    /// A device's status changed
    DeviceStatusChanged { serial: String },
}

/// Events published by a device's client hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStateChange {
    /// A client process started or stopped
    ClientListChanged,
    /// A line was appended to the device's logcat
    LogcatMessage(String),
}

pub type DeviceStateChangeHub = StateChangeHub<DeviceStateChange>;
pub type ClientStateChangeHub = StateChangeHub<ClientStateChange>;

enum Envelope<E> {
    Event(E),
    Stop,
}

struct HubState<E> {
    next_id: u64,
    stopped: bool,
    subscribers: HashMap<u64, mpsc::UnboundedSender<Envelope<E>>>,
}

struct HubInner<E> {
    name: &'static str,
    state: Mutex<HubState<E>>,
}

impl<E> HubInner<E> {
    fn lock(&self) -> MutexGuard<'_, HubState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }
}

/// Fan-out registry of subscriber queues
pub struct StateChangeHub<E> {
    inner: Arc<HubInner<E>>,
}

impl<E> Clone for StateChangeHub<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Clone + Send + 'static> StateChangeHub<E> {
    /// Create a hub; `name` only appears in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(HubInner {
                name,
                state: Mutex::new(HubState {
                    next_id: 1,
                    stopped: false,
                    subscribers: HashMap::new(),
                }),
            }),
        }
    }

    /// Register a new subscriber
    ///
    /// Returns `None` once the hub has been stopped.
    pub fn subscribe(&self) -> Option<StateChangeQueue<E>> {
        let mut state = self.inner.lock();
        if state.stopped {
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.insert(id, tx);
        trace!("{} hub: subscriber {} registered", self.inner.name, id);

        Some(StateChangeQueue {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        })
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: u64) {
        if self.inner.remove(id) {
            trace!("{} hub: subscriber {} removed", self.inner.name, id);
        }
    }

    /// Enqueue `event` on every registered queue
    pub fn notify(&self, event: E) {
        let mut state = self.inner.lock();
        state
            .subscribers
            .retain(|_, tx| tx.send(Envelope::Event(event.clone())).is_ok());
    }

    /// Push a stop sentinel to every queue and refuse new subscribers
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        for (_, tx) in state.subscribers.drain() {
            let _ = tx.send(Envelope::Stop);
        }
        debug!("{} hub stopped", self.inner.name);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl StateChangeHub<DeviceStateChange> {
    pub fn device_list_changed(&self) {
        self.notify(DeviceStateChange::DeviceListChanged);
    }

    pub fn device_status_changed(&self, serial: &str) {
        self.notify(DeviceStateChange::DeviceStatusChanged {
            serial: serial.to_string(),
        });
    }
}

impl StateChangeHub<ClientStateChange> {
    pub fn client_list_changed(&self) {
        self.notify(ClientStateChange::ClientListChanged);
    }

    pub fn logcat_message(&self, message: &str) {
        self.notify(ClientStateChange::LogcatMessage(message.to_string()));
    }
}

/// Pending events for one subscriber, in FIFO order
///
/// Dropping the queue unsubscribes it.
pub struct StateChangeQueue<E> {
    id: u64,
    rx: mpsc::UnboundedReceiver<Envelope<E>>,
    hub: Weak<HubInner<E>>,
}

impl<E> StateChangeQueue<E> {
    /// Subscription id, usable with [`StateChangeHub::unsubscribe`]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event
    ///
    /// Returns `None` when the hub was stopped or this queue was unsubscribed
    /// and everything enqueued before that has been taken.
    pub async fn take(&mut self) -> Option<E> {
        match self.rx.recv().await? {
            Envelope::Event(event) => Some(event),
            Envelope::Stop => None,
        }
    }

    /// Take an event that is already queued, without waiting
    pub fn try_take(&mut self) -> Option<E> {
        match self.rx.try_recv().ok()? {
            Envelope::Event(event) => Some(event),
            Envelope::Stop => None,
        }
    }
}

impl<E> Drop for StateChangeQueue<E> {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}
