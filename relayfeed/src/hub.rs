//! Subscriber registry. Listeners get `(state, last snapshot)` on every change;
//! a panicking listener is logged and skipped so the others still receive it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::warn;

use crate::types::{ConnectionState, MetricsSnapshot};

pub type Listener = Arc<dyn Fn(ConnectionState, Option<&MetricsSnapshot>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    /// Session allowed to publish; `None` after stop.
    active: Option<u64>,
    generation: u64,
}

#[derive(Clone)]
pub(crate) struct Hub {
    inner: Arc<Mutex<Inner>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

impl Hub {
    pub(crate) fn new(initial: ConnectionState) -> Self {
        let (state_tx, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                listeners: Vec::new(),
                active: None,
                generation: 0,
            })),
            state_tx: Arc::new(state_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // listeners run under catch_unwind, so a poisoned lock still holds valid data
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.listeners.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(i, _)| *i != id);
        inner.listeners.len() != before
    }

    /// Open a new publishing session; any older session goes silent.
    pub(crate) fn activate(&self) -> Publisher {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.active = Some(inner.generation);
        Publisher {
            hub: self.clone(),
            session: inner.generation,
        }
    }

    /// Silence the current session. Returns once no delivery is in progress.
    pub(crate) fn deactivate(&self, reset_to: ConnectionState) {
        let mut inner = self.lock();
        inner.active = None;
        self.state_tx.send_replace(reset_to);
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn publish(&self, session: u64, state: ConnectionState, snapshot: Option<&MetricsSnapshot>) {
        let inner = self.lock();
        if inner.active != Some(session) {
            return;
        }
        self.state_tx.send_replace(state);
        for (id, listener) in &inner.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(state, snapshot))).is_err() {
                warn!(subscription = id.0, %state, "feed listener panicked; continuing delivery");
            }
        }
    }
}

/// Publishing handle owned by one running session.
pub(crate) struct Publisher {
    hub: Hub,
    session: u64,
}

impl Publisher {
    pub(crate) fn publish(&self, state: ConnectionState, snapshot: Option<&MetricsSnapshot>) {
        self.hub.publish(self.session, state, snapshot);
    }
}
