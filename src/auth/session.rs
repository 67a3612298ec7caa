//! Current session state with synchronous change notification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::auth::domain::SessionState;

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

struct Inner {
    state: RwLock<SessionState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    // Serializes set + notify so deliveries never interleave.
    publish: Mutex<()>,
}

/// Shared handle to the process-wide session. Clones observe the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(SessionState::Unauthenticated),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                publish: Mutex::new(()),
            }),
        }
    }

    pub fn current(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.read().is_authenticated()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Registers `listener` for every subsequent change. The returned handle
    /// unsubscribes when dropped.
    ///
    /// Listeners run synchronously on the publishing thread while the
    /// publish lock is held. Inside a listener it is fine to call
    /// [`current`](Self::current), `subscribe` or drop a [`Subscription`].
    /// Calling [`watch`](Self::watch) or anything that changes the session
    /// (such as `AuthCoordinator::sign_out`) deadlocks; hand that work to
    /// another task instead.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        debug!(subscription = id, "session subscriber added");

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Like [`subscribe`](Self::subscribe), but first delivers the current
    /// state. No change can slip in between the replay and registration.
    ///
    /// Takes the publish lock, so it must not be called from inside a
    /// listener. The same restrictions apply to `listener` as to
    /// `subscribe`, including during the replay.
    pub fn watch<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let _publishing = self.inner.publish.lock();
        listener(&self.current());
        self.subscribe(listener)
    }

    /// Replaces the state and notifies the subscribers registered at this
    /// moment, in subscription order. Listeners run without the state lock
    /// held but under the publish lock; see [`subscribe`](Self::subscribe).
    pub(crate) fn set(&self, state: SessionState) {
        let _publishing = self.inner.publish.lock();
        self.publish(state);
    }

    /// Moves to `Unauthenticated` if currently authenticated. Returns whether
    /// anything changed.
    pub(crate) fn clear(&self) -> bool {
        let _publishing = self.inner.publish.lock();
        if !self.inner.state.read().is_authenticated() {
            return false;
        }
        self.publish(SessionState::Unauthenticated);
        true
    }

    fn publish(&self, state: SessionState) {
        *self.inner.state.write() = state.clone();

        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        debug!(
            authenticated = state.is_authenticated(),
            subscribers = listeners.len(),
            "session state published"
        );

        for listener in listeners {
            listener(&state);
        }
    }
}

/// Handle returned by [`SessionStore::subscribe`].
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
            debug!(subscription = self.id, "session subscriber removed");
        }
    }
}
