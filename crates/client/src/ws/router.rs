//! Publish/subscribe registry mapping event-type strings to callbacks.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::error;

use super::RealtimeEvent;

/// A registered callback.
///
/// Listeners are compared by pointer identity: keep the `Listener` you
/// registered if you want to remove it later. Two separately created
/// closures never compare equal, even if textually identical.
pub type Listener = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Build a [`Listener`] from a closure.
pub fn listener(f: impl Fn(&RealtimeEvent) + Send + Sync + 'static) -> Listener {
    Arc::new(f)
}

/// Event-type string → ordered list of subscribed callbacks.
///
/// Registry mutation and fan-out are serialized by an internal mutex, but
/// callbacks themselves run with the lock released, so a listener may call
/// [`on`](EventRouter::on)/[`off`](EventRouter::off) re-entrantly.
#[derive(Default)]
pub struct EventRouter {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `event_type`. Appends, so invocation order
    /// is registration order; registering the same listener twice yields two
    /// invocations per event.
    pub fn on(&self, event_type: &str, callback: Listener) {
        self.lock()
            .entry(event_type.to_string())
            .or_default()
            .push(callback);
    }

    /// Remove the first registration of `callback` under `event_type`.
    /// Unknown event types and unregistered callbacks are a no-op.
    pub fn off(&self, event_type: &str, callback: &Listener) {
        let mut listeners = self.lock();
        if let Some(list) = listeners.get_mut(event_type) {
            if let Some(idx) = list.iter().position(|l| Arc::ptr_eq(l, callback)) {
                list.remove(idx);
            }
        }
    }

    /// Fan `event` out to every subscriber of `event_type`, in registration
    /// order. No subscribers means the event is silently dropped. Each
    /// invocation is isolated: a panicking callback is logged and the
    /// remaining callbacks still run.
    pub(crate) fn publish(&self, event_type: &str, event: &RealtimeEvent) {
        let callbacks: Vec<Listener> = match self.lock().get(event_type) {
            Some(list) => list.clone(),
            None => return,
        };
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!("listener for '{}' panicked; continuing fan-out", event_type);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
