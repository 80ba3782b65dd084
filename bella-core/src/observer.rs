//! Synchronous observer lists with per-subscriber failure isolation

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Handle returned by `subscribe`, unique across all observer lists
pub type SubscriptionId = u64;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of callbacks notified in registration order
pub struct ObserverList<T> {
    label: &'static str,
    observers: RwLock<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> ObserverList<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        self.observers.write().push((id, Arc::new(callback)));
        id
    }

    /// Returns false when the id was not registered here
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Notify every observer registered at call time.
    ///
    /// Iterates over a snapshot, so callbacks may subscribe or unsubscribe
    /// (themselves included) without deadlocking. A panicking callback is
    /// logged and skipped. Returns the number of callbacks that panicked.
    pub fn notify(&self, event: &T) -> usize {
        let snapshot: Vec<Callback<T>> = self
            .observers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        let mut failures = 0;
        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                failures += 1;
                error!(observer = self.label, "Subscriber callback panicked, continuing with remaining subscribers");
            }
        }
        failures
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn clear(&self) {
        self.observers.write().clear();
    }
}
