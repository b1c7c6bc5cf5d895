// src/core/events.rs

use crate::models::OptionChanged;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Callback = Arc<dyn Fn(&OptionChanged) + Send + Sync>;

/// Token returned by a subscription; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The set of "option changed" listeners attached to one node.
///
/// Delivery is synchronous and snapshot-based: the listener list is copied
/// under the lock and invoked without it, so a listener may freely subscribe
/// or unsubscribe (on this node or any other) while being delivered to. A
/// panicking listener is isolated so its siblings still receive the event.
#[derive(Default)]
pub struct SubscriberSet {
    listeners: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its cancellation token.
    pub fn subscribe(
        &self,
        listener: impl Fn(&OptionChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Delivers `event` to every currently-registered listener.
    ///
    /// A panic raised by one listener must not prevent delivery to the
    /// others, so each invocation is unwound in isolation and reported
    /// through the log.
    pub fn emit(&self, event: &OptionChanged) {
        let snapshot: Vec<Callback> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::error!(
                    "A change listener panicked while handling '{}'; continuing with remaining listeners.",
                    event.option_name
                );
            }
        }
    }

    /// Number of live subscriptions. Used by tests and diagnostics.
    pub fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("listeners", &self.len())
            .finish()
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> impl Fn(&OptionChanged) + Send + Sync + use<> {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emit_reaches_every_listener() {
        let set = SubscriberSet::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        set.subscribe(counting_listener(&first));
        set.subscribe(counting_listener(&second));

        set.emit(&OptionChanged::new("tab_size"));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let set = SubscriberSet::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = set.subscribe(counting_listener(&counter));

        assert!(set.unsubscribe(id));
        assert!(!set.unsubscribe(id));

        set.emit(&OptionChanged::new("tab_size"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_starve_siblings() {
        let set = SubscriberSet::new();
        let counter = Arc::new(AtomicUsize::new(0));
        set.subscribe(|_| panic!("listener bug"));
        set.subscribe(counting_listener(&counter));

        set.emit(&OptionChanged::new("word_wrap"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_mutate_subscriptions_mid_delivery() {
        let set = Arc::new(SubscriberSet::new());
        let counter = Arc::new(AtomicUsize::new(0));

        // The first listener registers a new one while being delivered to;
        // the snapshot rule means the newcomer only sees later events.
        let set_handle = Arc::clone(&set);
        let late_counter = Arc::clone(&counter);
        set.subscribe(move |_| {
            let counter = Arc::clone(&late_counter);
            set_handle.subscribe(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        set.emit(&OptionChanged::new("tab_size"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        set.emit(&OptionChanged::new("tab_size"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
