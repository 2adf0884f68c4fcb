//! Listener registration and ordered, fault-isolated dispatch.
//!
//! The listener set is copy-on-write: a dispatch works on an immutable
//! snapshot, so registrations made concurrently take effect from the next
//! record on and a dispatch never sees a half-updated set.

use crate::metrics::{Counter, Counters, StreamMetrics};
use crate::signal::StopSignal;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};
use userstream_core::{DecodedEvent, StreamError, StreamListener};

/// Handle returned by [`ListenerSet::add`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Registered {
    id: ListenerId,
    listener: Arc<dyn StreamListener>,
}

/// Ordered set of listeners. Insertion order is dispatch order.
pub struct ListenerSet {
    entries: RwLock<Arc<Vec<Registered>>>,
    next_id: AtomicU64,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, listener: Arc<dyn StreamListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Registered> = entries.iter().cloned().collect();
        next.push(Registered { id, listener });
        *entries = Arc::new(next);
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.iter().any(|r| r.id == id) {
            return false;
        }
        let next: Vec<Registered> = entries.iter().filter(|r| r.id != id).cloned().collect();
        *entries = Arc::new(next);
        true
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The listeners as of now, in dispatch order.
    pub fn snapshot(&self) -> Vec<Arc<dyn StreamListener>> {
        self.current().iter().map(|r| Arc::clone(&r.listener)).collect()
    }

    fn current(&self) -> Arc<Vec<Registered>> {
        Arc::clone(&*self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivers events and errors to every registered listener.
pub struct Dispatcher {
    listeners: Arc<ListenerSet>,
    counters: Arc<Counters>,
    stop: Option<StopSignal>,
}

impl Dispatcher {
    pub fn new(listeners: Arc<ListenerSet>) -> Self {
        Self {
            listeners,
            counters: Arc::new(Counters::default()),
            stop: None,
        }
    }

    pub(crate) fn with_parts(
        listeners: Arc<ListenerSet>,
        counters: Arc<Counters>,
        stop: StopSignal,
    ) -> Self {
        Self {
            listeners,
            counters,
            stop: Some(stop),
        }
    }

    pub fn listeners(&self) -> &Arc<ListenerSet> {
        &self.listeners
    }

    pub fn metrics(&self) -> StreamMetrics {
        self.counters.snapshot()
    }

    pub(crate) fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    fn halted(&self) -> bool {
        self.stop.as_ref().is_some_and(StopSignal::is_stopped)
    }

    /// Deliver `event` to each listener in order. A failing listener is
    /// reported through `on_exception` and delivery moves on to the next one.
    ///
    /// Returns the number of listeners that failed.
    pub fn dispatch(&self, event: &DecodedEvent) -> usize {
        let kind = event.kind();
        let listeners = self.listeners.current();
        let mut failures = Vec::new();
        let mut stopped_before_delivery = false;

        for (position, registered) in listeners.iter().enumerate() {
            if self.halted() {
                stopped_before_delivery = position == 0;
                break;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                event.deliver(registered.listener.as_ref())
            }));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            warn!(kind = %kind, listener = ?registered.id, "listener failed: {message}");
            failures.push(StreamError::Listener { kind, message });
        }

        if !failures.is_empty() {
            self.counters.add(Counter::ListenerFailures, failures.len() as u64);
        }
        if !stopped_before_delivery {
            self.counters.incr(Counter::EventsDispatched);
        }
        for failure in &failures {
            self.report(failure);
        }
        failures.len()
    }

    /// Deliver `error` to `on_exception` on every listener. Anything raised
    /// there is swallowed without further dispatch.
    pub fn report(&self, error: &StreamError) {
        let listeners = self.listeners.current();
        for registered in listeners.iter() {
            if self.halted() {
                return;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                registered.listener.on_exception(error)
            }));
            if let Err(payload) = outcome {
                debug!(
                    listener = ?registered.id,
                    "on_exception panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use userstream_core::{EventId, EventPayload, EventKind, ListenerResult, User};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Named {
        name: &'static str,
        log: Log,
        fail: Option<&'static str>,
    }

    impl StreamListener for Named {
        fn on_friend_list(&self, friend_ids: &[u64]) -> ListenerResult {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:friends:{}", self.name, friend_ids.len()));
            match self.fail {
                Some("error") => Err("boom".into()),
                Some("panic") => panic!("listener exploded"),
                _ => Ok(()),
            }
        }

        fn on_exception(&self, error: &StreamError) {
            self.log.lock().unwrap().push(format!("{}:exception:{error}", self.name));
            if self.fail == Some("panic") {
                panic!("exception handler exploded too");
            }
        }
    }

    fn named(name: &'static str, log: &Log, fail: Option<&'static str>) -> Arc<dyn StreamListener> {
        Arc::new(Named {
            name,
            log: Arc::clone(log),
            fail,
        })
    }

    fn friends(id: u64) -> DecodedEvent {
        DecodedEvent {
            id: EventId(id),
            payload: EventPayload::FriendList { friend_ids: vec![1, 2] },
        }
    }

    #[test]
    fn registration_order_is_dispatch_order() {
        let log = Log::default();
        let set = Arc::new(ListenerSet::new());
        set.add(named("a", &log, None));
        set.add(named("b", &log, None));
        set.add(named("c", &log, None));

        let dispatcher = Dispatcher::new(Arc::clone(&set));
        assert_eq!(dispatcher.dispatch(&friends(1)), 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:friends:2", "b:friends:2", "c:friends:2"]
        );
        assert_eq!(dispatcher.metrics().events_dispatched, 1);
    }

    #[test]
    fn failures_are_isolated_and_reported() {
        let log = Log::default();
        let set = Arc::new(ListenerSet::new());
        set.add(named("a", &log, Some("error")));
        set.add(named("b", &log, Some("panic")));
        set.add(named("c", &log, None));

        let dispatcher = Dispatcher::new(Arc::clone(&set));
        assert_eq!(dispatcher.dispatch(&friends(1)), 2);

        let log = log.lock().unwrap();
        assert_eq!(&log[..3], &["a:friends:2", "b:friends:2", "c:friends:2"]);
        // Two failures, each reported to all three listeners.
        let exceptions: Vec<_> = log.iter().filter(|l| l.contains(":exception:")).collect();
        assert_eq!(exceptions.len(), 6);
        assert!(exceptions[0].starts_with("a:exception:listener failed while handling friend_list: boom"));
        assert!(exceptions[3].contains("panicked: listener exploded"));
        assert_eq!(dispatcher.metrics().listener_failures, 2);
    }

    #[test]
    fn remove_listener() {
        let log = Log::default();
        let set = Arc::new(ListenerSet::new());
        let a = set.add(named("a", &log, None));
        let b = set.add(named("b", &log, None));
        assert!(set.remove(a));
        assert!(!set.remove(a));
        assert_ne!(a, b);
        assert_eq!(set.len(), 1);

        Dispatcher::new(Arc::clone(&set)).dispatch(&friends(1));
        assert_eq!(*log.lock().unwrap(), vec!["b:friends:2"]);
    }

    #[test]
    fn snapshot_survives_concurrent_mutation() {
        let log = Log::default();
        let set = Arc::new(ListenerSet::new());
        set.add(named("a", &log, None));
        let before = set.current();
        set.add(named("b", &log, None));
        assert_eq!(before.len(), 1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.snapshot().len(), 2);
    }

    #[test]
    fn halted_dispatcher_delivers_nothing() {
        let log = Log::default();
        let set = Arc::new(ListenerSet::new());
        set.add(named("a", &log, None));
        let stop = StopSignal::new();
        stop.trigger();
        let dispatcher = Dispatcher::with_parts(set, Arc::new(Counters::default()), stop);
        dispatcher.dispatch(&friends(1));
        dispatcher.report(&StreamError::Closed);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(dispatcher.metrics().events_dispatched, 0);
    }

    /// Fails its callback after raising the stop signal.
    struct StopsThenFails {
        stop: StopSignal,
    }

    impl StreamListener for StopsThenFails {
        fn on_friend_list(&self, _friend_ids: &[u64]) -> ListenerResult {
            self.stop.trigger();
            Err("stopping".into())
        }
    }

    #[test]
    fn stop_mid_dispatch_still_counts_failures() {
        let log = Log::default();
        let stop = StopSignal::new();
        let set = Arc::new(ListenerSet::new());
        set.add(Arc::new(StopsThenFails { stop: stop.clone() }));
        set.add(named("b", &log, None));
        let dispatcher = Dispatcher::with_parts(set, Arc::new(Counters::default()), stop);

        assert_eq!(dispatcher.dispatch(&friends(1)), 1);
        assert!(log.lock().unwrap().is_empty());
        let metrics = dispatcher.metrics();
        assert_eq!(metrics.listener_failures, 1);
        assert_eq!(metrics.events_dispatched, 1);
    }

    #[test]
    fn unrelated_callbacks_default_to_ok() {
        let log = Log::default();
        let set = Arc::new(ListenerSet::new());
        set.add(named("a", &log, Some("error")));
        let event = DecodedEvent {
            id: EventId(4),
            payload: EventPayload::Follow {
                source: Arc::new(User { id: 1, screen_name: String::new(), name: String::new() }),
                target: Arc::new(User { id: 2, screen_name: String::new(), name: String::new() }),
            },
        };
        assert_eq!(event.kind(), EventKind::Follow);
        assert_eq!(Dispatcher::new(set).dispatch(&event), 0);
        assert!(log.lock().unwrap().is_empty());
    }
}
