//! Per-session counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics snapshot for a stream session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamMetrics {
    pub records_read: u64,
    pub events_dispatched: u64,
    pub records_skipped: u64,
    pub decode_errors: u64,
    pub listener_failures: u64,
    pub reconnections: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    records_read: AtomicU64,
    events_dispatched: AtomicU64,
    records_skipped: AtomicU64,
    decode_errors: AtomicU64,
    listener_failures: AtomicU64,
    reconnections: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Counter {
    RecordsRead,
    EventsDispatched,
    RecordsSkipped,
    DecodeErrors,
    ListenerFailures,
    Reconnections,
}

impl Counters {
    pub(crate) fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub(crate) fn add(&self, counter: Counter, n: u64) {
        let slot = match counter {
            Counter::RecordsRead => &self.records_read,
            Counter::EventsDispatched => &self.events_dispatched,
            Counter::RecordsSkipped => &self.records_skipped,
            Counter::DecodeErrors => &self.decode_errors,
            Counter::ListenerFailures => &self.listener_failures,
            Counter::Reconnections => &self.reconnections,
        };
        slot.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StreamMetrics {
        StreamMetrics {
            records_read: self.records_read.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            reconnections: self.reconnections.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let counters = Counters::default();
        counters.incr(Counter::RecordsRead);
        counters.incr(Counter::RecordsRead);
        counters.add(Counter::ListenerFailures, 3);
        let snap = counters.snapshot();
        assert_eq!(snap.records_read, 2);
        assert_eq!(snap.listener_failures, 3);
        assert_eq!(snap.reconnections, 0);
    }
}
