//! `EventStream` — pull one record at a time and dispatch it in place.
//!
//! The driver runs the same per-record pipeline on its reader task; this type
//! exposes it synchronously for tests, tooling, and callers that want to own
//! the read loop themselves.

use crate::dispatch::Dispatcher;
use crate::metrics::{Counter, Counters};
use crate::source::{RecordSource, SourceItem};
use tracing::{trace, warn};
use userstream_core::{DecodedEvent, EventClassifier, EventDecoder, EventKind, StreamError};

/// Outcome of running one raw record through classify and decode.
#[derive(Debug)]
pub(crate) enum Processed {
    Event(DecodedEvent),
    /// Unrecognized; dropped without a callback.
    Skipped,
    /// Not JSON, or a recognized record missing what its kind requires.
    Fault(StreamError),
}

pub(crate) struct RecordProcessor {
    classifier: EventClassifier,
    decoder: EventDecoder,
}

impl RecordProcessor {
    pub(crate) fn new(decoder: EventDecoder) -> Self {
        Self {
            classifier: EventClassifier::new(),
            decoder,
        }
    }

    pub(crate) fn process(&self, line: &str, counters: &Counters) -> Processed {
        counters.incr(Counter::RecordsRead);

        let classified = match self.classifier.classify_line(line) {
            Ok(classified) => classified,
            Err(e) => {
                warn!("record is not valid JSON: {e}");
                counters.incr(Counter::DecodeErrors);
                return Processed::Fault(StreamError::InvalidJson {
                    reason: e.to_string(),
                });
            }
        };

        match self.decoder.decode(&classified) {
            Ok(Some(event)) => Processed::Event(event),
            Ok(None) => {
                trace!("skipping unrecognized record");
                counters.incr(Counter::RecordsSkipped);
                Processed::Skipped
            }
            Err(e) => {
                warn!(kind = %e.kind(), "malformed record: {e}");
                counters.incr(Counter::DecodeErrors);
                Processed::Fault(StreamError::Decode(e))
            }
        }
    }
}

/// What a single [`EventStream::next`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Delivered to every listener (failures included, they go to `on_exception`).
    Dispatched(EventKind),
    Skipped,
    /// Reported through `on_exception`; the stream can continue.
    Malformed,
    EndOfStream,
}

pub struct EventStream<S> {
    source: S,
    processor: RecordProcessor,
}

impl<S: RecordSource> EventStream<S> {
    pub fn new(source: S, decoder: EventDecoder) -> Self {
        Self {
            source,
            processor: RecordProcessor::new(decoder),
        }
    }

    /// Read the next non-blank record and dispatch it through `dispatcher`.
    ///
    /// Transport errors are returned as `Err`; everything about the record
    /// itself is reported to listeners and summarized in the `Progress`.
    pub async fn next(&mut self, dispatcher: &Dispatcher) -> Result<Progress, StreamError> {
        let line = match self.source.next_record().await? {
            SourceItem::Record(line) => line,
            SourceItem::EndOfStream => return Ok(Progress::EndOfStream),
        };
        Ok(match self.processor.process(&line, dispatcher.counters()) {
            Processed::Event(event) => {
                dispatcher.dispatch(&event);
                Progress::Dispatched(event.kind())
            }
            Processed::Skipped => Progress::Skipped,
            Processed::Fault(error) => {
                dispatcher.report(&error);
                Progress::Malformed
            }
        })
    }

    /// Run until the source ends, returning how many events were dispatched.
    pub async fn run_to_end(&mut self, dispatcher: &Dispatcher) -> Result<u64, StreamError> {
        let mut dispatched = 0;
        loop {
            match self.next(dispatcher).await? {
                Progress::Dispatched(_) => dispatched += 1,
                Progress::EndOfStream => return Ok(dispatched),
                Progress::Skipped | Progress::Malformed => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ListenerSet;
    use crate::source::LineSource;
    use crate::testing::{Received, RecordingListener};
    use std::sync::Arc;
    use userstream_core::RawJsonRegistry;

    const MIXED: &str = concat!(
        "{\"friends\":[1,2,3]}\n",
        "{\"keep\":\"alive?\"}\n",
        "not json at all\n",
        "{\"limit\":{}}\n",
        "\n",
        "{\"delete\":{\"status\":{\"id\":5,\"user_id\":6}}}\n",
    );

    fn setup() -> (
        EventStream<LineSource<std::io::Cursor<Vec<u8>>>>,
        Dispatcher,
        tokio::sync::mpsc::UnboundedReceiver<Received>,
    ) {
        let registry = Arc::new(RawJsonRegistry::new());
        let (listener, rx) = RecordingListener::new(Arc::clone(&registry));
        let set = Arc::new(ListenerSet::new());
        set.add(Arc::new(listener));
        let stream = EventStream::new(LineSource::from_bytes(MIXED), EventDecoder::new(registry));
        (stream, Dispatcher::new(set), rx)
    }

    #[tokio::test]
    async fn steps_through_each_record() {
        let (mut stream, dispatcher, _rx) = setup();
        assert_eq!(
            stream.next(&dispatcher).await.unwrap(),
            Progress::Dispatched(EventKind::FriendList)
        );
        assert_eq!(stream.next(&dispatcher).await.unwrap(), Progress::Skipped);
        assert_eq!(stream.next(&dispatcher).await.unwrap(), Progress::Malformed);
        assert_eq!(stream.next(&dispatcher).await.unwrap(), Progress::Malformed);
        assert_eq!(
            stream.next(&dispatcher).await.unwrap(),
            Progress::Dispatched(EventKind::DeletionNoticeStatus)
        );
        assert_eq!(stream.next(&dispatcher).await.unwrap(), Progress::EndOfStream);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.records_read, 5);
        assert_eq!(metrics.events_dispatched, 2);
        assert_eq!(metrics.records_skipped, 1);
        assert_eq!(metrics.decode_errors, 2);
    }

    #[tokio::test]
    async fn faults_reach_on_exception_in_order() {
        let (mut stream, dispatcher, mut rx) = setup();
        assert_eq!(stream.run_to_end(&dispatcher).await.unwrap(), 2);

        let mut seen = Vec::new();
        while let Ok(item) = rx.try_recv() {
            seen.push(item);
        }
        assert_eq!(seen.len(), 4);
        assert!(matches!(&seen[0], Received::Event { kind: EventKind::FriendList, .. }));
        assert!(matches!(&seen[1], Received::Exception(m) if m.contains("not valid JSON")));
        assert!(matches!(&seen[2], Received::Exception(m) if m.contains("limit.track")));
        assert!(matches!(
            &seen[3],
            Received::Event { kind: EventKind::DeletionNoticeStatus, ids, .. } if ids == &vec![5, 6]
        ));
    }

    #[tokio::test]
    async fn transport_errors_are_returned() {
        let registry = Arc::new(RawJsonRegistry::new());
        let source = LineSource::from_bytes("0123456789\n").with_max_record_bytes(4);
        let mut stream = EventStream::new(source, EventDecoder::new(registry));
        let dispatcher = Dispatcher::new(Arc::new(ListenerSet::new()));
        assert!(matches!(
            stream.next(&dispatcher).await,
            Err(StreamError::Framing { .. })
        ));
    }
}
