//! `StreamDriver` — connection lifecycle and the reader/dispatcher pipeline.
//!
//! ```text
//!   Idle ──start──► Connecting ──► Streaming ──► Reconnecting ──► Connecting …
//!                       │              │               │
//!                       └──────────────┴───────────────┴──stop / exhausted / replay end──► Stopped
//! ```
//!
//! The reader task owns the source, classifier, and decoder. Decoded events go
//! through a bounded queue to a dedicated dispatch thread, so a slow listener
//! blocks the reader before it pulls the next record.

use crate::backoff::BackoffPolicy;
use crate::config::StreamConfig;
use crate::dispatch::{Dispatcher, ListenerId, ListenerSet};
use crate::metrics::{Counter, Counters, StreamMetrics};
use crate::signal::StopSignal;
use crate::source::{Connector, RecordSource, SourceItem, SourceMode};
use crate::stream::{Processed, RecordProcessor};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use userstream_core::{DecodedEvent, EventDecoder, RawJsonRegistry, StreamError, StreamListener};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Connecting,
    Streaming,
    Reconnecting,
    /// Terminal.
    Stopped,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverState::Idle => "idle",
            DriverState::Connecting => "connecting",
            DriverState::Streaming => "streaming",
            DriverState::Reconnecting => "reconnecting",
            DriverState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Item on the reader → dispatcher queue.
#[derive(Debug)]
enum Delivery {
    Event(DecodedEvent),
    Fault(StreamError),
}

type Outcome = Arc<Mutex<Option<Result<(), StreamError>>>>;

/// Drives one stream session from `start` to `Stopped`.
///
/// # Usage
/// ```no_run
/// # async fn example() -> Result<(), userstream_core::StreamError> {
/// use std::sync::Arc;
/// use userstream_engine::{ReplayConnector, StreamConfig, StreamDriver};
/// # struct Printer;
/// # impl userstream_core::StreamListener for Printer {}
///
/// let driver = StreamDriver::new(StreamConfig::default());
/// driver.add_listener(Arc::new(Printer));
/// driver.start(ReplayConnector::file("capture.json"))?;
/// driver.wait().await?;
/// # Ok(())
/// # }
/// ```
pub struct StreamDriver {
    config: StreamConfig,
    listeners: Arc<ListenerSet>,
    registry: Arc<RawJsonRegistry>,
    counters: Arc<Counters>,
    state: Arc<watch::Sender<DriverState>>,
    stop: StopSignal,
    outcome: Outcome,
}

impl StreamDriver {
    /// A driver with its own session-scoped raw JSON registry.
    pub fn new(config: StreamConfig) -> Self {
        let (state, _) = watch::channel(DriverState::Idle);
        Self {
            config,
            listeners: Arc::new(ListenerSet::new()),
            registry: Arc::new(RawJsonRegistry::new()),
            counters: Arc::new(Counters::default()),
            state: Arc::new(state),
            stop: StopSignal::new(),
            outcome: Arc::new(Mutex::new(None)),
        }
    }

    /// Share `registry` with other drivers or callers, for example
    /// [`RawJsonRegistry::global`].
    pub fn with_registry(mut self, registry: Arc<RawJsonRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Takes effect from the next dispatched record.
    pub fn add_listener(&self, listener: Arc<dyn StreamListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listeners(&self) -> &Arc<ListenerSet> {
        &self.listeners
    }

    pub fn registry(&self) -> &Arc<RawJsonRegistry> {
        &self.registry
    }

    pub fn state(&self) -> DriverState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> StreamMetrics {
        self.counters.snapshot()
    }

    /// Open `connector` and begin streaming in the background.
    ///
    /// Must be called from within a Tokio runtime. Only valid from `Idle`.
    pub fn start<C: Connector>(&self, connector: C) -> Result<(), StreamError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == DriverState::Idle {
                *state = DriverState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(StreamError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let reader = Reader {
            endpoint: connector.endpoint(),
            mode: connector.mode(),
            connector: Arc::new(connector),
            processor: RecordProcessor::new(EventDecoder::new(Arc::clone(&self.registry))),
            policy: BackoffPolicy::new(self.config.retry.clone()),
            counters: Arc::clone(&self.counters),
            state: Arc::clone(&self.state),
            stop: self.stop.clone(),
            tx,
        };
        info!(endpoint = %reader.endpoint, mode = ?reader.mode, "starting stream driver");

        let dispatcher = Dispatcher::with_parts(
            Arc::clone(&self.listeners),
            Arc::clone(&self.counters),
            self.stop.clone(),
        );
        let stop = self.stop.clone();
        let reading = tokio::spawn(reader.run());
        let dispatching = tokio::task::spawn_blocking(move || dispatch_loop(dispatcher, rx, stop));

        let state = Arc::clone(&self.state);
        let outcome = Arc::clone(&self.outcome);
        tokio::spawn(async move {
            let result = match reading.await {
                Ok(result) => result,
                Err(e) => {
                    error!("reader task failed: {e}");
                    Err(StreamError::Closed)
                }
            };
            if let Err(e) = dispatching.await {
                error!("dispatch thread failed: {e}");
            }
            *outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
            state.send_replace(DriverState::Stopped);
            info!("stream driver stopped");
        });
        Ok(())
    }

    /// Stop streaming and wait until both contexts have finished. No listener
    /// callback runs after this returns.
    ///
    /// Returns the terminal error of the session, if any and if no earlier
    /// `stop` or `wait` call has already taken it.
    pub async fn stop(&self) -> Result<(), StreamError> {
        let was_idle = self.state.send_if_modified(|state| {
            if *state == DriverState::Idle {
                *state = DriverState::Stopped;
                true
            } else {
                false
            }
        });
        self.stop.trigger();
        if was_idle {
            return Ok(());
        }
        self.wait().await
    }

    /// Wait for the session to reach `Stopped` on its own. Returns at once
    /// for a driver that was never started.
    pub async fn wait(&self) -> Result<(), StreamError> {
        let mut rx = self.state.subscribe();
        if *rx.borrow() == DriverState::Idle {
            return Ok(());
        }
        // The sender lives in `self`, so this only returns once Stopped.
        let _ = rx.wait_for(|state| *state == DriverState::Stopped).await;
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or(Ok(()))
    }
}

impl Drop for StreamDriver {
    fn drop(&mut self) {
        self.stop.trigger();
    }
}

fn dispatch_loop(dispatcher: Dispatcher, mut rx: mpsc::Receiver<Delivery>, stop: StopSignal) {
    while let Some(delivery) = rx.blocking_recv() {
        if stop.is_stopped() {
            break;
        }
        match delivery {
            Delivery::Event(event) => {
                dispatcher.dispatch(&event);
            }
            Delivery::Fault(error) => dispatcher.report(&error),
        }
    }
    debug!("dispatch loop finished");
}

enum Pumped {
    Stopped,
    Ended,
    Failed(StreamError),
}

struct Reader {
    endpoint: String,
    mode: SourceMode,
    connector: Arc<dyn Connector>,
    processor: RecordProcessor,
    policy: BackoffPolicy,
    counters: Arc<Counters>,
    state: Arc<watch::Sender<DriverState>>,
    stop: StopSignal,
    tx: mpsc::Sender<Delivery>,
}

impl Reader {
    async fn run(self) -> Result<(), StreamError> {
        let mut attempt = 0u32;
        loop {
            self.set_state(DriverState::Connecting);
            let connected = tokio::select! {
                biased;
                _ = self.stop.stopped() => return Ok(()),
                connected = self.connector.connect() => connected,
            };

            let failure = match connected {
                Ok(mut source) => {
                    self.set_state(DriverState::Streaming);
                    info!(endpoint = %self.endpoint, "streaming");
                    match self.pump(source.as_mut(), &mut attempt).await {
                        Pumped::Stopped => return Ok(()),
                        Pumped::Ended if self.mode == SourceMode::Replay => {
                            info!(endpoint = %self.endpoint, "replay finished");
                            return Ok(());
                        }
                        Pumped::Ended => {
                            warn!(endpoint = %self.endpoint, "stream ended by remote");
                            StreamError::Closed
                        }
                        Pumped::Failed(e) => e,
                    }
                }
                Err(e) => e,
            };

            if self.mode == SourceMode::Replay {
                warn!(endpoint = %self.endpoint, "replay failed: {failure}");
                return Err(failure);
            }

            attempt += 1;
            let Some(delay) = self.policy.next_delay(attempt) else {
                let attempts = attempt - 1;
                let last = failure.to_string();
                error!(endpoint = %self.endpoint, attempts, "giving up: {last}");
                let reported = StreamError::RetriesExhausted {
                    attempts,
                    last: last.clone(),
                };
                self.deliver(Delivery::Fault(reported)).await;
                return Err(StreamError::RetriesExhausted { attempts, last });
            };

            self.set_state(DriverState::Reconnecting);
            self.counters.incr(Counter::Reconnections);
            warn!(
                endpoint = %self.endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting after: {failure}"
            );
            tokio::select! {
                biased;
                _ = self.stop.stopped() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Read until the source ends, fails, or the driver stops. The first
    /// record on a connection refills the retry budget.
    async fn pump(&self, source: &mut dyn RecordSource, attempt: &mut u32) -> Pumped {
        loop {
            let item = tokio::select! {
                biased;
                _ = self.stop.stopped() => return Pumped::Stopped,
                item = source.next_record() => item,
            };
            let line = match item {
                Ok(SourceItem::Record(line)) => line,
                Ok(SourceItem::EndOfStream) => return Pumped::Ended,
                Err(e) => return Pumped::Failed(e),
            };
            *attempt = 0;

            let delivery = match self.processor.process(&line, &self.counters) {
                Processed::Event(event) => Delivery::Event(event),
                Processed::Skipped => continue,
                Processed::Fault(error) => Delivery::Fault(error),
            };
            if !self.deliver(delivery).await {
                return Pumped::Stopped;
            }
        }
    }

    /// Queue `delivery`, waiting for room. `false` once stopped.
    async fn deliver(&self, delivery: Delivery) -> bool {
        tokio::select! {
            biased;
            _ = self.stop.stopped() => false,
            sent = self.tx.send(delivery) => sent.is_ok(),
        }
    }

    fn set_state(&self, next: DriverState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == DriverState::Stopped || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "driver state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ReplayConnector;
    use crate::testing::{collect, RecordingListener};
    use std::time::Duration;
    use userstream_core::EventKind;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn replay_runs_to_stopped() {
        let driver = StreamDriver::new(StreamConfig::default());
        let (listener, mut rx) = RecordingListener::new(Arc::clone(driver.registry()));
        driver.add_listener(Arc::new(listener));
        assert_eq!(driver.state(), DriverState::Idle);

        driver
            .start(ReplayConnector::bytes("{\"friends\":[7]}\n{\"limit\":{\"track\":3}}\n"))
            .unwrap();
        tokio::time::timeout(WAIT, driver.wait()).await.unwrap().unwrap();
        assert_eq!(driver.state(), DriverState::Stopped);

        let seen = collect(&mut rx, 2, Duration::from_millis(200)).await;
        let kinds: Vec<_> = seen.iter().filter_map(|r| r.kind()).collect();
        assert_eq!(kinds, vec![EventKind::FriendList, EventKind::TrackLimitationNotice]);
        assert_eq!(driver.metrics().events_dispatched, 2);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let driver = StreamDriver::new(StreamConfig::default());
        driver.start(ReplayConnector::bytes("")).unwrap();
        assert!(matches!(
            driver.start(ReplayConnector::bytes("")),
            Err(StreamError::AlreadyStarted)
        ));
        tokio::time::timeout(WAIT, driver.wait()).await.unwrap().unwrap();
        assert!(matches!(
            driver.start(ReplayConnector::bytes("")),
            Err(StreamError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn stop_from_idle() {
        let driver = StreamDriver::new(StreamConfig::default());
        driver.stop().await.unwrap();
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(driver.start(ReplayConnector::bytes("")).is_err());
    }

    #[tokio::test]
    async fn missing_capture_stops_with_error() {
        let driver = StreamDriver::new(StreamConfig::default());
        driver.start(ReplayConnector::file("/no/such/capture.json")).unwrap();
        let result = tokio::time::timeout(WAIT, driver.wait()).await.unwrap();
        assert!(matches!(result, Err(StreamError::ConnectionFailed { .. })));
        // The terminal error is handed out once.
        assert!(driver.wait().await.is_ok());
    }

    #[tokio::test]
    async fn state_changes_are_observable() {
        let driver = StreamDriver::new(StreamConfig::default());
        let mut states = driver.watch_state();
        driver.start(ReplayConnector::bytes("{}\n")).unwrap();
        tokio::time::timeout(WAIT, states.wait_for(|s| *s == DriverState::Stopped))
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn state_display() {
        assert_eq!(DriverState::Reconnecting.to_string(), "reconnecting");
    }
}
