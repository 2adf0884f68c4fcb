//! # userstream-engine
//!
//! Real-time streaming engine for UserStream.
//!
//! Connects to a newline-delimited JSON event feed (or replays a stored
//! capture), classifies and decodes each record, and dispatches the decoded
//! events to registered listeners in record order.
//!
//! ## Architecture
//! ```text
//! Connector ──► RecordSource (reader task)
//!                     │
//!                     ▼
//!        EventClassifier → EventDecoder ──► RawJsonRegistry
//!                     │
//!                     ▼
//!          bounded mpsc queue (backpressure)
//!                     │
//!                     ▼
//!   Dispatcher (dispatch thread) ──► StreamListener × N, in registration order
//! ```

pub mod backoff;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod metrics;
pub mod signal;
pub mod source;
pub mod stream;
pub mod testing;
pub mod ws_source;

pub use backoff::BackoffPolicy;
pub use config::{ConfigError, RetryConfig, StreamConfig};
pub use dispatch::{Dispatcher, ListenerId, ListenerSet};
pub use driver::{DriverState, StreamDriver};
pub use metrics::StreamMetrics;
pub use signal::StopSignal;
pub use source::{
    Connector, LineSource, RecordSource, ReplayConnector, SourceItem, SourceMode, TcpConnector,
};
pub use stream::{EventStream, Progress};
pub use ws_source::WsConnector;
