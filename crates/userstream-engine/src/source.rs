//! `RecordSource` — abstraction over "the next raw record".
//!
//! A source yields one newline-delimited record per call, whether it reads a
//! stored capture or a live connection. Blank keep-alive lines are consumed
//! inside the source and never reach the caller. A `Connector` opens a fresh
//! source; the driver calls it again to reconnect.

use async_trait::async_trait;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};
use userstream_core::StreamError;

/// Default upper bound for a single record, excluding its line terminator.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    Record(String),
    /// The source is exhausted. Sticky: every later call returns it again.
    EndOfStream,
}

#[async_trait]
pub trait RecordSource: Send {
    /// Wait for the next non-blank record.
    async fn next_record(&mut self) -> Result<SourceItem, StreamError>;
}

#[async_trait]
impl RecordSource for Box<dyn RecordSource> {
    async fn next_record(&mut self) -> Result<SourceItem, StreamError> {
        (**self).next_record().await
    }
}

/// Whether a source is a finite capture or a connection worth re-opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Replay,
    Live,
}

/// Opens record sources for the driver.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn RecordSource>, StreamError>;

    fn mode(&self) -> SourceMode;

    /// Human-readable endpoint for logs and errors.
    fn endpoint(&self) -> String;
}

// ─── Line framing ─────────────────────────────────────────────────────────────

/// Newline-framed records over any buffered async reader.
pub struct LineSource<R> {
    reader: R,
    max_record_bytes: usize,
    buf: Vec<u8>,
    finished: bool,
}

impl<R> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            buf: Vec::new(),
            finished: false,
        }
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max.max(1);
        self
    }
}

impl LineSource<Cursor<Vec<u8>>> {
    /// A replay source over an in-memory capture.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Cursor::new(bytes.into()))
    }
}

impl LineSource<BufReader<File>> {
    /// A replay source over a capture file.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let path = path.into();
        let file = File::open(&path).await.map_err(|e| StreamError::ConnectionFailed {
            endpoint: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R> RecordSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_record(&mut self) -> Result<SourceItem, StreamError> {
        if self.finished {
            return Ok(SourceItem::EndOfStream);
        }
        // One extra byte leaves room for the terminator of a maximal record.
        let limit = self.max_record_bytes as u64 + 2;
        loop {
            self.buf.clear();
            let n = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 {
                self.finished = true;
                return Ok(SourceItem::EndOfStream);
            }

            let terminated = self.buf.last() == Some(&b'\n');
            if terminated {
                self.buf.pop();
            }
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
            if self.buf.len() > self.max_record_bytes {
                if !terminated {
                    self.discard_rest_of_line(limit).await?;
                }
                return Err(StreamError::Framing {
                    reason: format!("record exceeds {} bytes", self.max_record_bytes),
                });
            }

            let line = std::str::from_utf8(&self.buf).map_err(|e| StreamError::Framing {
                reason: format!("record is not valid UTF-8: {e}"),
            })?;
            if line.trim().is_empty() {
                debug!("keep-alive");
                continue;
            }
            return Ok(SourceItem::Record(line.to_owned()));
        }
    }
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Skip to just past the next `\n`, so the tail of an oversized record
    /// is not read back as a record of its own.
    async fn discard_rest_of_line(&mut self, chunk: u64) -> Result<(), StreamError> {
        loop {
            self.buf.clear();
            let n = (&mut self.reader)
                .take(chunk)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 {
                self.finished = true;
                return Ok(());
            }
            if self.buf.last() == Some(&b'\n') {
                return Ok(());
            }
        }
    }
}

// ─── Connectors ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Capture {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Replays a stored capture. Reaching its end stops the driver.
#[derive(Debug, Clone)]
pub struct ReplayConnector {
    capture: Capture,
    max_record_bytes: usize,
}

impl ReplayConnector {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            capture: Capture::File(path.into()),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            capture: Capture::Bytes(bytes.into()),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }
}

#[async_trait]
impl Connector for ReplayConnector {
    async fn connect(&self) -> Result<Box<dyn RecordSource>, StreamError> {
        match &self.capture {
            Capture::File(path) => {
                let source = LineSource::open(path.clone()).await?;
                info!(path = %path.display(), "replaying capture");
                Ok(Box::new(source.with_max_record_bytes(self.max_record_bytes)))
            }
            Capture::Bytes(bytes) => Ok(Box::new(
                LineSource::from_bytes(bytes.clone()).with_max_record_bytes(self.max_record_bytes),
            )),
        }
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Replay
    }

    fn endpoint(&self) -> String {
        match &self.capture {
            Capture::File(path) => path.display().to_string(),
            Capture::Bytes(bytes) => format!("<memory: {} bytes>", bytes.len()),
        }
    }
}

/// Live newline-delimited stream over a plain TCP connection.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
    max_record_bytes: usize,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(10),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn RecordSource>, StreamError> {
        let connect = TcpStream::connect(&self.addr);
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(StreamError::ConnectionFailed {
                    endpoint: self.addr.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(StreamError::ConnectionFailed {
                    endpoint: self.addr.clone(),
                    reason: format!("timed out after {}ms", self.connect_timeout.as_millis()),
                })
            }
        };
        info!(addr = %self.addr, "TCP stream connected");
        Ok(Box::new(
            LineSource::new(BufReader::new(stream)).with_max_record_bytes(self.max_record_bytes),
        ))
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Live
    }

    fn endpoint(&self) -> String {
        self.addr.clone()
    }
}
