//! `WsConnector` — live records carried in WebSocket text frames.
//!
//! A frame may carry several newline-separated records; they are yielded in
//! order before the next frame is read. Binary frames are a framing error.
//!
//! # Usage
//! ```no_run
//! use userstream_engine::ws_source::WsConnector;
//!
//! let connector = WsConnector::new("wss://stream.example.com/1.1/user.json").unwrap();
//! ```

use crate::source::{Connector, RecordSource, SourceItem, SourceMode, DEFAULT_MAX_RECORD_BYTES};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use userstream_core::StreamError;

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    max_record_bytes: usize,
}

impl WsConnector {
    /// Accepts `ws://` and `wss://` URLs only.
    pub fn new(url: &str) -> Result<Self, StreamError> {
        let parsed = Url::parse(url).map_err(|e| StreamError::ConnectionFailed {
            endpoint: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(StreamError::ConnectionFailed {
                endpoint: url.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }
        Ok(Self {
            url: parsed,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        })
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn RecordSource>, StreamError> {
        info!("Connecting to WebSocket: {}", self.url);
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| StreamError::ConnectionFailed {
                endpoint: self.url.to_string(),
                reason: e.to_string(),
            })?;
        info!("WebSocket connected: {}", self.url);
        Ok(Box::new(WsSource {
            endpoint: self.url.to_string(),
            ws,
            pending: VecDeque::new(),
            max_record_bytes: self.max_record_bytes,
            finished: false,
        }))
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Live
    }

    fn endpoint(&self) -> String {
        self.url.to_string()
    }
}

pub struct WsSource {
    endpoint: String,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending: VecDeque<String>,
    max_record_bytes: usize,
    finished: bool,
}

#[async_trait]
impl RecordSource for WsSource {
    async fn next_record(&mut self) -> Result<SourceItem, StreamError> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(SourceItem::Record(line));
            }
            if self.finished {
                return Ok(SourceItem::EndOfStream);
            }

            match self.ws.next().await {
                None => {
                    info!("WebSocket stream ended: {}", self.endpoint);
                    self.finished = true;
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    return Err(StreamError::ConnectionFailed {
                        endpoint: self.endpoint.clone(),
                        reason: e.to_string(),
                    });
                }
                Some(Ok(Message::Text(text))) => {
                    debug!("WS message: {}", preview(&text, 120));
                    split_frame(&text, self.max_record_bytes, &mut self.pending)?;
                }
                Some(Ok(Message::Binary(_))) => {
                    return Err(StreamError::Framing {
                        reason: "unexpected binary frame".into(),
                    });
                }
                Some(Ok(Message::Close(_))) => {
                    info!("WebSocket closed by server");
                    self.finished = true;
                }
                // ping / pong / raw frames
                Some(Ok(_)) => {}
            }
        }
    }
}

/// Queue the non-blank lines of one text frame.
fn split_frame(
    text: &str,
    max_record_bytes: usize,
    pending: &mut VecDeque<String>,
) -> Result<(), StreamError> {
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.len() > max_record_bytes {
            return Err(StreamError::Framing {
                reason: format!("record exceeds {max_record_bytes} bytes"),
            });
        }
        pending.push_back(line.to_owned());
    }
    Ok(())
}

/// Longest prefix of `text` no longer than `max` bytes.
fn preview(text: &str, max: usize) -> &str {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_websocket_urls() {
        assert!(WsConnector::new("http://example.com/stream").is_err());
        assert!(WsConnector::new("not a url").is_err());
        let connector = WsConnector::new("ws://127.0.0.1:9/stream").unwrap();
        assert_eq!(connector.mode(), SourceMode::Live);
    }

    #[test]
    fn frame_with_several_records() {
        let mut pending = VecDeque::new();
        split_frame("{\"a\":1}\r\n\r\n{\"b\":2}\n", 64, &mut pending).unwrap();
        assert_eq!(pending, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
    }

    #[test]
    fn keep_alive_frame_yields_nothing() {
        let mut pending = VecDeque::new();
        split_frame("\r\n", 64, &mut pending).unwrap();
        assert!(pending.is_empty());
    }

    #[test]
    fn oversized_line_in_frame() {
        let mut pending = VecDeque::new();
        assert!(split_frame("{\"a\":12345}", 4, &mut pending).is_err());
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "h");
        assert_eq!(preview("héllo", 100), "héllo");
    }
}
