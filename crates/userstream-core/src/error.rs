//! Error types for the UserStream ingest pipeline.

use crate::kind::EventKind;
use thiserror::Error;

/// Errors raised while decoding a record whose kind was recognized.
///
/// Unrecognized records never produce an error; they classify as
/// [`EventKind::Unknown`] and are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{kind} record is missing required field `{field}`")]
    MissingField { kind: EventKind, field: String },

    #[error("{kind} record has invalid field `{field}`: {reason}")]
    InvalidField {
        kind: EventKind,
        field: String,
        reason: String,
    },
}

impl DecodeError {
    pub fn missing(kind: EventKind, field: impl Into<String>) -> Self {
        Self::MissingField {
            kind,
            field: field.into(),
        }
    }

    pub fn invalid(kind: EventKind, field: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidField {
            kind,
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// The kind of record that failed to decode.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MissingField { kind, .. } | Self::InvalidField { kind, .. } => *kind,
        }
    }
}

/// Errors from the streaming engine and its sources.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed transport framing: {reason}")]
    Framing { reason: String },

    #[error("record is not valid JSON: {reason}")]
    InvalidJson { reason: String },

    #[error("decode error in stream: {0}")]
    Decode(#[from] DecodeError),

    #[error("listener failed while handling {kind}: {message}")]
    Listener { kind: EventKind, message: String },

    #[error("gave up after {attempts} reconnect attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("stream driver already started")]
    AlreadyStarted,

    #[error("stream closed unexpectedly")]
    Closed,
}

impl StreamError {
    /// Returns `true` for failures of the underlying connection, the ones
    /// that send a live driver into reconnect.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Io(_) | Self::Framing { .. } | Self::Closed
        )
    }
}
