//! # userstream-core
//!
//! Core types for UserStream: the entity model, structural event
//! classification, decoding with raw JSON retention, and the listener
//! callback surface. The streaming engine is built on the pieces here.
//!
//! ## Pipeline
//! ```text
//! line ──► Record::parse ──► EventClassifier ──► EventDecoder ──► DecodedEvent::deliver
//!                                                     │
//!                                                     ▼
//!                                              RawJsonRegistry
//! ```

pub mod classifier;
pub mod decoder;
pub mod entity;
pub mod error;
pub mod event;
pub mod kind;
pub mod listener;
pub mod registry;

pub use classifier::{Classified, EventClassifier, Record};
pub use decoder::EventDecoder;
pub use entity::{DirectMessage, EntityKey, RawKeyed, Status, StatusDeletionNotice, User, UserList};
pub use error::{DecodeError, StreamError};
pub use event::{DecodedEvent, EventId, EventPayload};
pub use kind::EventKind;
pub use listener::{ListenerError, ListenerResult, StreamListener};
pub use registry::RawJsonRegistry;
