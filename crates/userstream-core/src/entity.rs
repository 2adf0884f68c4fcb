//! Domain entities carried by stream events.
//!
//! Only the identity and a handful of descriptive fields are modelled; the
//! full upstream payload stays available through the
//! [`RawJsonRegistry`](crate::registry::RawJsonRegistry).

use crate::event::EventId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Key under which the raw JSON of a decoded object is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKey {
    User(u64),
    Status(u64),
    DirectMessage(u64),
    UserList(u64),
    /// A status deletion notice, keyed by the deleted status id.
    StatusDeletion(u64),
    /// A whole record, for events that produce no entity of their own.
    Record(EventId),
}

/// Anything whose original JSON can be looked up in the registry.
pub trait RawKeyed {
    fn raw_key(&self) -> EntityKey;
}

impl<T: RawKeyed + ?Sized> RawKeyed for Arc<T> {
    fn raw_key(&self) -> EntityKey {
        (**self).raw_key()
    }
}

impl<T: RawKeyed + ?Sized> RawKeyed for &T {
    fn raw_key(&self) -> EntityKey {
        (**self).raw_key()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
}

impl RawKeyed for User {
    fn raw_key(&self) -> EntityKey {
        EntityKey::User(self.id)
    }
}

/// A status update. The author and any retweeted original are decoded and
/// registered separately from the status itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Arc<User>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweeted_status: Option<Arc<Status>>,
}

impl Status {
    /// Id of the author, if the payload carried one.
    pub fn user_id(&self) -> Option<u64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_retweet(&self) -> bool {
        self.retweeted_status.is_some()
    }
}

impl RawKeyed for Status {
    fn raw_key(&self) -> EntityKey {
        EntityKey::Status(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub id: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sender_id: u64,
    #[serde(default)]
    pub recipient_id: u64,
    #[serde(default)]
    pub sender_screen_name: String,
    #[serde(default)]
    pub recipient_screen_name: String,
}

impl RawKeyed for DirectMessage {
    fn raw_key(&self) -> EntityKey {
        EntityKey::DirectMessage(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default)]
    pub subscriber_count: u64,
}

impl RawKeyed for UserList {
    fn raw_key(&self) -> EntityKey {
        EntityKey::UserList(self.id)
    }
}

/// Notice that a status was deleted by its author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDeletionNotice {
    pub status_id: u64,
    pub user_id: u64,
}

impl RawKeyed for StatusDeletionNotice {
    fn raw_key(&self) -> EntityKey {
        EntityKey::StatusDeletion(self.status_id)
    }
}
