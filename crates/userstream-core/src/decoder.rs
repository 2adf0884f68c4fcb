//! `EventDecoder` — turns a classified record into a [`DecodedEvent`].
//!
//! Every entity goes through a sub-decoder that registers the entity's exact
//! source slice in the [`RawJsonRegistry`] before the entity is returned, and
//! the whole record is registered under the event's own id. A record whose
//! kind was recognized but whose required fields are missing or malformed is
//! a [`DecodeError`], never a silent `Unknown`.

use crate::classifier::Classified;
use crate::entity::{EntityKey, RawKeyed, Status, StatusDeletionNotice, User, UserList};
use crate::error::DecodeError;
use crate::event::{DecodedEvent, EventPayload};
use crate::kind::EventKind;
use crate::registry::RawJsonRegistry;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::sync::Arc;
use tracing::trace;

#[derive(Deserialize)]
struct StatusWire<'a> {
    id: Option<u64>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(borrow, default)]
    user: Option<&'a RawValue>,
    #[serde(borrow, default)]
    retweeted_status: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct DeletionWire {
    id: Option<u64>,
    user_id: Option<u64>,
}

#[derive(Deserialize)]
struct LimitWire {
    track: Option<u64>,
}

pub struct EventDecoder {
    registry: Arc<RawJsonRegistry>,
}

impl EventDecoder {
    pub fn new(registry: Arc<RawJsonRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RawJsonRegistry> {
        &self.registry
    }

    /// Decode a classified record. `Unknown` records decode to `None`.
    pub fn decode(&self, classified: &Classified<'_>) -> Result<Option<DecodedEvent>, DecodeError> {
        let kind = classified.kind;
        let subtree = classified.subtree;
        let record = &classified.record;

        let payload = match kind {
            EventKind::Unknown => {
                trace!("unrecognized record dropped");
                return Ok(None);
            }
            EventKind::Status => {
                EventPayload::Status(self.status(kind, "status", subtree, true)?)
            }
            EventKind::DeletionNoticeStatus => {
                let (status_id, user_id) = deletion_ids(kind, subtree)?;
                let notice = StatusDeletionNotice { status_id, user_id };
                self.registry.put(notice.raw_key(), subtree.get());
                EventPayload::DeletionNoticeStatus(notice)
            }
            EventKind::DeletionNoticeDirectMessage => {
                let (message_id, user_id) = deletion_ids(kind, subtree)?;
                EventPayload::DeletionNoticeDirectMessage { message_id, user_id }
            }
            EventKind::TrackLimitationNotice => {
                let limit: LimitWire = parse(kind, "limit", subtree)?;
                let limited = limit
                    .track
                    .ok_or_else(|| DecodeError::missing(kind, "limit.track"))?;
                EventPayload::TrackLimitationNotice { limited }
            }
            EventKind::FriendList => EventPayload::FriendList {
                friend_ids: parse(kind, "friends", subtree)?,
            },
            EventKind::DirectMessage => {
                EventPayload::DirectMessage(self.entity(kind, "direct_message", subtree)?)
            }
            EventKind::Favorite | EventKind::Unfavorite | EventKind::Retweet => {
                let source = self.user(kind, "source", required(kind, record.field("source"), "source")?)?;
                let target = self.user(kind, "target", required(kind, record.field("target"), "target")?)?;
                let status = self.status(
                    kind,
                    "target_object",
                    required(kind, record.field("target_object"), "target_object")?,
                    false,
                )?;
                match kind {
                    EventKind::Favorite => EventPayload::Favorite { source, target, status },
                    EventKind::Unfavorite => EventPayload::Unfavorite { source, target, status },
                    _ => EventPayload::Retweet { source, target, status },
                }
            }
            EventKind::Follow | EventKind::Unfollow | EventKind::Block | EventKind::Unblock => {
                let source = self.user(kind, "source", required(kind, record.field("source"), "source")?)?;
                let target = self.user(kind, "target", required(kind, record.field("target"), "target")?)?;
                match kind {
                    EventKind::Follow => EventPayload::Follow { source, target },
                    EventKind::Unfollow => EventPayload::Unfollow { source, target },
                    EventKind::Block => EventPayload::Block { source, target },
                    _ => EventPayload::Unblock { source, target },
                }
            }
            EventKind::ListSubscribed => {
                let subscriber = self.user(kind, "source", required(kind, record.field("source"), "source")?)?;
                let owner = self.user(kind, "target", required(kind, record.field("target"), "target")?)?;
                let list = self.entity(
                    kind,
                    "target_object",
                    required(kind, record.field("target_object"), "target_object")?,
                )?;
                EventPayload::ListSubscribed { subscriber, owner, list }
            }
            EventKind::ListCreated | EventKind::ListUpdated | EventKind::ListDestroyed => {
                let owner = self.user(kind, "source", required(kind, record.field("source"), "source")?)?;
                let list: Arc<UserList> = self.entity(
                    kind,
                    "target_object",
                    required(kind, record.field("target_object"), "target_object")?,
                )?;
                match kind {
                    EventKind::ListCreated => EventPayload::ListCreated { owner, list },
                    EventKind::ListUpdated => EventPayload::ListUpdated { owner, list },
                    _ => EventPayload::ListDestroyed { owner, list },
                }
            }
        };

        let id = self.registry.next_event_id();
        self.registry.put(EntityKey::Record(id), record.text());
        Ok(Some(DecodedEvent { id, payload }))
    }

    /// Decode a flat entity and register its raw slice.
    fn entity<T>(&self, kind: EventKind, field: &str, raw: &RawValue) -> Result<Arc<T>, DecodeError>
    where
        T: DeserializeOwned + RawKeyed,
    {
        let entity: T = parse(kind, field, raw)?;
        self.registry.put(entity.raw_key(), raw.get());
        Ok(Arc::new(entity))
    }

    fn user(&self, kind: EventKind, field: &str, raw: &RawValue) -> Result<Arc<User>, DecodeError> {
        self.entity(kind, field, raw)
    }

    /// Decode a status together with its author and any retweeted original,
    /// registering each one.
    fn status(
        &self,
        kind: EventKind,
        field: &str,
        raw: &RawValue,
        require_user: bool,
    ) -> Result<Arc<Status>, DecodeError> {
        let wire: StatusWire<'_> = serde_json::from_str(raw.get())
            .map_err(|e| DecodeError::invalid(kind, field, e))?;
        let id = wire
            .id
            .ok_or_else(|| DecodeError::missing(kind, format!("{field}.id")))?;

        let user = match wire.user {
            Some(user) => Some(self.user(kind, &format!("{field}.user"), user)?),
            None if require_user => return Err(DecodeError::missing(kind, format!("{field}.user"))),
            None => None,
        };
        let retweeted_status = match wire.retweeted_status {
            Some(original) => {
                Some(self.status(kind, &format!("{field}.retweeted_status"), original, false)?)
            }
            None => None,
        };

        let status = Status {
            id,
            text: wire.text,
            created_at: wire.created_at,
            user,
            retweeted_status,
        };
        self.registry.put(status.raw_key(), raw.get());
        Ok(Arc::new(status))
    }
}

fn required<'a>(
    kind: EventKind,
    value: Option<&'a RawValue>,
    field: &str,
) -> Result<&'a RawValue, DecodeError> {
    match value {
        Some(raw) if raw.get() != "null" => Ok(raw),
        _ => Err(DecodeError::missing(kind, field)),
    }
}

fn parse<T: DeserializeOwned>(kind: EventKind, field: &str, raw: &RawValue) -> Result<T, DecodeError> {
    serde_json::from_str(raw.get()).map_err(|e| DecodeError::invalid(kind, field, e))
}

fn deletion_ids(kind: EventKind, raw: &RawValue) -> Result<(u64, u64), DecodeError> {
    let wire: DeletionWire = parse(kind, "delete", raw)?;
    let id = wire.id.ok_or_else(|| DecodeError::missing(kind, "delete.id"))?;
    let user_id = wire
        .user_id
        .ok_or_else(|| DecodeError::missing(kind, "delete.user_id"))?;
    Ok((id, user_id))
}
