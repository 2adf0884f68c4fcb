//! Decoded events and the single kind → callback dispatch table.

use crate::entity::{DirectMessage, EntityKey, RawKeyed, Status, StatusDeletionNotice, User, UserList};
use crate::kind::EventKind;
use crate::listener::{ListenerResult, StreamListener};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Sequence number assigned to every decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-kind payload of a decoded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Status(Arc<Status>),
    DeletionNoticeStatus(StatusDeletionNotice),
    DeletionNoticeDirectMessage { message_id: u64, user_id: u64 },
    TrackLimitationNotice { limited: u64 },
    FriendList { friend_ids: Vec<u64> },
    Favorite { source: Arc<User>, target: Arc<User>, status: Arc<Status> },
    Unfavorite { source: Arc<User>, target: Arc<User>, status: Arc<Status> },
    Follow { source: Arc<User>, target: Arc<User> },
    Unfollow { source: Arc<User>, target: Arc<User> },
    Retweet { source: Arc<User>, target: Arc<User>, status: Arc<Status> },
    DirectMessage(Arc<DirectMessage>),
    ListSubscribed { subscriber: Arc<User>, owner: Arc<User>, list: Arc<UserList> },
    ListCreated { owner: Arc<User>, list: Arc<UserList> },
    ListUpdated { owner: Arc<User>, list: Arc<UserList> },
    ListDestroyed { owner: Arc<User>, list: Arc<UserList> },
    Block { source: Arc<User>, target: Arc<User> },
    Unblock { source: Arc<User>, target: Arc<User> },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Status(_) => EventKind::Status,
            EventPayload::DeletionNoticeStatus(_) => EventKind::DeletionNoticeStatus,
            EventPayload::DeletionNoticeDirectMessage { .. } => EventKind::DeletionNoticeDirectMessage,
            EventPayload::TrackLimitationNotice { .. } => EventKind::TrackLimitationNotice,
            EventPayload::FriendList { .. } => EventKind::FriendList,
            EventPayload::Favorite { .. } => EventKind::Favorite,
            EventPayload::Unfavorite { .. } => EventKind::Unfavorite,
            EventPayload::Follow { .. } => EventKind::Follow,
            EventPayload::Unfollow { .. } => EventKind::Unfollow,
            EventPayload::Retweet { .. } => EventKind::Retweet,
            EventPayload::DirectMessage(_) => EventKind::DirectMessage,
            EventPayload::ListSubscribed { .. } => EventKind::ListSubscribed,
            EventPayload::ListCreated { .. } => EventKind::ListCreated,
            EventPayload::ListUpdated { .. } => EventKind::ListUpdated,
            EventPayload::ListDestroyed { .. } => EventKind::ListDestroyed,
            EventPayload::Block { .. } => EventKind::Block,
            EventPayload::Unblock { .. } => EventKind::Unblock,
        }
    }
}

/// A fully decoded record, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub id: EventId,
    pub payload: EventPayload,
}

impl DecodedEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Registry keys of every entity this event hands to a listener.
    pub fn entity_keys(&self) -> Vec<EntityKey> {
        match &self.payload {
            EventPayload::Status(status) => vec![status.raw_key()],
            EventPayload::DeletionNoticeStatus(notice) => vec![notice.raw_key()],
            EventPayload::DeletionNoticeDirectMessage { .. }
            | EventPayload::TrackLimitationNotice { .. }
            | EventPayload::FriendList { .. } => vec![],
            EventPayload::Favorite { source, target, status }
            | EventPayload::Unfavorite { source, target, status }
            | EventPayload::Retweet { source, target, status } => {
                vec![source.raw_key(), target.raw_key(), status.raw_key()]
            }
            EventPayload::Follow { source, target }
            | EventPayload::Unfollow { source, target }
            | EventPayload::Block { source, target }
            | EventPayload::Unblock { source, target } => vec![source.raw_key(), target.raw_key()],
            EventPayload::DirectMessage(message) => vec![message.raw_key()],
            EventPayload::ListSubscribed { subscriber, owner, list } => {
                vec![subscriber.raw_key(), owner.raw_key(), list.raw_key()]
            }
            EventPayload::ListCreated { owner, list }
            | EventPayload::ListUpdated { owner, list }
            | EventPayload::ListDestroyed { owner, list } => vec![owner.raw_key(), list.raw_key()],
        }
    }

    /// Invoke the one callback on `listener` that matches this event's kind.
    pub fn deliver(&self, listener: &dyn StreamListener) -> ListenerResult {
        match &self.payload {
            EventPayload::Status(status) => listener.on_status(status),
            EventPayload::DeletionNoticeStatus(notice) => listener.on_deletion_notice(notice),
            EventPayload::DeletionNoticeDirectMessage { message_id, user_id } => {
                listener.on_direct_message_deletion(*message_id, *user_id)
            }
            EventPayload::TrackLimitationNotice { limited } => {
                listener.on_track_limitation_notice(*limited)
            }
            EventPayload::FriendList { friend_ids } => listener.on_friend_list(friend_ids),
            EventPayload::Favorite { source, target, status } => {
                listener.on_favorite(source, target, status)
            }
            EventPayload::Unfavorite { source, target, status } => {
                listener.on_unfavorite(source, target, status)
            }
            EventPayload::Follow { source, target } => listener.on_follow(source, target),
            EventPayload::Unfollow { source, target } => listener.on_unfollow(source, target),
            EventPayload::Retweet { source, target, status } => {
                listener.on_retweet(source, target, status)
            }
            EventPayload::DirectMessage(message) => listener.on_direct_message(message),
            EventPayload::ListSubscribed { subscriber, owner, list } => {
                listener.on_user_list_subscribed(subscriber, owner, list)
            }
            EventPayload::ListCreated { owner, list } => listener.on_user_list_created(owner, list),
            EventPayload::ListUpdated { owner, list } => listener.on_user_list_updated(owner, list),
            EventPayload::ListDestroyed { owner, list } => {
                listener.on_user_list_destroyed(owner, list)
            }
            EventPayload::Block { source, target } => listener.on_block(source, target),
            EventPayload::Unblock { source, target } => listener.on_unblock(source, target),
        }
    }
}

impl RawKeyed for DecodedEvent {
    fn raw_key(&self) -> EntityKey {
        EntityKey::Record(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls(Mutex<Vec<&'static str>>);

    impl StreamListener for Calls {
        fn on_unfollow(&self, _source: &Arc<User>, _target: &Arc<User>) -> ListenerResult {
            self.0.lock().unwrap().push("unfollow");
            Ok(())
        }

        fn on_track_limitation_notice(&self, limited: u64) -> ListenerResult {
            assert_eq!(limited, 42);
            self.0.lock().unwrap().push("limit");
            Ok(())
        }
    }

    fn user(id: u64) -> Arc<User> {
        Arc::new(User {
            id,
            screen_name: String::new(),
            name: String::new(),
        })
    }

    #[test]
    fn deliver_invokes_matching_callback_only() {
        let calls = Calls::default();
        let unfollow = DecodedEvent {
            id: EventId(1),
            payload: EventPayload::Unfollow {
                source: user(1),
                target: user(2),
            },
        };
        let limit = DecodedEvent {
            id: EventId(2),
            payload: EventPayload::TrackLimitationNotice { limited: 42 },
        };
        let follow = DecodedEvent {
            id: EventId(3),
            payload: EventPayload::Follow {
                source: user(1),
                target: user(2),
            },
        };
        unfollow.deliver(&calls).unwrap();
        limit.deliver(&calls).unwrap();
        follow.deliver(&calls).unwrap();
        assert_eq!(*calls.0.lock().unwrap(), vec!["unfollow", "limit"]);
        assert_eq!(unfollow.kind(), EventKind::Unfollow);
    }

    #[test]
    fn entity_keys_cover_all_passed_entities() {
        let event = DecodedEvent {
            id: EventId(9),
            payload: EventPayload::Block {
                source: user(5),
                target: user(6),
            },
        };
        assert_eq!(event.entity_keys(), vec![EntityKey::User(5), EntityKey::User(6)]);
        assert_eq!(event.raw_key(), EntityKey::Record(EventId(9)));
    }
}
