//! The closed set of event kinds a record can classify as.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a stream record. Determines which listener callback fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Status,
    DeletionNoticeStatus,
    DeletionNoticeDirectMessage,
    TrackLimitationNotice,
    FriendList,
    Favorite,
    Unfavorite,
    Follow,
    Unfollow,
    Retweet,
    DirectMessage,
    ListSubscribed,
    ListCreated,
    ListUpdated,
    ListDestroyed,
    Block,
    Unblock,
    /// Nothing matched. Dropped without a callback or an error.
    Unknown,
}

impl EventKind {
    /// Map the value of a record's `"event"` field to a kind.
    ///
    /// Names the upstream may add later fall through to `Unknown`.
    pub fn from_event_name(name: &str) -> EventKind {
        match name {
            "favorite" => EventKind::Favorite,
            "unfavorite" => EventKind::Unfavorite,
            "follow" => EventKind::Follow,
            "unfollow" => EventKind::Unfollow,
            "retweet" => EventKind::Retweet,
            "list_user_subscribed" | "list_subscribed" => EventKind::ListSubscribed,
            "list_created" => EventKind::ListCreated,
            "list_updated" => EventKind::ListUpdated,
            "list_destroyed" => EventKind::ListDestroyed,
            "block" => EventKind::Block,
            "unblock" => EventKind::Unblock,
            _ => EventKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Status => "status",
            EventKind::DeletionNoticeStatus => "deletion_notice_status",
            EventKind::DeletionNoticeDirectMessage => "deletion_notice_direct_message",
            EventKind::TrackLimitationNotice => "track_limitation_notice",
            EventKind::FriendList => "friend_list",
            EventKind::Favorite => "favorite",
            EventKind::Unfavorite => "unfavorite",
            EventKind::Follow => "follow",
            EventKind::Unfollow => "unfollow",
            EventKind::Retweet => "retweet",
            EventKind::DirectMessage => "direct_message",
            EventKind::ListSubscribed => "list_subscribed",
            EventKind::ListCreated => "list_created",
            EventKind::ListUpdated => "list_updated",
            EventKind::ListDestroyed => "list_destroyed",
            EventKind::Block => "block",
            EventKind::Unblock => "unblock",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names() {
        assert_eq!(EventKind::from_event_name("unfollow"), EventKind::Unfollow);
        assert_eq!(
            EventKind::from_event_name("list_user_subscribed"),
            EventKind::ListSubscribed
        );
        assert_eq!(EventKind::from_event_name("list_subscribed"), EventKind::ListSubscribed);
        assert_eq!(EventKind::from_event_name("quoted_tweet"), EventKind::Unknown);
        assert_eq!(EventKind::from_event_name("FOLLOW"), EventKind::Unknown);
    }
}
