//! Listener that prints every event as one JSON line on stdout.

use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use userstream_core::{
    DirectMessage, EventKind, ListenerResult, RawJsonRegistry, RawKeyed, Status,
    StatusDeletionNotice, StreamError, StreamListener, User, UserList,
};

pub struct PrintListener {
    registry: Arc<RawJsonRegistry>,
    raw: bool,
}

impl PrintListener {
    pub fn new(registry: Arc<RawJsonRegistry>, raw: bool) -> Self {
        Self { registry, raw }
    }

    /// The decoded entity, or its registered source text in raw mode.
    fn entity<T: serde::Serialize + RawKeyed>(&self, entity: &T) -> Value {
        if self.raw {
            if let Some(text) = self.registry.raw_json(entity) {
                if let Ok(value) = serde_json::from_str(&text) {
                    return value;
                }
            }
        }
        serde_json::to_value(entity).unwrap_or(Value::Null)
    }

    fn emit(&self, kind: EventKind, body: Value) -> ListenerResult {
        let line = json!({ "kind": kind, "event": body });
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        Ok(())
    }

    fn social(&self, kind: EventKind, source: &Arc<User>, target: &Arc<User>) -> ListenerResult {
        self.emit(
            kind,
            json!({ "source": self.entity(source), "target": self.entity(target) }),
        )
    }

    fn on_status_event(
        &self,
        kind: EventKind,
        source: &Arc<User>,
        target: &Arc<User>,
        status: &Arc<Status>,
    ) -> ListenerResult {
        self.emit(
            kind,
            json!({
                "source": self.entity(source),
                "target": self.entity(target),
                "target_object": self.entity(status),
            }),
        )
    }

    fn on_list_event(&self, kind: EventKind, owner: &Arc<User>, list: &Arc<UserList>) -> ListenerResult {
        self.emit(
            kind,
            json!({ "owner": self.entity(owner), "list": self.entity(list) }),
        )
    }
}

impl StreamListener for PrintListener {
    fn on_status(&self, status: &Arc<Status>) -> ListenerResult {
        self.emit(EventKind::Status, self.entity(status))
    }

    fn on_deletion_notice(&self, notice: &StatusDeletionNotice) -> ListenerResult {
        self.emit(EventKind::DeletionNoticeStatus, self.entity(notice))
    }

    fn on_direct_message_deletion(&self, message_id: u64, user_id: u64) -> ListenerResult {
        self.emit(
            EventKind::DeletionNoticeDirectMessage,
            json!({ "message_id": message_id, "user_id": user_id }),
        )
    }

    fn on_track_limitation_notice(&self, limited: u64) -> ListenerResult {
        self.emit(EventKind::TrackLimitationNotice, json!({ "limited": limited }))
    }

    fn on_friend_list(&self, friend_ids: &[u64]) -> ListenerResult {
        self.emit(EventKind::FriendList, json!({ "friend_ids": friend_ids }))
    }

    fn on_favorite(&self, source: &Arc<User>, target: &Arc<User>, status: &Arc<Status>) -> ListenerResult {
        self.on_status_event(EventKind::Favorite, source, target, status)
    }

    fn on_unfavorite(&self, source: &Arc<User>, target: &Arc<User>, status: &Arc<Status>) -> ListenerResult {
        self.on_status_event(EventKind::Unfavorite, source, target, status)
    }

    fn on_follow(&self, source: &Arc<User>, followed: &Arc<User>) -> ListenerResult {
        self.social(EventKind::Follow, source, followed)
    }

    fn on_unfollow(&self, source: &Arc<User>, unfollowed: &Arc<User>) -> ListenerResult {
        self.social(EventKind::Unfollow, source, unfollowed)
    }

    fn on_retweet(&self, source: &Arc<User>, target: &Arc<User>, retweeted: &Arc<Status>) -> ListenerResult {
        self.on_status_event(EventKind::Retweet, source, target, retweeted)
    }

    fn on_direct_message(&self, message: &Arc<DirectMessage>) -> ListenerResult {
        self.emit(EventKind::DirectMessage, self.entity(message))
    }

    fn on_user_list_subscribed(
        &self,
        subscriber: &Arc<User>,
        owner: &Arc<User>,
        list: &Arc<UserList>,
    ) -> ListenerResult {
        self.emit(
            EventKind::ListSubscribed,
            json!({
                "subscriber": self.entity(subscriber),
                "owner": self.entity(owner),
                "list": self.entity(list),
            }),
        )
    }

    fn on_user_list_created(&self, owner: &Arc<User>, list: &Arc<UserList>) -> ListenerResult {
        self.on_list_event(EventKind::ListCreated, owner, list)
    }

    fn on_user_list_updated(&self, owner: &Arc<User>, list: &Arc<UserList>) -> ListenerResult {
        self.on_list_event(EventKind::ListUpdated, owner, list)
    }

    fn on_user_list_destroyed(&self, owner: &Arc<User>, list: &Arc<UserList>) -> ListenerResult {
        self.on_list_event(EventKind::ListDestroyed, owner, list)
    }

    fn on_block(&self, source: &Arc<User>, blocked: &Arc<User>) -> ListenerResult {
        self.social(EventKind::Block, source, blocked)
    }

    fn on_unblock(&self, source: &Arc<User>, unblocked: &Arc<User>) -> ListenerResult {
        self.social(EventKind::Unblock, source, unblocked)
    }

    fn on_exception(&self, error: &StreamError) {
        let line = json!({ "kind": "exception", "error": error.to_string() });
        let _ = writeln!(std::io::stdout().lock(), "{line}");
    }
}
