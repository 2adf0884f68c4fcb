//! Test helpers: a listener that forwards every callback to a channel.
//!
//! Tests wait on the receiving end with [`recv_within`] instead of sleeping.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use userstream_core::{
    DirectMessage, EventKind, ListenerResult, RawJsonRegistry, RawKeyed, Status,
    StatusDeletionNotice, StreamError, StreamListener, User, UserList,
};

/// One observed callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Event {
        kind: EventKind,
        /// Ids of every argument, in callback parameter order. Counts and
        /// friend ids are listed as-is.
        ids: Vec<u64>,
        /// Registry lookups for every entity argument, taken inside the callback.
        raw: Vec<Option<Arc<str>>>,
    },
    Exception(String),
}

impl Received {
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Received::Event { kind, .. } => Some(*kind),
            Received::Exception(_) => None,
        }
    }
}

pub struct RecordingListener {
    registry: Arc<RawJsonRegistry>,
    tx: mpsc::UnboundedSender<Received>,
}

impl RecordingListener {
    pub fn new(registry: Arc<RawJsonRegistry>) -> (Self, mpsc::UnboundedReceiver<Received>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { registry, tx }, rx)
    }

    fn raw(&self, entity: &dyn RawKeyed) -> Option<Arc<str>> {
        self.registry.get(&entity.raw_key())
    }

    fn push(&self, kind: EventKind, ids: Vec<u64>, raw: Vec<Option<Arc<str>>>) -> ListenerResult {
        // A closed receiver means the test has stopped looking.
        let _ = self.tx.send(Received::Event { kind, ids, raw });
        Ok(())
    }

    fn pair(&self, kind: EventKind, source: &Arc<User>, target: &Arc<User>) -> ListenerResult {
        self.push(
            kind,
            vec![source.id, target.id],
            vec![self.raw(source), self.raw(target)],
        )
    }

    fn triple(
        &self,
        kind: EventKind,
        source: &Arc<User>,
        target: &Arc<User>,
        status: &Arc<Status>,
    ) -> ListenerResult {
        self.push(
            kind,
            vec![source.id, target.id, status.id],
            vec![self.raw(source), self.raw(target), self.raw(status)],
        )
    }

    fn list(&self, kind: EventKind, owner: &Arc<User>, list: &Arc<UserList>) -> ListenerResult {
        self.push(
            kind,
            vec![owner.id, list.id],
            vec![self.raw(owner), self.raw(list)],
        )
    }
}

impl StreamListener for RecordingListener {
    fn on_status(&self, status: &Arc<Status>) -> ListenerResult {
        self.push(EventKind::Status, vec![status.id], vec![self.raw(status)])
    }

    fn on_deletion_notice(&self, notice: &StatusDeletionNotice) -> ListenerResult {
        self.push(
            EventKind::DeletionNoticeStatus,
            vec![notice.status_id, notice.user_id],
            vec![self.raw(notice)],
        )
    }

    fn on_direct_message_deletion(&self, message_id: u64, user_id: u64) -> ListenerResult {
        self.push(
            EventKind::DeletionNoticeDirectMessage,
            vec![message_id, user_id],
            vec![],
        )
    }

    fn on_track_limitation_notice(&self, limited: u64) -> ListenerResult {
        self.push(EventKind::TrackLimitationNotice, vec![limited], vec![])
    }

    fn on_friend_list(&self, friend_ids: &[u64]) -> ListenerResult {
        self.push(EventKind::FriendList, friend_ids.to_vec(), vec![])
    }

    fn on_favorite(&self, source: &Arc<User>, target: &Arc<User>, status: &Arc<Status>) -> ListenerResult {
        self.triple(EventKind::Favorite, source, target, status)
    }

    fn on_unfavorite(&self, source: &Arc<User>, target: &Arc<User>, status: &Arc<Status>) -> ListenerResult {
        self.triple(EventKind::Unfavorite, source, target, status)
    }

    fn on_follow(&self, source: &Arc<User>, followed: &Arc<User>) -> ListenerResult {
        self.pair(EventKind::Follow, source, followed)
    }

    fn on_unfollow(&self, source: &Arc<User>, unfollowed: &Arc<User>) -> ListenerResult {
        self.pair(EventKind::Unfollow, source, unfollowed)
    }

    fn on_retweet(&self, source: &Arc<User>, target: &Arc<User>, retweeted: &Arc<Status>) -> ListenerResult {
        self.triple(EventKind::Retweet, source, target, retweeted)
    }

    fn on_direct_message(&self, message: &Arc<DirectMessage>) -> ListenerResult {
        self.push(EventKind::DirectMessage, vec![message.id], vec![self.raw(message)])
    }

    fn on_user_list_subscribed(
        &self,
        subscriber: &Arc<User>,
        owner: &Arc<User>,
        list: &Arc<UserList>,
    ) -> ListenerResult {
        self.push(
            EventKind::ListSubscribed,
            vec![subscriber.id, owner.id, list.id],
            vec![self.raw(subscriber), self.raw(owner), self.raw(list)],
        )
    }

    fn on_user_list_created(&self, owner: &Arc<User>, list: &Arc<UserList>) -> ListenerResult {
        self.list(EventKind::ListCreated, owner, list)
    }

    fn on_user_list_updated(&self, owner: &Arc<User>, list: &Arc<UserList>) -> ListenerResult {
        self.list(EventKind::ListUpdated, owner, list)
    }

    fn on_user_list_destroyed(&self, owner: &Arc<User>, list: &Arc<UserList>) -> ListenerResult {
        self.list(EventKind::ListDestroyed, owner, list)
    }

    fn on_block(&self, source: &Arc<User>, blocked: &Arc<User>) -> ListenerResult {
        self.pair(EventKind::Block, source, blocked)
    }

    fn on_unblock(&self, source: &Arc<User>, unblocked: &Arc<User>) -> ListenerResult {
        self.pair(EventKind::Unblock, source, unblocked)
    }

    fn on_exception(&self, error: &StreamError) {
        let _ = self.tx.send(Received::Exception(error.to_string()));
    }
}

/// Wait up to `limit` for the next callback. `None` on timeout or when every
/// sender is gone.
pub async fn recv_within(
    rx: &mut mpsc::UnboundedReceiver<Received>,
    limit: Duration,
) -> Option<Received> {
    tokio::time::timeout(limit, rx.recv()).await.ok().flatten()
}

/// Collect callbacks until `count` have arrived or `limit` passes without one.
pub async fn collect(
    rx: &mut mpsc::UnboundedReceiver<Received>,
    count: usize,
    limit: Duration,
) -> Vec<Received> {
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        match recv_within(rx, limit).await {
            Some(item) => out.push(item),
            None => break,
        }
    }
    out
}
