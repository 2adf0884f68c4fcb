//! `StreamListener` — the callback surface registered with a stream.
//!
//! Every method has a no-op default, so a listener implements only the kinds
//! it cares about. Callbacks run on the dispatch context, one record at a
//! time, in registration order across all registered listeners.

use crate::entity::{DirectMessage, Status, StatusDeletionNotice, User, UserList};
use crate::error::StreamError;
use std::sync::Arc;

/// Error a listener may return from a callback.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

pub type ListenerResult = Result<(), ListenerError>;

/// Receives decoded stream events.
///
/// A callback that returns `Err` or panics is reported through
/// [`on_exception`](StreamListener::on_exception) to every listener; delivery
/// continues with the next listener and the next record.
pub trait StreamListener: Send + Sync {
    fn on_status(&self, _status: &Arc<Status>) -> ListenerResult {
        Ok(())
    }

    fn on_deletion_notice(&self, _notice: &StatusDeletionNotice) -> ListenerResult {
        Ok(())
    }

    fn on_direct_message_deletion(&self, _message_id: u64, _user_id: u64) -> ListenerResult {
        Ok(())
    }

    /// `limited` is the number of statuses withheld by a track limit.
    fn on_track_limitation_notice(&self, _limited: u64) -> ListenerResult {
        Ok(())
    }

    fn on_friend_list(&self, _friend_ids: &[u64]) -> ListenerResult {
        Ok(())
    }

    fn on_favorite(
        &self,
        _source: &Arc<User>,
        _target: &Arc<User>,
        _favorited: &Arc<Status>,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_unfavorite(
        &self,
        _source: &Arc<User>,
        _target: &Arc<User>,
        _unfavorited: &Arc<Status>,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_follow(&self, _source: &Arc<User>, _followed: &Arc<User>) -> ListenerResult {
        Ok(())
    }

    fn on_unfollow(&self, _source: &Arc<User>, _unfollowed: &Arc<User>) -> ListenerResult {
        Ok(())
    }

    fn on_retweet(
        &self,
        _source: &Arc<User>,
        _target: &Arc<User>,
        _retweeted: &Arc<Status>,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_direct_message(&self, _message: &Arc<DirectMessage>) -> ListenerResult {
        Ok(())
    }

    fn on_user_list_subscribed(
        &self,
        _subscriber: &Arc<User>,
        _owner: &Arc<User>,
        _list: &Arc<UserList>,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_user_list_created(&self, _owner: &Arc<User>, _list: &Arc<UserList>) -> ListenerResult {
        Ok(())
    }

    fn on_user_list_updated(&self, _owner: &Arc<User>, _list: &Arc<UserList>) -> ListenerResult {
        Ok(())
    }

    fn on_user_list_destroyed(&self, _owner: &Arc<User>, _list: &Arc<UserList>) -> ListenerResult {
        Ok(())
    }

    fn on_block(&self, _source: &Arc<User>, _blocked: &Arc<User>) -> ListenerResult {
        Ok(())
    }

    fn on_unblock(&self, _source: &Arc<User>, _unblocked: &Arc<User>) -> ListenerResult {
        Ok(())
    }

    /// Malformed records, listener failures and terminal driver errors.
    ///
    /// Anything raised from here is swallowed.
    fn on_exception(&self, _error: &StreamError) {}
}
