//! In-memory raw JSON registry.
//!
//! Maps the identity of every decoded object to the exact JSON text it was
//! decoded from. Thread-safe via `RwLock`; readers observe a complete entry
//! or none. Entries are never evicted, so memory grows with the number of
//! distinct identities seen by the owning session.

use crate::entity::{EntityKey, RawKeyed};
use crate::event::EventId;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock, PoisonError, RwLock,
    },
};

static GLOBAL: OnceLock<Arc<RawJsonRegistry>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct RawJsonRegistry {
    entries: RwLock<HashMap<EntityKey, Arc<str>>>,
    issued_events: AtomicU64,
}

impl RawJsonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first use.
    ///
    /// Drivers use a session-scoped registry unless this one is injected.
    pub fn global() -> Arc<RawJsonRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(RawJsonRegistry::new())))
    }

    /// Allocate the next event id. Ids start at 1 and are unique among every
    /// decoder writing into this registry, `clear` included.
    pub fn next_event_id(&self) -> EventId {
        EventId(self.issued_events.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register `raw` for `key`. A later write for the same key wins.
    pub fn put(&self, key: EntityKey, raw: impl Into<Arc<str>>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, raw.into());
    }

    pub fn get(&self, key: &EntityKey) -> Option<Arc<str>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Original JSON of a previously decoded entity or event.
    pub fn raw_json<T: RawKeyed + ?Sized>(&self, object: &T) -> Option<Arc<str>> {
        self.get(&object.raw_key())
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::User;
    use std::thread;

    #[test]
    fn put_and_lookup() {
        let reg = RawJsonRegistry::new();
        reg.put(EntityKey::User(1), r#"{"id":1}"#);
        assert_eq!(reg.get(&EntityKey::User(1)).as_deref(), Some(r#"{"id":1}"#));
        assert!(reg.get(&EntityKey::Status(1)).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn later_write_wins() {
        let reg = RawJsonRegistry::new();
        reg.put(EntityKey::Status(5), r#"{"id":5,"text":"a"}"#);
        reg.put(EntityKey::Status(5), r#"{"id":5,"text":"b"}"#);
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.get(&EntityKey::Status(5)).as_deref(),
            Some(r#"{"id":5,"text":"b"}"#)
        );
    }

    #[test]
    fn lookup_by_entity() {
        let reg = RawJsonRegistry::new();
        let user = User {
            id: 12345678,
            screen_name: "target".into(),
            name: String::new(),
        };
        reg.put(EntityKey::User(12345678), r#"{"id":12345678}"#);
        assert!(reg.raw_json(&user).is_some());
        assert!(reg.raw_json(&Arc::new(user)).is_some());
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let reg = Arc::new(RawJsonRegistry::new());
        let writers: Vec<_> = (0..4u64)
            .map(|t| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    for i in 0..250u64 {
                        let id = t * 1_000 + i;
                        reg.put(EntityKey::User(id), format!(r#"{{"id":{id}}}"#));
                        let raw = reg.get(&EntityKey::User(id)).unwrap();
                        assert_eq!(&*raw, format!(r#"{{"id":{id}}}"#));
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(reg.len(), 1_000);
    }

    #[test]
    fn event_ids_are_unique_across_threads() {
        let reg = Arc::new(RawJsonRegistry::new());
        assert_eq!(reg.next_event_id(), EventId(1));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || (0..100).map(|_| reg.next_event_id().0).collect::<Vec<_>>())
            })
            .collect();
        let mut ids: Vec<u64> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(ids.first(), Some(&2));
        reg.clear();
        assert_eq!(reg.next_event_id(), EventId(402));
    }

    #[test]
    fn global_is_shared() {
        let a = RawJsonRegistry::global();
        let b = RawJsonRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn clear_empties() {
        let reg = RawJsonRegistry::new();
        reg.put(EntityKey::UserList(3), "{}");
        reg.clear();
        assert!(reg.is_empty());
    }
}
