//! Bounded, process-lifetime conversation sessions.
//!
//! The [`SessionStore`] maps a session key (a user id for private
//! conversations, a chat id for shared ones) to its turn history. The store
//! holds at most `capacity` sessions and evicts the least-recently-used one
//! on insertion. Lookup-and-touch and evict-on-insert happen under one lock,
//! so concurrent sessions never observe a half-updated order.
//!
//! Each session sits behind its own async mutex. The orchestrator holds it
//! for the whole append → call → append sequence of one message, which keeps
//! concurrent messages of the same session from interleaving.

use indexmap::IndexMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::message::Turn;

/// Opaque session key: user id or chat id.
pub type SessionKey = i64;

/// Shared handle to one session.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Ordered turn history of one conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// The turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Remove the newest turn if it is a user turn.
    ///
    /// Used to roll back a speculative user turn after a failed exchange.
    pub fn rollback_user(&mut self) -> Option<Turn> {
        if self.turns.last().is_some_and(Turn::is_user) {
            self.turns.pop()
        } else {
            None
        }
    }

    /// Drop oldest turns until at most `max_turns` remain.
    ///
    /// Returns the number of turns dropped.
    pub fn trim_to(&mut self, max_turns: usize) -> usize {
        let excess = self.turns.len().saturating_sub(max_turns);
        if excess > 0 {
            self.turns.drain(..excess);
        }
        excess
    }

    /// The newest `max_turns` turns, starting at a user turn.
    ///
    /// Leading assistant turns are skipped because the model API expects a
    /// conversation to open with the user.
    #[must_use]
    pub fn window(&self, max_turns: usize) -> Vec<Turn> {
        let start = self.turns.len().saturating_sub(max_turns);
        self.turns[start..]
            .iter()
            .skip_while(|t| !t.is_user())
            .cloned()
            .collect()
    }

    /// Clear the history.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// LRU-bounded map from session key to session.
#[derive(Debug)]
pub struct SessionStore {
    capacity: usize,
    sessions: Mutex<IndexMap<SessionKey, SessionHandle>>,
}

impl SessionStore {
    /// Create a store holding at most `capacity` sessions (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: Mutex::new(IndexMap::new()),
        }
    }

    /// Maximum number of sessions.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn map(&self) -> std::sync::MutexGuard<'_, IndexMap<SessionKey, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the session for `key`, creating it if absent.
    ///
    /// The session becomes the most recently used. Creating a session in a
    /// full store evicts the least recently used one first.
    pub fn get_or_create(&self, key: SessionKey) -> SessionHandle {
        let mut map = self.map();
        if let Some(index) = map.get_index_of(&key) {
            let last = map.len() - 1;
            map.move_index(index, last);
            return Arc::clone(&map[last]);
        }

        if map.len() >= self.capacity
            && let Some((evicted, _)) = map.shift_remove_index(0)
        {
            debug!(evicted, capacity = self.capacity, "session evicted");
        }
        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(Session::new()));
        map.insert(key, Arc::clone(&handle));
        debug!(key, sessions = map.len(), "session created");
        handle
    }

    /// Return the session for `key` if present, marking it most recently used.
    pub fn get(&self, key: SessionKey) -> Option<SessionHandle> {
        let mut map = self.map();
        let index = map.get_index_of(&key)?;
        let last = map.len() - 1;
        map.move_index(index, last);
        Some(Arc::clone(&map[last]))
    }

    /// Drop oldest turns of `key` until at most `max_turns` remain.
    ///
    /// Returns the number of turns dropped; zero for unknown keys.
    pub async fn trim(&self, key: SessionKey, max_turns: usize) -> usize {
        let Some(handle) = self.get(key) else {
            return 0;
        };
        let dropped = handle.lock().await.trim_to(max_turns);
        dropped
    }

    /// Remove a session entirely.
    ///
    /// Returns whether a session was removed.
    pub fn forget(&self, key: SessionKey) -> bool {
        let removed = self.map().shift_remove(&key).is_some();
        if removed {
            debug!(key, "session forgotten");
        }
        removed
    }

    /// Whether a session exists, without touching its recency.
    #[must_use]
    pub fn contains(&self, key: SessionKey) -> bool {
        self.map().contains_key(&key)
    }

    /// Number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Keys from least to most recently used.
    #[must_use]
    pub fn keys(&self) -> Vec<SessionKey> {
        self.map().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_least_recent() {
        let store = SessionStore::new(3);
        for key in 1..=3 {
            store.get_or_create(key);
        }
        // Touch 1 so that 2 becomes the oldest.
        store.get_or_create(1);
        store.get_or_create(4);

        assert_eq!(store.len(), 3);
        assert!(!store.contains(2));
        assert_eq!(store.keys(), vec![3, 1, 4]);
    }

    #[test]
    fn test_n_plus_one_inserts_keep_n() {
        let store = SessionStore::new(5);
        for key in 0..6 {
            store.get_or_create(key);
        }
        assert_eq!(store.len(), 5);
        assert!(!store.contains(0));
        assert!(store.contains(5));
    }

    #[test]
    fn test_get_touches_and_returns_same_handle() {
        let store = SessionStore::new(2);
        let a = store.get_or_create(10);
        store.get_or_create(20);
        let again = store.get(10).unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        store.get_or_create(30);
        assert!(store.contains(10));
        assert!(!store.contains(20));
        assert!(store.get(99).is_none());
    }

    #[tokio::test]
    async fn test_trim_drops_oldest_first() {
        let store = SessionStore::new(4);
        let handle = store.get_or_create(1);
        {
            let mut session = handle.lock().await;
            for i in 0..5 {
                session.push(Turn::user(format!("q{i}")));
                session.push(Turn::assistant(format!("a{i}")));
            }
        }
        let dropped = store.trim(1, 4).await;
        assert_eq!(dropped, 6);
        let session = handle.lock().await;
        assert_eq!(session.len(), 4);
        assert_eq!(session.turns()[0].text(), Some("q3"));
        assert_eq!(session.turns()[3].text(), Some("a4"));
    }

    #[tokio::test]
    async fn test_forget_removes_session() {
        let store = SessionStore::new(4);
        store
            .get_or_create(7)
            .lock()
            .await
            .push(Turn::user("hello"));
        assert!(store.forget(7));
        assert!(!store.forget(7));
        assert!(store.get_or_create(7).lock().await.is_empty());
    }

    #[test]
    fn test_rollback_only_removes_user_turn() {
        let mut session = Session::new();
        session.push(Turn::user("q"));
        session.push(Turn::assistant("a"));
        assert!(session.rollback_user().is_none());
        session.push(Turn::user("q2"));
        assert_eq!(session.rollback_user().unwrap().text(), Some("q2"));
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_window_starts_with_user() {
        let mut session = Session::new();
        session.push(Turn::user("q1"));
        session.push(Turn::assistant("a1"));
        session.push(Turn::user("q2"));
        let window = session.window(2);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].text(), Some("q2"));
        assert_eq!(session.window(10).len(), 3);
    }
}
