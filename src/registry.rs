//! Session registry
//!
//! Identity → session map, the single source of truth for who is online.
//! Readers take the shared lock; `register` and `rename` hold the exclusive
//! lock across their whole check-then-insert so two sessions can never end up
//! under the same identity.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ChatError;
use crate::session::SessionHandle;

/// Shared registry of online sessions, keyed by exact identity
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session under an identity that must not be in use
    pub async fn register(
        &self,
        identity: &str,
        session: Arc<SessionHandle>,
    ) -> Result<(), ChatError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(identity) {
            return Err(ChatError::NameTaken(identity.to_string()));
        }
        sessions.insert(identity.to_string(), session);
        debug!("Registered '{}', online: {}", identity, sessions.len());
        Ok(())
    }

    /// Remove an identity; returns whether it was present
    pub async fn unregister(&self, identity: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(identity).is_some();
        if removed {
            debug!("Unregistered '{}', online: {}", identity, sessions.len());
        }
        removed
    }

    /// Move a session from `old` to `new` in one exclusive step
    ///
    /// Fails with `NameTaken` if `new` is registered, even to this session.
    /// The `old` entry is only removed if it belongs to `session`.
    pub async fn rename(
        &self,
        old: &str,
        new: &str,
        session: &Arc<SessionHandle>,
    ) -> Result<(), ChatError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(new) {
            return Err(ChatError::NameTaken(new.to_string()));
        }
        if sessions
            .get(old)
            .is_some_and(|existing| existing.id() == session.id())
        {
            sessions.remove(old);
        }
        sessions.insert(new.to_string(), Arc::clone(session));
        Ok(())
    }

    pub async fn lookup(&self, identity: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(identity).cloned()
    }

    #[cfg(test)]
    pub async fn contains(&self, identity: &str) -> bool {
        self.sessions.read().await.contains_key(identity)
    }

    /// Current set of registered identities
    pub async fn snapshot_identities(&self) -> HashSet<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Offer a line to every registered session
    ///
    /// Holds the shared lock for the whole scan so the recipients are one
    /// consistent snapshot. Returns how many queues accepted the line.
    pub async fn fan_out(&self, line: &str) -> usize {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|session| session.deliver(line.to_string()).is_ok())
            .count()
    }

    /// Deliver a line to one identity while it is known to be registered
    pub async fn deliver_to(&self, identity: &str, line: String) -> Result<(), ChatError> {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(identity) else {
            return Err(ChatError::UserNotOnline(identity.to_string()));
        };
        if let Err(e) = session.deliver(line) {
            debug!("Direct message to '{}' dropped: {}", identity, e);
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(addr: &str) -> (Arc<SessionHandle>, tokio::sync::mpsc::Receiver<String>) {
        let (handle, rx) = SessionHandle::new(addr, 16);
        (Arc::new(handle), rx)
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = Registry::new();
        let (alice, _rx) = handle("1.1.1.1:1");

        registry.register("alice", Arc::clone(&alice)).await.unwrap();

        let found = registry.lookup("alice").await.unwrap();
        assert_eq!(found.id(), alice.id());
        assert!(registry.lookup("Alice").await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_fails() {
        let registry = Registry::new();
        let (first, _rx1) = handle("a");
        let (second, _rx2) = handle("b");

        registry.register("alice", Arc::clone(&first)).await.unwrap();
        let result = registry.register("alice", second).await;

        assert!(matches!(result, Err(ChatError::NameTaken(name)) if name == "alice"));
        assert_eq!(registry.lookup("alice").await.unwrap().id(), first.id());
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = Registry::new();
        let (alice, _rx) = handle("a");
        registry.register("alice", alice).await.unwrap();

        assert!(registry.unregister("alice").await);
        assert!(!registry.unregister("alice").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_rename_moves_entry() {
        let registry = Registry::new();
        let (session, _rx) = handle("a");
        registry.register("a", Arc::clone(&session)).await.unwrap();

        registry.rename("a", "dave", &session).await.unwrap();

        assert!(!registry.contains("a").await);
        assert_eq!(registry.lookup("dave").await.unwrap().id(), session.id());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_rename_to_taken_name_keeps_old() {
        let registry = Registry::new();
        let (me, _rx1) = handle("a");
        let (carol, _rx2) = handle("b");
        registry.register("me", Arc::clone(&me)).await.unwrap();
        registry.register("carol", Arc::clone(&carol)).await.unwrap();

        let result = registry.rename("me", "carol", &me).await;

        assert!(matches!(result, Err(ChatError::NameTaken(_))));
        assert_eq!(registry.lookup("me").await.unwrap().id(), me.id());
        assert_eq!(registry.lookup("carol").await.unwrap().id(), carol.id());
    }

    #[tokio::test]
    async fn test_rename_to_own_name_is_taken() {
        let registry = Registry::new();
        let (me, _rx) = handle("a");
        registry.register("me", Arc::clone(&me)).await.unwrap();

        assert!(registry.rename("me", "me", &me).await.is_err());
        assert!(registry.contains("me").await);
    }

    #[tokio::test]
    async fn test_rename_does_not_remove_foreign_entry() {
        let registry = Registry::new();
        let (owner, _rx1) = handle("a");
        let (other, _rx2) = handle("b");
        registry.register("shared", Arc::clone(&owner)).await.unwrap();

        registry.rename("shared", "fresh", &other).await.unwrap();

        assert_eq!(registry.lookup("shared").await.unwrap().id(), owner.id());
        assert_eq!(registry.lookup("fresh").await.unwrap().id(), other.id());
    }

    #[tokio::test]
    async fn test_snapshot_identities() {
        let registry = Registry::new();
        let (alice, _rx1) = handle("a");
        let (bob, _rx2) = handle("b");
        registry.register("alice", alice).await.unwrap();
        registry.register("bob", bob).await.unwrap();

        let snapshot = registry.snapshot_identities().await;

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("alice"));
        assert!(snapshot.contains("bob"));
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_session() {
        let registry = Registry::new();
        let (alice, mut alice_rx) = handle("a");
        let (bob, mut bob_rx) = handle("b");
        registry.register("alice", alice).await.unwrap();
        registry.register("bob", bob).await.unwrap();

        assert_eq!(registry.fan_out("hello").await, 2);

        assert_eq!(alice_rx.recv().await.unwrap(), "hello");
        assert_eq!(bob_rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_fan_out_skips_stalled_session() {
        let registry = Registry::new();
        let (slow, _slow_rx) = SessionHandle::new("slow", 1);
        let slow = Arc::new(slow);
        let (fast, mut fast_rx) = handle("fast");
        registry.register("slow", Arc::clone(&slow)).await.unwrap();
        registry.register("fast", fast).await.unwrap();

        assert_eq!(registry.fan_out("one").await, 2);
        assert_eq!(registry.fan_out("two").await, 1);

        assert!(slow.is_kicked());
        assert_eq!(fast_rx.recv().await.unwrap(), "one");
        assert_eq!(fast_rx.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_deliver_to_absent_identity() {
        let registry = Registry::new();
        let result = registry.deliver_to("nobody", "hi".to_string()).await;
        assert!(matches!(result, Err(ChatError::UserNotOnline(name)) if name == "nobody"));
    }

    #[tokio::test]
    async fn test_concurrent_renames_to_same_name() {
        for _ in 0..50 {
            let registry = Registry::new();
            let (a, _rx_a) = handle("a");
            let (b, _rx_b) = handle("b");
            registry.register("a", Arc::clone(&a)).await.unwrap();
            registry.register("b", Arc::clone(&b)).await.unwrap();

            let reg_a = registry.clone();
            let reg_b = registry.clone();
            let task_a = tokio::spawn(async move { reg_a.rename("a", "target", &a).await });
            let task_b = tokio::spawn(async move { reg_b.rename("b", "target", &b).await });

            let results = [task_a.await.unwrap(), task_b.await.unwrap()];
            let wins = results.iter().filter(|r| r.is_ok()).count();
            let taken = results
                .iter()
                .filter(|r| matches!(r, Err(ChatError::NameTaken(_))))
                .count();

            assert_eq!(wins, 1);
            assert_eq!(taken, 1);
            assert!(registry.contains("target").await);
            assert_eq!(registry.len().await, 2);
        }
    }
}
