//! Session state
//!
//! `SessionHandle` is the shared, registry-visible part of a connection: its
//! outbound queue and shutdown signal. `Session` is the per-connection state
//! owned by the connection task, including the current identity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::delivery::DeliveryChannel;
use crate::error::{ChatError, SendError};
use crate::message::{ServerMessage, LOGIN, OFFLINE};
use crate::registry::Registry;
use crate::types::SessionId;

/// Why a session went offline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed the connection
    Eof,
    /// Non-recoverable read error
    ReadError,
    /// No input within the idle window
    IdleTimeout,
    /// Evicted: outbound queue overflowed or a write failed
    Kicked,
    /// Never came online: the initial identity was taken
    Refused,
}

/// Registry-visible handle to a connected session
///
/// Cheap to share behind an `Arc`. Only the owning connection task reads
/// the other end of `outbound`.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    addr: String,
    outbound: mpsc::Sender<String>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl SessionHandle {
    /// Create a handle with a bounded outbound queue
    ///
    /// Returns the receiving end, to be drained by the session's writer.
    pub fn new(addr: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: SessionId::new(),
            addr: addr.into(),
            outbound,
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        };
        (handle, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Remote address, fixed at connection time
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Hand a line to this session's outbound queue without waiting
    ///
    /// A full queue means the client is not keeping up: the line is dropped
    /// and the session is kicked.
    pub fn deliver(&self, line: String) -> Result<(), SendError> {
        match self.outbound.try_send(line) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue full for session {} ({}), disconnecting",
                    self.id, self.addr
                );
                self.kick();
                Err(SendError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::ChannelClosed),
        }
    }

    /// Ask the owning connection task to tear the session down
    pub fn kick(&self) {
        self.shutdown.cancel();
    }

    pub fn is_kicked(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when the session is kicked or closing
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Claim the single teardown of this session
    ///
    /// Returns true for exactly one caller.
    pub fn begin_close(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Per-connection state owned by the connection task
pub struct Session {
    handle: Arc<SessionHandle>,
    identity: String,
    registry: Registry,
    delivery: DeliveryChannel,
}

impl Session {
    /// Create a session whose identity starts as its remote address
    pub fn new(handle: Arc<SessionHandle>, registry: Registry, delivery: DeliveryChannel) -> Self {
        let identity = handle.addr().to_string();
        Self {
            handle,
            identity,
            registry,
            delivery,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn addr(&self) -> &str {
        self.handle.addr()
    }

    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Send a line to this session's own client
    pub fn reply(&self, msg: ServerMessage) {
        if let Err(e) = self.handle.deliver(msg.to_string()) {
            debug!("Reply to session {} dropped: {}", self.handle.id(), e);
        }
    }

    /// Register under the initial identity and announce the login
    ///
    /// Fails only with `NameTaken`, in which case nothing was registered.
    pub async fn go_online(&self) -> Result<(), ChatError> {
        self.registry
            .register(&self.identity, Arc::clone(&self.handle))
            .await?;
        info!(
            "Session {} online as '{}' from {}",
            self.handle.id(),
            self.identity,
            self.addr()
        );
        if let Err(e) = self.broadcast(LOGIN).await {
            warn!("Login announcement for '{}' not sent: {}", self.identity, e);
        }
        Ok(())
    }

    /// Deregister, announce the logout, and stop the writer
    ///
    /// Only the first call does anything.
    pub async fn go_offline(&self, reason: CloseReason) {
        if !self.handle.begin_close() {
            debug!("Session {} already closed", self.handle.id());
            return;
        }

        if reason == CloseReason::IdleTimeout {
            self.reply(ChatError::IdleTimeout.into());
        }

        self.registry.unregister(&self.identity).await;
        if let Err(e) = self.broadcast(OFFLINE).await {
            debug!("Offline announcement for '{}' not sent: {}", self.identity, e);
        }

        info!(
            "Session {} ('{}') offline: {:?}",
            self.handle.id(),
            self.identity,
            reason
        );

        self.handle.kick();
    }

    /// Atomically move this session's registry entry to a new identity
    pub async fn rename(&mut self, new_identity: &str) -> Result<(), ChatError> {
        self.registry
            .rename(&self.identity, new_identity, &self.handle)
            .await?;
        info!(
            "Session {} renamed '{}' -> '{}'",
            self.handle.id(),
            self.identity,
            new_identity
        );
        self.identity = new_identity.to_string();
        Ok(())
    }

    /// Broadcast text to every online session, this one included
    pub async fn broadcast(&self, text: &str) -> Result<(), ChatError> {
        self.delivery
            .broadcast(&self.identity, self.addr(), text)
            .await
    }

    /// Send a private message to one identity
    pub async fn direct_message(&self, target: &str, text: &str) -> Result<(), ChatError> {
        self.delivery
            .direct_message(&self.identity, target, text)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_creation() {
        let (handle, _rx) = SessionHandle::new("127.0.0.1:4000", 4);

        assert_eq!(handle.addr(), "127.0.0.1:4000");
        assert!(!handle.is_kicked());
        assert!(!handle.is_closed());
    }

    #[tokio::test]
    async fn test_deliver_in_order() {
        let (handle, mut rx) = SessionHandle::new("a", 4);

        handle.deliver("one".to_string()).unwrap();
        handle.deliver("two".to_string()).unwrap();

        assert_eq!(rx.recv().await.unwrap(), "one");
        assert_eq!(rx.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_full_queue_kicks_session() {
        let (handle, _rx) = SessionHandle::new("slow", 1);

        handle.deliver("fits".to_string()).unwrap();
        assert_eq!(
            handle.deliver("overflow".to_string()),
            Err(SendError::QueueFull)
        );
        assert!(handle.is_kicked());
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (handle, rx) = SessionHandle::new("gone", 1);
        drop(rx);

        assert_eq!(
            handle.deliver("lost".to_string()),
            Err(SendError::ChannelClosed)
        );
        assert!(!handle.is_kicked());
    }

    #[tokio::test]
    async fn test_begin_close_once() {
        let (handle, _rx) = SessionHandle::new("x", 1);

        assert!(handle.begin_close());
        assert!(!handle.begin_close());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_go_offline_is_idempotent() {
        let registry = Registry::new();
        let (delivery, broadcaster) = crate::delivery::channel(registry.clone(), 16);
        tokio::spawn(broadcaster.run());

        let (watcher, mut watcher_rx) = SessionHandle::new("watcher", 16);
        registry.register("watcher", Arc::new(watcher)).await.unwrap();

        let (handle, _rx) = SessionHandle::new("10.0.0.1:1", 16);
        let session = Session::new(Arc::new(handle), registry.clone(), delivery);
        session.go_online().await.unwrap();
        assert_eq!(
            watcher_rx.recv().await.unwrap(),
            "[10.0.0.1:1]10.0.0.1:1: login"
        );

        tokio::join!(
            session.go_offline(CloseReason::Eof),
            session.go_offline(CloseReason::IdleTimeout)
        );

        assert_eq!(
            watcher_rx.recv().await.unwrap(),
            "[10.0.0.1:1]10.0.0.1:1: offline"
        );
        assert!(registry.lookup("10.0.0.1:1").await.is_none());
        assert!(session.handle().is_kicked());

        // Only one offline announcement was made
        session.broadcast("marker").await.unwrap();
        assert_eq!(
            watcher_rx.recv().await.unwrap(),
            "[10.0.0.1:1]10.0.0.1:1: marker"
        );
    }
}
