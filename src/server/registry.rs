//! Connection registry and broadcast engine for the chat relay
//!
//! This module owns the only cross-connection shared state on the server:
//! the set of live sessions. All mutation and iteration goes through
//! `Registry` methods, which serialize against each other over one lock;
//! the underlying map is never exposed.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::protocol::codec;
use crate::protocol::messages::ServerMessage;

/// Server-side state for one connected client
///
/// The remote address doubles as the session's stable identity and registry
/// handle: it is assigned once at accept time and never changes. Display
/// names live with the session's handler task, not here; other connections
/// only ever learn about them through the messages that carry them.
#[derive(Debug)]
pub struct Session {
    /// Remote ip:port, immutable for the lifetime of the connection
    addr: SocketAddr,
    /// Write half of the connection, locked per frame so concurrent
    /// senders never interleave two frames' bytes
    writer: Mutex<OwnedWriteHalf>,
}

impl Session {
    /// Create a session around the write half of an accepted connection
    pub fn new(addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            addr,
            writer: Mutex::new(writer),
        }
    }

    /// The session's address id (registry handle)
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send one typed message to this session
    pub async fn send(&self, message: &ServerMessage) -> Result<()> {
        let mut writer = self.writer.lock().await;
        codec::write_message(&mut *writer, message).await
    }

    /// Write an already-encoded frame to this session
    pub async fn send_encoded(&self, frame: &Bytes) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// The set of all live sessions, shared across connection handler tasks
pub struct Registry {
    /// Sessions indexed by address id
    sessions: Mutex<HashMap<SocketAddr, Arc<Session>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Add a session; returns false if the handle is already registered
    pub async fn add(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.addr()) {
            return false;
        }
        sessions.insert(session.addr(), session);
        true
    }

    /// Remove a session by its handle
    pub async fn remove(&self, addr: SocketAddr) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&addr)
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        let sessions = self.sessions.lock().await;
        sessions.len()
    }

    /// Whether no session is registered
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every session at once
    ///
    /// For teardown paths that abort handler tasks from outside: an aborted
    /// handler never reaches its own `remove`, so its entry has to go here.
    pub async fn clear(&self) {
        let mut sessions = self.sessions.lock().await;
        sessions.clear();
    }

    /// Visit every session except the excluded handle
    ///
    /// The registry lock is held for the whole visit, so the view is
    /// consistent with respect to concurrent `add`/`remove`: each session is
    /// visited at most once and never after its entry has been removed and
    /// the handle reused.
    pub async fn for_each_except<F, Fut>(&self, exclude: Option<SocketAddr>, mut f: F)
    where
        F: FnMut(Arc<Session>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let sessions = self.sessions.lock().await;
        for (addr, session) in sessions.iter() {
            if Some(*addr) == exclude {
                continue;
            }
            f(Arc::clone(session)).await;
        }
    }

    /// Fan a message out to every registered session except `exclude`
    ///
    /// The message is encoded once and the same buffer written to every
    /// recipient. A failed write to one recipient is logged and skipped: it
    /// neither aborts delivery to the others nor reaches the originator, and
    /// the broken recipient's own read loop will clean that session up.
    pub async fn broadcast(&self, message: &ServerMessage, exclude: Option<SocketAddr>) {
        let frame = match codec::encode_message(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping undeliverable broadcast: {}", e);
                return;
            }
        };

        self.for_each_except(exclude, |session| {
            let frame = frame.clone();
            async move {
                if let Err(e) = session.send_encoded(&frame).await {
                    warn!("Failed to deliver to {}: {}", session.addr(), e);
                }
            }
        })
        .await;
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    /// Accept one loopback connection and wrap its write half in a session,
    /// returning the client end for assertions
    async fn session_pair() -> (Arc<Session>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        let (_read_half, write_half) = stream.into_split();
        (Arc::new(Session::new(peer, write_half)), client)
    }

    #[tokio::test]
    async fn test_add_remove() {
        let registry = Registry::new();
        let (session, _client) = session_pair().await;
        let addr = session.addr();

        assert!(registry.add(Arc::clone(&session)).await);
        assert_eq!(registry.len().await, 1);

        // Same handle cannot be registered twice
        assert!(!registry.add(session).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(addr).await.is_some());
        assert!(registry.remove(addr).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_empties_the_registry() {
        let registry = Registry::new();
        let (s1, _c1) = session_pair().await;
        let (s2, _c2) = session_pair().await;

        registry.add(s1).await;
        registry.add(s2).await;
        assert_eq!(registry.len().await, 2);

        registry.clear().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_for_each_except_skips_excluded() {
        let registry = Registry::new();
        let (s1, _c1) = session_pair().await;
        let (s2, _c2) = session_pair().await;
        let (s3, _c3) = session_pair().await;
        let excluded = s1.addr();

        registry.add(s1).await;
        registry.add(s2).await;
        registry.add(s3).await;

        let mut visited = Vec::new();
        registry
            .for_each_except(Some(excluded), |session| {
                visited.push(session.addr());
                async {}
            })
            .await;

        assert_eq!(visited.len(), 2);
        assert!(!visited.contains(&excluded));
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let registry = Registry::new();
        let (s1, mut c1) = session_pair().await;
        let (s2, mut c2) = session_pair().await;
        let sender = s1.addr();

        registry.add(s1).await;
        registry.add(s2).await;

        let msg = ServerMessage::chat("alice", "hi", sender.to_string(), None, 1);
        registry.broadcast(&msg, Some(sender)).await;

        let payload = timeout(Duration::from_secs(1), frame::read_frame(&mut c2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(codec::decode_server(&payload).unwrap(), msg);

        // The excluded sender must not see its own message
        let nothing = timeout(Duration::from_millis(100), frame::read_frame(&mut c1)).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_broadcast_without_exclusion_reaches_all() {
        let registry = Registry::new();
        let (s1, mut c1) = session_pair().await;
        let (s2, mut c2) = session_pair().await;

        registry.add(s1).await;
        registry.add(s2).await;

        let msg = ServerMessage::user_left("bob", "127.0.0.1:9009", None, 2);
        registry.broadcast(&msg, None).await;

        for client in [&mut c1, &mut c2] {
            let payload = timeout(Duration::from_secs(1), frame::read_frame(client))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(codec::decode_server(&payload).unwrap(), msg);
        }
    }

    #[tokio::test]
    async fn test_broadcast_write_failure_is_isolated() {
        let registry = Registry::new();

        // Build one session whose transport is already unwritable
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        let (_read_half, mut write_half) = stream.into_split();
        write_half.shutdown().await.unwrap();
        let broken = Arc::new(Session::new(peer, write_half));

        let (healthy, mut healthy_client) = session_pair().await;

        registry.add(broken).await;
        registry.add(healthy).await;

        let msg = ServerMessage::chat("carol", "still here?", "127.0.0.1:9010", None, 3);
        registry.broadcast(&msg, None).await;

        // Delivery to the healthy session is unaffected by the failed write
        let payload = timeout(Duration::from_secs(1), frame::read_frame(&mut healthy_client))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(codec::decode_server(&payload).unwrap(), msg);
    }
}
