//! Per-connection session handling for the chat relay
//!
//! Each accepted connection gets one `SessionHandler` running as its own
//! task: it registers the session, announces the join, then loops reading
//! frames and dispatching client messages until the peer disconnects or a
//! fatal protocol/transport error ends the connection. Whatever the exit
//! path, the handler removes its session from the registry and announces
//! the departure.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::current_timestamp;
use crate::error::{ChatError, Result};
use crate::protocol::codec;
use crate::protocol::frame;
use crate::protocol::messages::{validate_name, ClientMessage, ServerMessage};
use crate::server::registry::{Registry, Session};

/// Per-connection handler owning the read half and the name state
pub struct SessionHandler {
    /// Shared registry of all live sessions
    registry: Arc<Registry>,
    /// This connection's registry entry, shared with broadcasting peers
    session: Arc<Session>,
    /// Read half; only this handler's loop ever reads the connection
    reader: OwnedReadHalf,
    /// Registered display name, unset until a SetName succeeds. Peers learn
    /// of changes only through the messages that carry them.
    display_name: Option<String>,
}

impl SessionHandler {
    /// Create a handler for a freshly accepted connection
    pub fn new(stream: TcpStream, addr: SocketAddr, registry: Arc<Registry>) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            registry,
            session: Arc::new(Session::new(addr, writer)),
            reader,
            display_name: None,
        }
    }

    /// Run the session to completion
    ///
    /// This is the main entry point, spawned as a task per connection.
    pub async fn run(mut self) {
        let addr = self.session.addr();
        info!("New connection from {}", addr);

        if !self.registry.add(Arc::clone(&self.session)).await {
            warn!("Session handle {} already registered, dropping connection", addr);
            return;
        }

        // The joining session does not receive its own join event
        let joined = ServerMessage::user_joined(
            addr.to_string(),
            addr.to_string(),
            None,
            current_timestamp(),
        );
        self.registry.broadcast(&joined, Some(addr)).await;

        let outcome = self.read_loop().await;

        // Leave the registry before announcing, so the departed session is
        // never a broadcast target
        self.registry.remove(addr).await;
        let left = ServerMessage::user_left(
            self.display_id(),
            addr.to_string(),
            self.display_name.clone(),
            current_timestamp(),
        );
        self.registry.broadcast(&left, None).await;

        match outcome {
            Ok(()) => info!("Connection from {} closed", addr),
            Err(e) => error!("Connection from {} failed (code {}): {}", addr, e.code(), e),
        }
    }

    /// Read and dispatch frames until disconnect or a fatal error
    async fn read_loop(&mut self) -> Result<()> {
        loop {
            let payload = match frame::read_frame(&mut self.reader).await {
                Ok(payload) => payload,
                Err(ChatError::ShortRead(_)) => {
                    // Ordinary peer disconnect
                    debug!("Peer {} disconnected", self.session.addr());
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match codec::decode_client(&payload) {
                Ok(message) => self.handle_message(message).await?,
                Err(e) => {
                    // Well-framed but unclassifiable payloads are dropped,
                    // not fatal
                    warn!(
                        "Ignoring unrecognized message from {}: {}",
                        self.session.addr(),
                        e
                    );
                }
            }
        }
    }

    /// Dispatch one decoded client message
    async fn handle_message(&mut self, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::SetName { name } => self.handle_set_name(name).await,
            ClientMessage::Chat { text } => self.handle_chat(text).await,
        }
    }

    /// Apply a name registration request
    ///
    /// An invalid name leaves the session state untouched and answers with
    /// both a failed SetNameResult and an INVALID_NAME notice. A valid name
    /// replaces any previous one; the reply carries both.
    async fn handle_set_name(&mut self, name: String) -> Result<()> {
        if let Err(e) = validate_name(&name) {
            debug!(
                "Rejected display name {:?} from {}: {}",
                name,
                self.session.addr(),
                e
            );
            self.session
                .send(&ServerMessage::name_rejected(e.message()))
                .await?;
            self.session
                .send(&ServerMessage::invalid_name(e.message()))
                .await?;
            return Ok(());
        }

        let previous = self.display_name.replace(name.clone());
        info!(
            "{} registered display name '{}'",
            self.session.addr(),
            name
        );
        self.session
            .send(&ServerMessage::name_accepted(name, previous))
            .await
    }

    /// Relay a chat line to every other session
    async fn handle_chat(&mut self, text: String) -> Result<()> {
        if text.is_empty() {
            // Empty chat requests are dropped without a response
            return Ok(());
        }

        let message = ServerMessage::chat(
            self.display_id(),
            text,
            self.session.addr().to_string(),
            self.display_name.clone(),
            current_timestamp(),
        );
        self.registry
            .broadcast(&message, Some(self.session.addr()))
            .await;
        Ok(())
    }

    /// Effective identity: the display name when registered, else the
    /// address id
    fn display_id(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self.session.addr().to_string(),
        }
    }
}
