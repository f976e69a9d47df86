//! Chat relay client
//!
//! The client keeps its send and receive paths independent: sends happen on
//! the caller's task through [`ChatClient`], while a spawned receive task
//! turns incoming frames into [`ClientEvent`]s. The receive task owns the
//! connected flag, so a dead connection makes sends fail fast instead of
//! writing into a closed socket.
//!
//! `connect` does not return until the receive task has signalled that it is
//! live, so a response to the very first send cannot be lost.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::{ChatError, Result};
use crate::protocol::codec;
use crate::protocol::frame;
use crate::protocol::messages::{ClientMessage, ServerMessage};

/// Chat client configuration
#[derive(Clone, Debug)]
pub struct ChatClientConfig {
    /// Server address to connect to
    pub server_addr: SocketAddr,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".parse().unwrap(),
            connect_timeout_secs: 10,
        }
    }
}

/// Events surfaced by the receive path
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Successfully connected to the server
    Connected,
    /// Received a server message
    Message(ServerMessage),
    /// A well-framed payload that could not be decoded
    Error(ChatError),
    /// Connection ended, with the reason
    Disconnected(String),
}

/// TCP chat relay client
pub struct ChatClient {
    config: ChatClientConfig,
    /// Write half, owned by the send path
    writer: Option<OwnedWriteHalf>,
    /// Cleared by the receive task when the connection dies
    connected: Arc<AtomicBool>,
}

impl ChatClient {
    /// Create a new chat client with the given configuration
    pub fn new(config: ChatClientConfig) -> Self {
        Self {
            config,
            writer: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect to the chat server
    ///
    /// Returns the event stream fed by the receive task. The first event is
    /// always [`ClientEvent::Connected`].
    pub async fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<ClientEvent>> {
        info!("Connecting to chat relay at {}", self.config.server_addr);

        let stream = tokio::time::timeout(
            Duration::from_secs(self.config.connect_timeout_secs),
            TcpStream::connect(self.config.server_addr),
        )
        .await
        .map_err(|_| {
            ChatError::connection(format!("Connection to {} timed out", self.config.server_addr))
        })?
        .map_err(|e| {
            ChatError::connection(format!(
                "Failed to connect to {}: {}",
                self.config.server_addr, e
            ))
        })?;

        let (reader, writer) = stream.into_split();
        let connected = Arc::new(AtomicBool::new(true));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        // Queue the connected event before the receive task can race it
        let _ = event_tx.send(ClientEvent::Connected);

        tokio::spawn(receive_loop(
            reader,
            event_tx,
            Arc::clone(&connected),
            ready_tx,
        ));

        // Do not let sends start until the receive task is live
        ready_rx.await.map_err(|_| {
            ChatError::internal("receive task exited before signalling ready".to_string())
        })?;

        self.writer = Some(writer);
        self.connected = connected;

        info!("Connected to {}", self.config.server_addr);
        Ok(event_rx)
    }

    /// Request a display name
    pub async fn set_name(&mut self, name: &str) -> Result<()> {
        self.send(&ClientMessage::SetName {
            name: name.to_string(),
        })
        .await
    }

    /// Send a chat line
    pub async fn send_chat(&mut self, text: &str) -> Result<()> {
        self.send(&ClientMessage::Chat {
            text: text.to_string(),
        })
        .await
    }

    /// Close the connection from the sending side
    ///
    /// The receive task notices the resulting end-of-stream and emits the
    /// final [`ClientEvent::Disconnected`].
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
            info!("Disconnected from chat relay");
        }
        Ok(())
    }

    /// Check if the connection is still usable for sending
    pub fn is_connected(&self) -> bool {
        self.writer.is_some() && self.connected.load(Ordering::SeqCst)
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChatError::connection("Not connected to server"));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ChatError::connection("Not connected to server"))?;
        codec::write_message(writer, message).await
    }
}

/// Receive path: frames in, events out, connected flag down on exit
async fn receive_loop(
    mut reader: OwnedReadHalf,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
    connected: Arc<AtomicBool>,
    ready_tx: oneshot::Sender<()>,
) {
    // Unblock the send path before the first read
    let _ = ready_tx.send(());

    let reason = loop {
        match frame::read_frame(&mut reader).await {
            Ok(payload) => match codec::decode_server(&payload) {
                Ok(message) => {
                    let _ = event_tx.send(ClientEvent::Message(message));
                }
                Err(e) => {
                    error!("Failed to decode server message: {}", e);
                    let _ = event_tx.send(ClientEvent::Error(e));
                }
            },
            Err(ChatError::ShortRead(_)) => break "server closed the connection".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    connected.store(false, Ordering::SeqCst);
    debug!("Receive loop ended: {}", reason);
    let _ = event_tx.send(ClientEvent::Disconnected(reason));
}
