//! TCP chat relay server
//!
//! Accepts connections and spawns one session task per client. Tasks are
//! held in a [`JoinSet`] so shutdown closes the listener first and then
//! drains every session instead of abandoning them.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::{ChatError, Result};
use crate::server::registry::Registry;
use crate::server::session::SessionHandler;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            max_connections: 1000,
        }
    }
}

/// TCP chat relay server
pub struct ChatServer {
    /// Server configuration
    config: ServerConfig,
    /// Bound listener, set by `bind`
    listener: Option<TcpListener>,
    /// Session registry shared with every connection task
    registry: Arc<Registry>,
}

impl ChatServer {
    /// Create a new server
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            listener: None,
            registry: Arc::new(Registry::new()),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Get the session registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Bind the listening socket without accepting yet
    pub async fn bind(&mut self) -> Result<()> {
        info!("Starting chat relay on {}", self.config.bind_addr);

        let listener = TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            ChatError::network(format!("Failed to bind {}: {}", self.config.bind_addr, e))
        })?;

        info!("Server listening on {}", listener.local_addr()?);
        self.listener = Some(listener);
        Ok(())
    }

    /// Actual bound address
    ///
    /// Useful when the configured port is 0 and the OS picked one.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &self.listener {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(ChatError::config("server is not bound".to_string())),
        }
    }

    /// Serve until the shutdown future resolves
    ///
    /// Binds first if `bind` was never called. On shutdown the listener is
    /// dropped before the remaining session tasks are joined, so no new
    /// connection slips in while the server drains.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| ChatError::internal("listener missing after bind".to_string()))?;

        let mut sessions: JoinSet<()> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, closing listener");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            // Registration happens inside the session task,
                            // so this count can lag a burst of accepts
                            if self.registry.len().await >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            let handler =
                                SessionHandler::new(stream, addr, Arc::clone(&self.registry));
                            sessions.spawn(handler.run());
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        error!("Session task failed: {}", e);
                    }
                }
            }
        }

        // Stop accepting, then take down and join every live session
        drop(listener);
        sessions.shutdown().await;

        // Aborted session tasks never run their own removal, so stale
        // entries would otherwise survive into a later run
        self.registry.clear().await;

        info!("Server shutdown complete");
        Ok(())
    }

    /// Serve until interrupted
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }
}
