//! Server side of the chat relay
//!
//! The server is three pieces: the accept loop ([`chat_server`]), the
//! shared session registry with its broadcast engine ([`registry`]), and
//! the per-connection handler ([`session`]).

pub mod chat_server;
pub mod registry;
pub mod session;

pub use chat_server::{ChatServer, ServerConfig};
pub use registry::{Registry, Session};
pub use session::SessionHandler;
