//! Socket seam between the buddy client and the matchmaking server.
//!
//! The client's reconnecting connection never talks to a concrete socket
//! type. It asks a [`Connector`] for a fresh [`Transport`] on every dial,
//! splits it, and pumps JSON frames through the two halves until the socket
//! ends. Tests plug in memory sockets here.

use std::future::Future;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The socket went away without a close handshake.
    #[error("connection closed")]
    ConnectionClosed,

    /// Nothing to write to: no socket is open for this connection.
    #[error("not connected")]
    NotConnected,

    #[error("invalid endpoint: {0}")]
    InvalidUrl(String),

    /// Dial, read or write failure reported by the socket library.
    #[error("{0}")]
    Io(String),
}

/// Incoming side of a matchmaking socket.
pub trait TransportReader: Send + 'static {
    /// Next server frame. `Ok(None)` means the server closed the socket on
    /// purpose, which the connection treats as final.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;
}

/// Outgoing side of a matchmaking socket.
pub trait TransportWriter: Send + 'static {
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// One open socket. Split once, right after the dial succeeds.
pub trait Transport: Send + 'static {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Opens sockets to the matchmaking endpoint.
///
/// `url` already carries the `chatId` query when a chat is being resumed.
/// Called for the first dial and again for every automatic retry.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}
