//! Transport layer for the Colony server.
//!
//! Clients speak a text protocol over plain TCP where every message is
//! terminated by a single `0x00` byte. This crate owns everything below
//! the message level:
//!
//! - [`Transport`] / [`TcpTransport`] for accepting connections
//! - [`FrameReader`] / [`FrameWriter`] for splitting and writing frames
//! - [`FrameBuffer`] and [`decode_text`] for the framing and decoding rules

#![allow(async_fn_in_trait)]

mod error;
mod frame;
mod tcp;

pub use error::TransportError;
pub use frame::{DEFAULT_MAX_FRAME_SIZE, DELIMITER, FrameBuffer, decode_text};
pub use tcp::{FrameReader, FrameWriter, TcpConnection, TcpTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Send + 'static;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}
