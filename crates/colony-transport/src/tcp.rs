//! TCP transport with null-delimited framing.
//!
//! Each accepted [`TcpConnection`] is split into a [`FrameReader`] (owned by
//! the connection's handler loop) and a [`FrameWriter`] (owned by the task
//! that drains the connection's outbox). Reads and writes never contend.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::frame::{DELIMITER, FrameBuffer, decode_text, hex_dump};
use crate::{ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const READ_CHUNK: usize = 4096;

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");

        Ok(TcpConnection { id, stream, peer })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A freshly accepted TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpConnection {
    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Splits the connection into independently owned read and write halves.
    pub fn into_split(
        self,
    ) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        let (read, write) = self.stream.into_split();
        (
            FrameReader::new(self.id, read),
            FrameWriter::new(self.id, write),
        )
    }
}

/// Reads null-delimited text frames from a byte stream.
pub struct FrameReader<R> {
    id: ConnectionId,
    inner: R,
    buffer: FrameBuffer,
    pending: VecDeque<String>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wraps a readable stream.
    pub fn new(id: ConnectionId, inner: R) -> Self {
        Self {
            id,
            inner,
            buffer: FrameBuffer::new(),
            pending: VecDeque::new(),
        }
    }

    /// Returns the next decoded frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream. A stream that
    /// ends in the middle of a frame is a disconnect too; the partial bytes
    /// are dropped.
    pub async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }

            let n = self
                .inner
                .read(&mut chunk)
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::debug!(
                        conn = %self.id,
                        bytes = self.buffer.len(),
                        "stream ended mid-frame"
                    );
                }
                return Ok(None);
            }

            for raw in self.buffer.push(&chunk[..n])? {
                match decode_text(&raw) {
                    Some(text) if !text.is_empty() => self.pending.push_back(text),
                    Some(_) => {}
                    None => {
                        tracing::warn!(
                            target: "colony::undecodable",
                            conn = %self.id,
                            bytes = %hex_dump(&raw),
                            "frame could not be decoded"
                        );
                    }
                }
            }
        }
    }
}

/// Writes text frames, each followed by a single delimiter byte.
pub struct FrameWriter<W> {
    id: ConnectionId,
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wraps a writable stream.
    pub fn new(id: ConnectionId, inner: W) -> Self {
        Self { id, inner }
    }

    /// Writes `message` plus the trailing delimiter and flushes.
    pub async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        let mut data = Vec::with_capacity(message.len() + 1);
        data.extend_from_slice(message.as_bytes());
        data.push(DELIMITER);

        self.inner
            .write_all(&data)
            .await
            .map_err(TransportError::SendFailed)?;
        self.inner
            .flush()
            .await
            .map_err(TransportError::SendFailed)?;

        tracing::trace!(conn = %self.id, message, "sent");
        Ok(())
    }

    /// Shuts down the write side of the stream.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }
}
