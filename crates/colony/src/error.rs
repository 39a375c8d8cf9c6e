//! Unified error type for the Colony server.

use colony_protocol::ProtocolError;
use colony_room::RoomError;
use colony_session::SessionError;
use colony_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Handlers return this so `?` works across layers; the connection loop
/// decides per variant whether to log, drop the message, or fail loudly.
#[derive(Debug, thiserror::Error)]
pub enum ColonyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (decode, unknown action, unknown case).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (missing session, id clash, account store).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (missing room, membership inconsistency).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ColonyError {
    /// Returns `true` for the "unimplemented sub-protocol variant" marker.
    pub fn is_unknown_case(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_unknown_case())
    }
}
