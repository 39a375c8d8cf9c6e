//! Error types for the room layer.

use colony_protocol::{RoomId, UserId};
use colony_session::SessionError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The user is not a member of the room it was expected in. Membership
    /// and the session's `room` field have drifted apart.
    #[error("user {0} not found in room {1}")]
    UserNotFoundInRoom(UserId, RoomId),

    /// The session the operation refers to is gone.
    #[error(transparent)]
    Session(#[from] SessionError),
}
