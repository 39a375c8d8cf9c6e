//! Rooms and the room directory for Colony.
//!
//! Rooms are plain data owned by a single [`RoomDirectory`], which also
//! owns the session registry. The server guards the directory with one
//! lock, so membership, counts, session fields, and the room counter
//! always change together.
//!
//! # Key types
//!
//! - [`Room`]: a lobby or match room and its synchronized game fields
//! - [`RoomDirectory`]: membership moves, room creation, sweeping, and
//!   broadcast delivery by [`Recipient`](colony_protocol::Recipient)
//! - [`RoomError`]: what can go wrong

mod directory;
mod error;
mod room;

pub use directory::{LOBBY_NAME, Moved, RoomDirectory, TEAM_CHANNEL_NAME};
pub use error::RoomError;
pub use room::{
    CREATED_ROOM_MAX_USERS, DEFAULT_MAX_USERS, POSITION_SLOTS, Room, RoomSpec,
};
