//! Identity types and delivery targets shared by every layer.

use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected user.
///
/// Newtype wrapper so a `RoomId` can never be passed where a `UserId` is
/// expected, even though both are plain integers on the wire.
///
/// `Display` renders the bare number because that is what the client
/// expects inside `id='...'` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| ProtocolError::invalid("user id", s))
    }
}

/// A unique identifier for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomId(pub u32);

impl RoomId {
    /// The permanent lobby every session lands in on its first join.
    pub const LOBBY: RoomId = RoomId(1);

    /// The permanent team channel.
    pub const TEAM_CHANNEL: RoomId = RoomId(42);

    /// Permanent rooms are never garbage-collected, even when empty.
    pub fn is_permanent(self) -> bool {
        self == Self::LOBBY || self == Self::TEAM_CHANNEL
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| ProtocolError::invalid("room id", s))
    }
}

/// Renders an optional room the way the wire expects: `-1` for "none".
pub(crate) struct WireRoom(pub Option<RoomId>);

impl fmt::Display for WireRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(room) => write!(f, "{room}"),
            None => f.write_str("-1"),
        }
    }
}

/// Renders an optional user the way the wire expects: `-1` for "nobody".
pub(crate) struct WireUser(pub Option<UserId>);

impl fmt::Display for WireUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(user) => write!(f, "{user}"),
            None => f.write_str("-1"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// One specific session.
    User(UserId),

    /// Every member of a room.
    Room(RoomId),

    /// Every member of a room except one (usually the sender).
    RoomExcept(RoomId, UserId),

    /// Every connected session, in a room or not.
    Everyone,
}
