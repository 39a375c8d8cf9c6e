//! Session types: the server's record of one connected user.
//!
//! A session tracks:
//! - WHO the user is (`id`, `name`, moderator flag)
//! - WHERE they are (`room`, `None` before the first join)
//! - WHAT the client reported about itself (protocol version, stats)
//! - HOW to reach them (an outbox drained by the connection's writer task)

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use colony_protocol::{MemberEntry, ProtocolError, RoomId, ServerMessage, UserId};
use tokio::sync::mpsc;

/// The sending half of a connection's outbound queue.
///
/// Every message for a session goes through here, so the order in which
/// messages are queued (always under the directory lock) is the order in
/// which the client receives them.
pub type Outbox = mpsc::UnboundedSender<String>;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in the protocol handshake.
///
/// ```text
///   Connected ──(verChk)──→ VersionChecked ──(login)──→ LoggedIn ──(joinRoom)──→ InRoom
/// ```
///
/// The state is derived from the session's fields rather than stored, so it
/// can never disagree with them. Ordering follows the handshake, which lets
/// the dispatcher express "at least logged in" as `state >= LoggedIn`.
/// Disconnection is terminal and has no variant: the session is simply
/// removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Connected,
    VersionChecked,
    LoggedIn,
    InRoom,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "CONNECTED",
            Self::VersionChecked => "VERSION_CHECKED",
            Self::LoggedIn => "LOGGED_IN",
            Self::InRoom => "IN_ROOM",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// User variables
// ---------------------------------------------------------------------------

/// Display stats mirrored from the account store and updated by clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStats {
    /// The name the client asked to be shown as. The login name stays
    /// authoritative for lookups.
    pub display_name: Option<String>,
    pub race: i64,
    pub team: i64,
    pub color: i64,
    pub points: i64,
    pub consecutive_wins: i64,
    pub games_won: i64,
    pub games_played: i64,
    pub rank: i64,
}

impl Default for UserStats {
    /// Guests and fresh sessions start at rank 1.
    fn default() -> Self {
        Self {
            display_name: None,
            race: 0,
            team: 0,
            color: 0,
            points: 0,
            consecutive_wins: 0,
            games_won: 0,
            games_played: 0,
            rank: 1,
        }
    }
}

/// The fixed set of variables a client may set on itself with `setUvars`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVariable {
    UserName,
    Race,
    Team,
    Color,
    Points,
    ConsecutiveWins,
    GamesWon,
    GamesPlayed,
    Rank,
}

impl FromStr for UserVariable {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "userName" => Self::UserName,
            "race" => Self::Race,
            "team" => Self::Team,
            "color" => Self::Color,
            "pts" => Self::Points,
            "gamesConsecutiveWins" => Self::ConsecutiveWins,
            "gamesWon" => Self::GamesWon,
            "gamesPlayed" => Self::GamesPlayed,
            "rank" => Self::Rank,
            other => return Err(ProtocolError::UnknownVariable(other.to_string())),
        })
    }
}

impl UserVariable {
    /// The name clients use on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::UserName => "userName",
            Self::Race => "race",
            Self::Team => "team",
            Self::Color => "color",
            Self::Points => "pts",
            Self::ConsecutiveWins => "gamesConsecutiveWins",
            Self::GamesWon => "gamesWon",
            Self::GamesPlayed => "gamesPlayed",
            Self::Rank => "rank",
        }
    }
}

impl UserStats {
    /// Sets one variable from its wire text.
    ///
    /// # Errors
    /// Numeric variables must parse as integers; anything else is
    /// [`ProtocolError::InvalidValue`] and leaves the stats unchanged.
    pub fn apply(&mut self, var: UserVariable, value: &str) -> Result<(), ProtocolError> {
        let field = match var {
            UserVariable::UserName => {
                self.display_name = Some(value.to_string());
                return Ok(());
            }
            UserVariable::Race => &mut self.race,
            UserVariable::Team => &mut self.team,
            UserVariable::Color => &mut self.color,
            UserVariable::Points => &mut self.points,
            UserVariable::ConsecutiveWins => &mut self.consecutive_wins,
            UserVariable::GamesWon => &mut self.games_won,
            UserVariable::GamesPlayed => &mut self.games_played,
            UserVariable::Rank => &mut self.rank,
        };
        *field = value
            .trim()
            .parse()
            .map_err(|_| ProtocolError::InvalidValue {
                field: var.wire_name().to_string(),
                value: value.to_string(),
            })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single user's session on the server.
///
/// Created when a connection is accepted. Lives in the
/// [`SessionRegistry`](crate::SessionRegistry) until the connection closes;
/// rooms refer to it by id only.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: UserId,

    /// Empty until login.
    pub name: String,

    pub moderator: bool,

    /// `true` when the name was synthesized as `guest_<id>`.
    pub guest: bool,

    /// The room this session is a member of, if any.
    pub room: Option<RoomId>,

    /// Reported by `verChk`; set once per connection.
    pub protocol_version: Option<i64>,

    pub stats: UserStats,

    pub address: SocketAddr,

    outbox: Outbox,
}

impl Session {
    pub fn new(id: UserId, address: SocketAddr, outbox: Outbox) -> Self {
        Self {
            id,
            name: String::new(),
            moderator: false,
            guest: false,
            room: None,
            protocol_version: None,
            stats: UserStats::default(),
            address,
            outbox,
        }
    }

    /// The session's position in the handshake.
    pub fn state(&self) -> SessionState {
        if self.room.is_some() {
            SessionState::InRoom
        } else if self.is_logged_in() {
            SessionState::LoggedIn
        } else if self.protocol_version.is_some() {
            SessionState::VersionChecked
        } else {
            SessionState::Connected
        }
    }

    pub fn is_logged_in(&self) -> bool {
        !self.name.is_empty()
    }

    /// Queues a message for this session.
    ///
    /// Fire-and-forget: if the connection's writer is gone the session is
    /// on its way out and its cleanup will run shortly.
    pub fn send(&self, msg: &ServerMessage) {
        let _ = self.outbox.send(msg.to_string());
    }

    /// How this session appears in room rosters.
    pub fn member_entry(&self) -> MemberEntry {
        MemberEntry {
            id: self.id,
            name: self.name.clone(),
            moderator: self.moderator,
            rank: self.stats.rank,
            games_played: self.stats.games_played,
        }
    }
}
