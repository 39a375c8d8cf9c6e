//! Outbound messages.
//!
//! Every reply or broadcast the server produces is one [`ServerMessage`]
//! variant. Rendering happens through `Display`, so a message becomes wire
//! text with `msg.to_string()` and the transport appends the terminator.
//!
//! The shapes follow what deployed clients expect byte-for-byte where it
//! matters: attribute names, the `r` room context, and CDATA around free
//! text. Absent rooms and users render as `-1`.

use std::fmt;

use crate::data_object::{DataObject, Var};
use crate::relay::RelayRecord;
use crate::types::{RoomId, UserId, WireRoom, WireUser};

/// One entry of a buddy list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyEntry {
    pub name: String,
    /// The buddy's session id when online.
    pub online: Option<UserId>,
}

/// One row of a room listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomListEntry {
    pub id: RoomId,
    pub name: String,
    pub private: bool,
    pub temporary: bool,
    pub game: bool,
    pub user_count: usize,
    pub max_users: u32,
    pub max_spectators: u32,
}

/// A room member as described in rosters and `uER` notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub id: UserId,
    pub name: String,
    pub moderator: bool,
    pub rank: i64,
    pub games_played: i64,
}

/// The game-state variables attached to `joinOK` for game rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRoomVars {
    pub game_state: i64,
    pub random_factor: i64,
    pub room_leader: i64,
}

/// A freshly created room as announced by `roomAdd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAddEntry {
    pub id: RoomId,
    pub name: String,
    pub temporary: bool,
    pub game: bool,
    pub max_users: u32,
    pub max_spectators: u32,
}

/// Everything the server sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Answer to the policy request. Not an envelope.
    Policy { port: u16 },

    /// `apiOK`: the client's version check passed.
    ApiOk,

    /// `logOK`: login accepted.
    LoginOk {
        name: String,
        user: UserId,
        moderator: bool,
    },

    /// `dmnMsg`: an administrative notice.
    AdminMessage {
        room: Option<RoomId>,
        user: UserId,
        text: String,
    },

    /// `bUpd`: a buddy came online or went offline.
    BuddyUpdate {
        online: bool,
        user: UserId,
        name: String,
    },

    /// `bList`: the caller's buddies.
    BuddyList(Vec<BuddyEntry>),

    /// `bAdd`: a buddy was added.
    BuddyAdded { name: String },

    /// `rmList`: non-empty rooms.
    RoomList(Vec<RoomListEntry>),

    /// `joinOK` with the room roster.
    JoinOk {
        room: RoomId,
        user: UserId,
        game: Option<GameRoomVars>,
        members: Vec<MemberEntry>,
    },

    /// `uCount`: a room's population changed.
    UserCount { room: RoomId, count: usize },

    /// `uER`: someone is in the room with you.
    UserEnterRoom { room: RoomId, member: MemberEntry },

    /// `userGone`: someone left the room.
    UserGone { room: RoomId, user: UserId },

    /// `roomDel`: a room was garbage-collected.
    RoomDeleted { room: RoomId },

    /// `roomAdd`: a room was created.
    RoomAdded { origin: RoomId, room: RoomAddEntry },

    /// `pubMsg`: room chat.
    PublicMessage {
        room: RoomId,
        user: UserId,
        text: String,
    },

    /// `prvMsg`: a direct message. `user` is `None` for server banners.
    PrivateMessage {
        room: Option<RoomId>,
        user: Option<UserId>,
        text: String,
    },

    /// `uVarsUpdate`: echo of a user-variable change.
    UserVarsUpdate {
        room: RoomId,
        user: UserId,
        vars: Vec<Var>,
    },

    /// `rVarsUpdate`: echo of a room-variable change.
    RoomVarsUpdate { room: RoomId, vars: Vec<Var> },

    /// `dataObj`: a nested data-object payload.
    DataObject {
        room: RoomId,
        user: UserId,
        payload: DataObject,
    },

    /// A relay record. Not an envelope.
    Relay(RelayRecord),
}

impl ServerMessage {
    /// The action code, or `None` for the two non-envelope messages.
    pub fn action(&self) -> Option<&'static str> {
        let action = match self {
            Self::Policy { .. } | Self::Relay(_) => return None,
            Self::ApiOk => "apiOK",
            Self::LoginOk { .. } => "logOK",
            Self::AdminMessage { .. } => "dmnMsg",
            Self::BuddyUpdate { .. } => "bUpd",
            Self::BuddyList(_) => "bList",
            Self::BuddyAdded { .. } => "bAdd",
            Self::RoomList(_) => "rmList",
            Self::JoinOk { .. } => "joinOK",
            Self::UserCount { .. } => "uCount",
            Self::UserEnterRoom { .. } => "uER",
            Self::UserGone { .. } => "userGone",
            Self::RoomDeleted { .. } => "roomDel",
            Self::RoomAdded { .. } => "roomAdd",
            Self::PublicMessage { .. } => "pubMsg",
            Self::PrivateMessage { .. } => "prvMsg",
            Self::UserVarsUpdate { .. } => "uVarsUpdate",
            Self::RoomVarsUpdate { .. } => "rVarsUpdate",
            Self::DataObject { .. } => "dataObj",
        };
        Some(action)
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

fn write_member_roster(f: &mut fmt::Formatter<'_>, m: &MemberEntry) -> fmt::Result {
    write!(
        f,
        "<u i='{}' m='{}'><n><![CDATA[{}]]></n><vars></vars></u>",
        m.id,
        flag(m.moderator),
        m.name
    )
}

fn write_vars(f: &mut fmt::Formatter<'_>, vars: &[Var]) -> fmt::Result {
    f.write_str("<vars>")?;
    for var in vars {
        f.write_str(&var.to_cdata_xml())?;
    }
    f.write_str("</vars>")
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy { port } => {
                return write!(
                    f,
                    "<cross-domain-policy><allow-access-from domain='*' to-ports='{port}' /></cross-domain-policy>"
                );
            }
            Self::Relay(record) => return write!(f, "{record}"),
            Self::RoomDeleted { room } => {
                return write!(
                    f,
                    "<msg t='sys'><body action='roomDel'><rm id='{room}'/></body></msg>"
                );
            }
            _ => {}
        }

        // Every other variant is a `<msg><body action r>` envelope.
        let action = self.action().unwrap_or_default();
        f.write_str("<msg t='sys'>")?;
        match self {
            Self::ApiOk => write!(f, "<body action='{action}' r='0'>")?,
            Self::LoginOk {
                name,
                user,
                moderator,
            } => write!(
                f,
                "<body action='{action}' r='0'><login n='{name}' id='{user}' mod='{}'/>",
                flag(*moderator)
            )?,
            Self::AdminMessage { room, user, text } => write!(
                f,
                "<body action='{action}' r='{}'><user id='{user}' /><txt><![CDATA[{text}]]></txt>",
                WireRoom(*room)
            )?,
            Self::BuddyUpdate { online, user, name } => write!(
                f,
                "<body action='{action}' r='-1'><b s='{}' i='{user}'><n><![CDATA[{name}]]></n></b>",
                flag(*online)
            )?,
            Self::BuddyList(buddies) => {
                write!(f, "<body action='{action}' r='-1'><bList>")?;
                for buddy in buddies {
                    write!(
                        f,
                        "<b s='{}' i='{}'><n><![CDATA[{}]]></n></b>",
                        flag(buddy.online.is_some()),
                        WireUser(buddy.online),
                        buddy.name
                    )?;
                }
                f.write_str("</bList>")?;
            }
            Self::BuddyAdded { name } => write!(
                f,
                "<body action='{action}' r='-1'><b s='1' i='0'><n><![CDATA[{name}]]></n></b>"
            )?,
            Self::RoomList(rooms) => {
                write!(f, "<body action='{action}' r='0'><rmList>")?;
                for rm in rooms {
                    write!(
                        f,
                        "<rm id='{}' priv='{}' temp='{}' game='{}' ucnt='{}' maxu='{}' maxs='{}'><n><![CDATA[{}]]></n></rm>",
                        rm.id,
                        flag(rm.private),
                        flag(rm.temporary),
                        flag(rm.game),
                        rm.user_count,
                        rm.max_users,
                        rm.max_spectators,
                        rm.name
                    )?;
                }
                f.write_str("</rmList>")?;
            }
            Self::JoinOk {
                room,
                user,
                game,
                members,
            } => {
                write!(f, "<body action='{action}' r='{room}'><pid id='{user}'/>")?;
                match game {
                    Some(g) => write!(
                        f,
                        "<vars><var n='gameStart' t='b'><![CDATA[0]]></var>\
                         <var n='gs' t='n'><![CDATA[{}]]></var>\
                         <var n='randomFactor' t='n'><![CDATA[{}]]></var>\
                         <var n='roomLeader' t='n'><![CDATA[{}]]></var></vars>",
                        g.game_state, g.random_factor, g.room_leader
                    )?,
                    None => f.write_str("<vars />")?,
                }
                write!(f, "<uLs r='{room}'>")?;
                for member in members {
                    write_member_roster(f, member)?;
                }
                f.write_str("</uLs>")?;
            }
            Self::UserCount { room, count } => {
                write!(f, "<body action='{action}' r='{room}' u='{count}'>")?
            }
            Self::UserEnterRoom { room, member } => write!(
                f,
                "<body action='{action}' r='{room}'><u i='{}' m='{}' s='0' p='2'><n><![CDATA[{}]]></n>\
                 <vars><var n='rank' t='n'><![CDATA[{}]]></var>\
                 <var n='gamesPlayed' t='n'><![CDATA[{}]]></var></vars></u>",
                member.id,
                flag(member.moderator),
                member.name,
                member.rank,
                member.games_played
            )?,
            Self::UserGone { room, user } => {
                write!(f, "<body action='{action}' r='{room}'><user id='{user}' />")?
            }
            Self::RoomAdded { origin, room } => write!(
                f,
                "<body action='{action}' r='{origin}'><rm id='{}' priv='0' temp='{}' game='{}' max='{}' spec='{}' limbo='0'>\
                 <name><![CDATA[{}]]></name><vars /></rm>",
                room.id,
                flag(room.temporary),
                flag(room.game),
                room.max_users,
                room.max_spectators,
                room.name
            )?,
            Self::PublicMessage { room, user, text } => write!(
                f,
                "<body action='{action}' r='{room}'><user id='{user}' /><txt><![CDATA[{text}]]></txt>"
            )?,
            Self::PrivateMessage { room, user, text } => write!(
                f,
                "<body action='{action}' r='{}'><user id='{}' /><txt><![CDATA[{text}]]></txt>",
                WireRoom(*room),
                WireUser(*user)
            )?,
            Self::UserVarsUpdate { room, user, vars } => {
                write!(f, "<body action='{action}' r='{room}'><user id='{user}' />")?;
                write_vars(f, vars)?;
            }
            Self::RoomVarsUpdate { room, vars } => {
                write!(f, "<body action='{action}' r='{room}'>")?;
                write_vars(f, vars)?;
            }
            Self::DataObject {
                room,
                user,
                payload,
            } => write!(
                f,
                "<body action='{action}' r='{room}'><user id='{user}' /><dataObj><![CDATA[{payload}]]></dataObj>"
            )?,
            Self::Policy { .. } | Self::Relay(_) | Self::RoomDeleted { .. } => {}
        }
        f.write_str("</body></msg>")
    }
}
