//! The room directory: every room, every session, one lock.
//!
//! The directory owns the room map, the [`SessionRegistry`], and the room
//! counter. The server keeps it behind a single mutex, so any method here
//! runs as one critical section. Broadcasts go out through
//! [`deliver`](RoomDirectory::deliver) while the lock is still held; since
//! delivery only queues text on each session's outbox, clients see
//! messages in exactly the order the state changes were committed.

use std::collections::BTreeMap;

use colony_protocol::{MemberEntry, Recipient, RoomId, RoomListEntry, ServerMessage, UserId};
use colony_session::{Session, SessionError, SessionRegistry};

use crate::{Room, RoomError, RoomSpec};

/// Name of the permanent lobby.
pub const LOBBY_NAME: &str = "MLX_6_Lobby";

/// Name of the permanent team channel.
pub const TEAM_CHANNEL_NAME: &str = "MLX_6_Team_Channel";

/// Result of moving a session between rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moved {
    /// The room the session left, if it was in one and actually moved.
    pub from: Option<RoomId>,
    pub to: RoomId,
}

/// All rooms and sessions on the server.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: BTreeMap<RoomId, Room>,
    sessions: SessionRegistry,
    room_counter: u32,
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomDirectory {
    /// Creates a directory holding the two permanent rooms.
    pub fn new() -> Self {
        let mut rooms = BTreeMap::new();
        rooms.insert(RoomId::LOBBY, Room::new(RoomId::LOBBY, LOBBY_NAME));
        rooms.insert(
            RoomId::TEAM_CHANNEL,
            Room::new(RoomId::TEAM_CHANNEL, TEAM_CHANNEL_NAME),
        );
        Self {
            rooms,
            sessions: SessionRegistry::new(),
            room_counter: RoomId::LOBBY.0,
        }
    }

    // -- Lookup -----------------------------------------------------------

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn require_room(&self, id: RoomId) -> Result<&Room, RoomError> {
        self.rooms.get(&id).ok_or(RoomError::NotFound(id))
    }

    pub fn require_room_mut(&mut self, id: RoomId) -> Result<&mut Room, RoomError> {
        self.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))
    }

    /// Rooms in id order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionRegistry {
        &mut self.sessions
    }

    pub fn session(&self, id: UserId) -> Result<&Session, SessionError> {
        self.sessions.require(id)
    }

    pub fn session_mut(&mut self, id: UserId) -> Result<&mut Session, SessionError> {
        self.sessions.require_mut(id)
    }

    // -- Membership -------------------------------------------------------

    /// Puts `user` into `dest`, leaving their current room if any.
    ///
    /// Moving to the room one is already in only re-asserts membership.
    /// The source room is checked for emptiness (and flagged) but not
    /// swept; call [`sweep`](Self::sweep) afterwards.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] if `dest` does not exist
    /// - [`RoomError::UserNotFoundInRoom`] if the session claims a room
    ///   it is not a member of
    pub fn move_member(&mut self, user: UserId, dest: RoomId) -> Result<Moved, RoomError> {
        if !self.rooms.contains_key(&dest) {
            return Err(RoomError::NotFound(dest));
        }
        let current = self.sessions.require(user)?.room;

        let from = match current {
            Some(src) if src == dest => None,
            Some(src) => {
                let source = self.require_room_mut(src)?;
                source.remove_member(user)?;
                source.is_empty();
                Some(src)
            }
            None => None,
        };

        self.require_room_mut(dest)?.add_member(user);
        self.sessions.require_mut(user)?.room = Some(dest);

        tracing::debug!(%user, ?from, to = %dest, "member moved");
        Ok(Moved { from, to: dest })
    }

    /// Takes `user` out of their current room. Returns the room they left.
    pub fn leave(&mut self, user: UserId) -> Result<Option<RoomId>, RoomError> {
        let Some(current) = self.sessions.require(user)?.room else {
            return Ok(None);
        };
        let room = self.require_room_mut(current)?;
        room.remove_member(user)?;
        room.is_empty();
        self.sessions.require_mut(user)?.room = None;
        Ok(Some(current))
    }

    /// Picks the next free transient room id.
    fn allocate_room_id(&mut self) -> RoomId {
        loop {
            self.room_counter = self.room_counter.wrapping_add(1).max(1);
            let id = RoomId(self.room_counter);
            if !id.is_permanent() && !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }

    /// Creates a room from a client request and returns its id.
    ///
    /// The room starts empty. Callers that want the creator inside should
    /// [`move_member`](Self::move_member) before releasing the lock, or the
    /// next sweep may delete it.
    pub fn create_room(&mut self, spec: RoomSpec) -> RoomId {
        let id = self.allocate_room_id();
        let room = Room::from_spec(id, spec);
        tracing::info!(room = %id, name = %room.name, game = room.game, "room created");
        self.rooms.insert(id, room);
        id
    }

    /// Removes every room flagged for removal and tells every connected
    /// session about each one. Returns the removed ids.
    pub fn sweep(&mut self) -> Vec<RoomId> {
        let removed: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|r| r.is_pending_removal() && r.user_count() == 0)
            .map(|r| r.id)
            .collect();

        for id in &removed {
            self.rooms.remove(id);
            tracing::info!(room = %id, "room removed");
        }
        for id in &removed {
            self.deliver(Recipient::Everyone, &ServerMessage::RoomDeleted { room: *id });
        }
        removed
    }

    // -- Views ------------------------------------------------------------

    /// Rows for `rmList`: rooms not empty-and-transient.
    pub fn room_list(&mut self) -> Vec<RoomListEntry> {
        self.rooms
            .values_mut()
            .filter_map(|r| (!r.is_empty()).then(|| r.list_entry()))
            .collect()
    }

    /// The roster of a room, in id order.
    pub fn member_entries(&self, room: RoomId) -> Vec<MemberEntry> {
        let Some(room) = self.rooms.get(&room) else {
            return Vec::new();
        };
        room.members()
            .filter_map(|id| self.sessions.get(id))
            .map(Session::member_entry)
            .collect()
    }

    // -- Delivery ---------------------------------------------------------

    /// Queues `msg` for every session `to` selects. Unknown recipients are
    /// skipped silently.
    pub fn deliver(&self, to: Recipient, msg: &ServerMessage) {
        match to {
            Recipient::User(id) => {
                if let Some(session) = self.sessions.get(id) {
                    session.send(msg);
                }
            }
            Recipient::Room(room) => self.deliver_to_room(room, None, msg),
            Recipient::RoomExcept(room, except) => self.deliver_to_room(room, Some(except), msg),
            Recipient::Everyone => {
                for session in self.sessions.iter() {
                    session.send(msg);
                }
            }
        }
    }

    fn deliver_to_room(&self, room: RoomId, except: Option<UserId>, msg: &ServerMessage) {
        let Some(room) = self.rooms.get(&room) else {
            return;
        };
        for member in room.members().filter(|m| Some(*m) != except) {
            if let Some(session) = self.sessions.get(member) {
                session.send(msg);
            }
        }
    }

    /// Tells the remaining members of `room` that `user` left.
    pub fn announce_departure(&self, room: RoomId, user: UserId) {
        let Some(count) = self.rooms.get(&room).map(Room::user_count) else {
            return;
        };
        self.deliver(Recipient::Room(room), &ServerMessage::UserGone { room, user });
        self.deliver(Recipient::Room(room), &ServerMessage::UserCount { room, count });
    }
}
