//! The room entity.
//!
//! A room is plain data: who is in it, its listing attributes, and the
//! game-state fields clients synchronize through it. All mutation happens
//! through the [`RoomDirectory`](crate::RoomDirectory) under its lock.

use std::collections::BTreeSet;
use std::str::FromStr;

use colony_protocol::{
    GameRoomVars, ProtocolError, RoomAddEntry, RoomId, RoomListEntry, UserId,
};
use rand::Rng;

use crate::RoomError;

/// Number of team-display position slots every room carries.
pub const POSITION_SLOTS: usize = 4;

/// Default capacity of rooms that don't ask for one.
pub const DEFAULT_MAX_USERS: u32 = 100;

/// Capacity of rooms created by clients.
pub const CREATED_ROOM_MAX_USERS: u32 = 4;

/// What a client asks for when creating a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSpec {
    pub name: String,
    pub temporary: bool,
    pub game: bool,
    pub max_spectators: u32,
}

/// A lobby or match room.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub private: bool,
    pub temporary: bool,
    pub game: bool,
    pub max_users: u32,
    pub max_spectators: u32,

    /// `gs`, set by clients through `setRvars`.
    pub game_state: i64,

    /// `randomFactor`. Non-zero only for game rooms; assigned at creation.
    pub game_state_seed: i64,

    /// `roomLeader`.
    pub room_leader: i64,

    /// Team-display sync slots.
    pub position_slots: [Option<String>; POSITION_SLOTS],

    /// Which session occupies which slot, as last reported by `xtReq cmd=s`.
    /// Starts as one `"0"` per slot.
    pub position_assignment_ids: Vec<String>,

    members: BTreeSet<UserId>,
    pending_removal: bool,
}

impl Room {
    /// Creates an empty room with default attributes.
    pub fn new(id: RoomId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            private: false,
            temporary: false,
            game: false,
            max_users: DEFAULT_MAX_USERS,
            max_spectators: 0,
            game_state: 0,
            game_state_seed: 0,
            room_leader: 0,
            position_slots: Default::default(),
            position_assignment_ids: vec!["0".to_string(); POSITION_SLOTS],
            members: BTreeSet::new(),
            pending_removal: false,
        }
    }

    /// Creates a client-requested room. Game rooms get a random non-zero
    /// seed.
    pub fn from_spec(id: RoomId, spec: RoomSpec) -> Self {
        let game_state_seed = if spec.game {
            rand::rng().random_range(1..=i64::from(i32::MAX))
        } else {
            0
        };
        Self {
            temporary: spec.temporary,
            game: spec.game,
            max_users: CREATED_ROOM_MAX_USERS,
            max_spectators: spec.max_spectators,
            game_state_seed,
            ..Self::new(id, spec.name)
        }
    }

    /// Adds a member. Returns `false` if they were already in.
    pub(crate) fn add_member(&mut self, user: UserId) -> bool {
        self.pending_removal = false;
        self.members.insert(user)
    }

    /// Removes a member.
    ///
    /// # Errors
    /// [`RoomError::UserNotFoundInRoom`] if `user` is not a member.
    pub(crate) fn remove_member(&mut self, user: UserId) -> Result<(), RoomError> {
        if !self.members.remove(&user) {
            return Err(RoomError::UserNotFoundInRoom(user, self.id));
        }
        Ok(())
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    /// Members in id order.
    pub fn members(&self) -> impl Iterator<Item = UserId> + '_ {
        self.members.iter().copied()
    }

    pub fn user_count(&self) -> usize {
        self.members.len()
    }

    /// `true` for a non-permanent room without members.
    ///
    /// Flags the room for removal as a side effect; the next
    /// [`sweep`](crate::RoomDirectory::sweep) deletes it.
    pub fn is_empty(&mut self) -> bool {
        let empty = self.members.is_empty() && !self.id.is_permanent();
        if empty {
            self.pending_removal = true;
        }
        empty
    }

    pub fn is_pending_removal(&self) -> bool {
        self.pending_removal
    }

    /// The variables `joinOK` carries for game rooms.
    pub fn game_vars(&self) -> Option<GameRoomVars> {
        (self.game_state_seed != 0).then_some(GameRoomVars {
            game_state: self.game_state,
            random_factor: self.game_state_seed,
            room_leader: self.room_leader,
        })
    }

    /// Writes a team-display array into the position slots, index by index.
    ///
    /// Entries past the last slot are dropped; returns how many were.
    pub fn set_position_slots<I>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut dropped = 0;
        for (idx, value) in values.into_iter().enumerate() {
            match self.position_slots.get_mut(idx) {
                Some(slot) => *slot = Some(value),
                None => dropped += 1,
            }
        }
        dropped
    }

    /// Applies one `setRvars` variable.
    ///
    /// Returns `Ok(false)` for names the room doesn't track; they are
    /// echoed to clients but not stored.
    pub fn apply_variable(&mut self, name: &str, value: &str) -> Result<bool, ProtocolError> {
        let Ok(var) = name.parse::<RoomVariable>() else {
            return Ok(false);
        };
        let parsed: i64 = value.trim().parse().map_err(|_| ProtocolError::InvalidValue {
            field: name.to_string(),
            value: value.to_string(),
        })?;
        match var {
            RoomVariable::GameState => self.game_state = parsed,
            RoomVariable::RoomLeader => self.room_leader = parsed,
            RoomVariable::RandomFactor => self.game_state_seed = parsed,
        }
        Ok(true)
    }

    /// This room's row in `rmList`.
    pub fn list_entry(&self) -> RoomListEntry {
        RoomListEntry {
            id: self.id,
            name: self.name.clone(),
            private: self.private,
            temporary: self.temporary,
            game: self.game,
            user_count: self.user_count(),
            max_users: self.max_users,
            max_spectators: self.max_spectators,
        }
    }

    /// This room as announced by `roomAdd`.
    pub fn add_entry(&self) -> RoomAddEntry {
        RoomAddEntry {
            id: self.id,
            name: self.name.clone(),
            temporary: self.temporary,
            game: self.game,
            max_users: self.max_users,
            max_spectators: self.max_spectators,
        }
    }
}

/// The room fields `setRvars` can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoomVariable {
    GameState,
    RoomLeader,
    RandomFactor,
}

impl FromStr for RoomVariable {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gs" => Ok(Self::GameState),
            "roomLeader" => Ok(Self::RoomLeader),
            "randomFactor" => Ok(Self::RandomFactor),
            _ => Err(()),
        }
    }
}
