//! The session registry: every live session, plus guest-id bookkeeping.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself. It lives inside the room
//! directory and is only touched while the directory lock is held, so that
//! id allocation, guest reservations, and room membership change together.

use std::collections::{HashMap, HashSet};

use colony_protocol::UserId;

use crate::{Session, SessionError};

/// Tracks all live sessions and the guest ids they hold.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<UserId, Session>,

    /// Ids currently lent out as `guest_<id>` names.
    guest_ids: HashSet<UserId>,

    /// Last id handed out. Ids only move forward.
    last_id: u32,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks a fresh session id.
    ///
    /// The id is unused by any live session, not reserved as a guest id,
    /// and absent from `persisted` (the ids of stored accounts), so a later
    /// login can never collide with it.
    pub fn allocate_id(&mut self, persisted: &HashSet<u32>) -> UserId {
        loop {
            self.last_id = self.last_id.wrapping_add(1).max(1);
            let id = UserId(self.last_id);
            if !persisted.contains(&id.0)
                && !self.sessions.contains_key(&id)
                && !self.is_guest_reserved(id)
            {
                return id;
            }
        }
    }

    /// Stores a session under its id, replacing nothing.
    ///
    /// # Errors
    /// [`SessionError::IdInUse`] if another session already has that id.
    pub fn insert(&mut self, session: Session) -> Result<(), SessionError> {
        if self.sessions.contains_key(&session.id) {
            return Err(SessionError::IdInUse(session.id));
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    /// Removes a session and releases any guest id it held.
    pub fn remove(&mut self, id: UserId) -> Option<Session> {
        self.guest_ids.remove(&id);
        self.sessions.remove(&id)
    }

    /// Moves a session to a new id (the persisted account id at login).
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if `from` is not live
    /// - [`SessionError::IdInUse`] if `to` is held by another live session
    pub fn rekey(&mut self, from: UserId, to: UserId) -> Result<(), SessionError> {
        if from == to {
            return Ok(());
        }
        if self.sessions.contains_key(&to) {
            return Err(SessionError::IdInUse(to));
        }
        let mut session = self
            .sessions
            .remove(&from)
            .ok_or(SessionError::NotFound(from))?;
        session.id = to;
        self.sessions.insert(to, session);
        tracing::debug!(%from, %to, "session re-keyed");
        Ok(())
    }

    /// Marks `id` as used by a guest name.
    pub fn reserve_guest(&mut self, id: UserId) {
        self.guest_ids.insert(id);
    }

    pub fn is_guest_reserved(&self, id: UserId) -> bool {
        self.guest_ids.contains(&id)
    }

    pub fn get(&self, id: UserId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: UserId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Like [`get`](Self::get) but fails with [`SessionError::NotFound`].
    pub fn require(&self, id: UserId) -> Result<&Session, SessionError> {
        self.get(id).ok_or(SessionError::NotFound(id))
    }

    pub fn require_mut(&mut self, id: UserId) -> Result<&mut Session, SessionError> {
        self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))
    }

    /// Finds a logged-in session by exact login name.
    pub fn find_by_name(&self, name: &str) -> Option<&Session> {
        self.sessions
            .values()
            .find(|s| s.is_logged_in() && s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
