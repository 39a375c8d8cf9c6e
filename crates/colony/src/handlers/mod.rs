//! One handler per action code.
//!
//! - [`lobby`]: handshake, login, buddies, private messages, room list
//! - [`room`]: joining, chat, room creation, user and room variables
//! - [`game`]: in-match data objects and relay orders
//!
//! Handlers take the directory lock once per critical section and queue
//! every resulting broadcast before releasing it.

mod game;
mod lobby;
mod room;

pub(crate) use game::{data_object, game_data_object, relay};
pub(crate) use lobby::{add_buddy, load_buddy_list, login, private_message, room_list, version_check};
pub(crate) use room::{create_room, join_room, publish_message, set_room_vars, set_user_vars};

use colony_protocol::{Envelope, ProtocolError, RoomId, UserId, Var};
use colony_room::RoomDirectory;
use colony_session::{AccountStore, PresenceSink};

use crate::server::ServerState;
use crate::ColonyError;

/// One inbound request: who sent which envelope to which server.
pub(crate) struct Request<'a, S: AccountStore, P: PresenceSink> {
    pub(crate) state: &'a ServerState<S, P>,
    pub(crate) user: UserId,
    pub(crate) envelope: &'a Envelope,
}

impl<S: AccountStore, P: PresenceSink> Request<'_, S, P> {
    /// The room the sender is in.
    ///
    /// Room-scoped handlers act on this rather than on the envelope's
    /// `r` attribute.
    fn current_room(&self, dir: &RoomDirectory) -> Result<RoomId, ColonyError> {
        let session = dir.session(self.user)?;
        session.room.ok_or_else(|| {
            ProtocolError::NotPermitted {
                action: self.envelope.action.clone(),
                state: session.state().to_string(),
            }
            .into()
        })
    }

    /// The `<var>` children of the body's `<vars>` element.
    fn body_vars(&self) -> Result<Vec<Var>, ProtocolError> {
        self.envelope
            .body
            .require_child("vars")?
            .children_named("var")
            .map(Var::from_element)
            .collect()
    }
}

/// In-process server state for handler tests: no listener, no sockets.
#[cfg(test)]
pub(crate) mod fixture {
    use std::time::Duration;

    use colony_protocol::{Envelope, RoomId, UserId};
    use colony_room::RoomDirectory;
    use colony_session::{MemoryAccountStore, ModeratorList, Session, SilentPresence};
    use tokio::sync::{Mutex, mpsc};

    use crate::config::UnknownCasePolicy;
    use crate::server::{ServerState, Settings};

    pub(crate) type TestState = ServerState<MemoryAccountStore, SilentPresence>;

    pub(crate) fn state() -> TestState {
        let (shutdown, _) = mpsc::unbounded_channel();
        ServerState {
            directory: Mutex::new(RoomDirectory::new()),
            store: MemoryAccountStore::new(),
            presence: SilentPresence,
            moderators: ModeratorList::default(),
            settings: Settings {
                game_version: 0,
                welcome_message: "hi".into(),
                welcome_sender: "ColonyBot".into(),
                restart_delay: Duration::ZERO,
                version_grace: Duration::ZERO,
                unknown_case: UnknownCasePolicy::Log,
                port: 9339,
            },
            shutdown,
        }
    }

    /// Registers a logged-in session and puts it in the lobby.
    pub(crate) async fn in_lobby(
        state: &TestState,
        id: u32,
        name: &str,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = Session::new(UserId(id), "127.0.0.1:5000".parse().unwrap(), tx);
        session.name = name.into();
        session.protocol_version = Some(0);

        let mut dir = state.directory.lock().await;
        dir.sessions_mut().insert(session).unwrap();
        dir.move_member(UserId(id), RoomId::LOBBY).unwrap();
        rx
    }

    pub(crate) fn envelope(frame: &str) -> Envelope {
        Envelope::decode(frame).unwrap()
    }
}
