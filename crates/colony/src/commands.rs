//! Chat commands and the shutdown contract with the supervisor.
//!
//! Players type `/showrooms` into room chat; moderators can also type
//! `/restart` and `/update`. The last two end the server: the handler
//! returns a [`ShutdownRequest`] and only `main` turns it into an exit code.

use std::fmt::Write as _;
use std::time::Duration;

use colony_room::RoomDirectory;

/// Exit code for "the server crashed".
pub const CRASH_EXIT_CODE: i32 = 3;

/// A command recognized inside a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    Restart,
    Update,
    ShowRooms,
}

impl ChatCommand {
    const ALL: [Self; 3] = [Self::Restart, Self::Update, Self::ShowRooms];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Restart => "/restart",
            Self::Update => "/update",
            Self::ShowRooms => "/showrooms",
        }
    }

    /// Finds the first command mentioned anywhere in `text`.
    pub fn detect(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| text.contains(cmd.keyword()))
    }

    pub fn moderator_only(self) -> bool {
        !matches!(self, Self::ShowRooms)
    }

    /// The shutdown this command asks for, if any.
    pub fn shutdown(self) -> Option<ShutdownRequest> {
        match self {
            Self::Restart => Some(ShutdownRequest::Restart),
            Self::Update => Some(ShutdownRequest::Update),
            Self::ShowRooms => None,
        }
    }
}

/// Why the server stopped on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    Restart,
    Update,
}

impl ShutdownRequest {
    /// The process exit code the supervisor understands.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Restart => 42,
            Self::Update => 43,
        }
    }

    /// The notice every session receives before the server goes down.
    pub fn warning(self, delay: Duration) -> String {
        let secs = delay.as_secs();
        match self {
            Self::Restart => format!("Server is about to restart in {secs}s."),
            Self::Update => format!("Server is about to restart for an update in {secs}s."),
        }
    }
}

/// One line per room: `name (id): [('alice', 3), ('bob', 4)]`.
pub fn room_listing(directory: &RoomDirectory) -> String {
    let mut out = String::new();
    for room in directory.rooms() {
        let members = directory
            .member_entries(room.id)
            .iter()
            .map(|m| format!("('{}', {})", m.name, m.id))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "{} ({}): [{members}]", room.name, room.id);
    }
    out
}
