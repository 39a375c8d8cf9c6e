//! The command table: action codes, their preconditions, and routing.
//!
//! Every envelope names an action. [`Action`] is the closed set the server
//! implements; [`dispatch`] checks the session's handshake state against
//! the action's precondition and hands the envelope to exactly one
//! handler.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use colony_protocol::{Envelope, ProtocolError, UserId};
use colony_session::{AccountStore, PresenceSink, SessionState};

use crate::handlers::{self, Request};
use crate::server::ServerState;
use crate::{ColonyError, ShutdownRequest};

/// The action codes clients may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    VersionCheck,
    Login,
    LoadBuddyList,
    AddBuddy,
    PrivateMessage,
    GetRoomList,
    JoinRoom,
    SetUserVars,
    PublishMessage,
    CreateRoom,
    SetRoomVars,
    DataObject,
    GameDataObject,
    Relay,
}

impl Action {
    pub fn code(self) -> &'static str {
        match self {
            Self::VersionCheck => "verChk",
            Self::Login => "login",
            Self::LoadBuddyList => "loadB",
            Self::AddBuddy => "addB",
            Self::PrivateMessage => "prvMsg",
            Self::GetRoomList => "getRmList",
            Self::JoinRoom => "joinRoom",
            Self::SetUserVars => "setUvars",
            Self::PublishMessage => "pubMsg",
            Self::CreateRoom => "createRoom",
            Self::SetRoomVars => "setRvars",
            Self::DataObject => "asObj",
            Self::GameDataObject => "asObjG",
            Self::Relay => "xtReq",
        }
    }

    /// Whether a session in `state` may send this action.
    pub fn permits(self, state: SessionState) -> bool {
        match self {
            Self::VersionCheck => state == SessionState::Connected,
            Self::Login => state < SessionState::LoggedIn,
            Self::LoadBuddyList
            | Self::AddBuddy
            | Self::PrivateMessage
            | Self::GetRoomList
            | Self::JoinRoom => state >= SessionState::LoggedIn,
            Self::SetUserVars
            | Self::PublishMessage
            | Self::CreateRoom
            | Self::SetRoomVars
            | Self::DataObject
            | Self::GameDataObject
            | Self::Relay => state == SessionState::InRoom,
        }
    }
}

impl FromStr for Action {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "verChk" => Self::VersionCheck,
            "login" => Self::Login,
            "loadB" => Self::LoadBuddyList,
            "addB" => Self::AddBuddy,
            "prvMsg" => Self::PrivateMessage,
            "getRmList" => Self::GetRoomList,
            "joinRoom" => Self::JoinRoom,
            "setUvars" => Self::SetUserVars,
            "pubMsg" => Self::PublishMessage,
            "createRoom" => Self::CreateRoom,
            "setRvars" => Self::SetRoomVars,
            "asObj" => Self::DataObject,
            "asObjG" => Self::GameDataObject,
            "xtReq" => Self::Relay,
            other => return Err(ProtocolError::UnknownAction(other.to_string())),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What the connection loop should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Stop reading after the delay and close the connection.
    CloseAfter(Duration),
    /// Ask the server to stop.
    Shutdown(ShutdownRequest),
}

/// Routes one envelope to its handler.
///
/// `user` is updated in place when login adopts a stored account id.
pub(crate) async fn dispatch<S, P>(
    state: &ServerState<S, P>,
    user: &mut UserId,
    envelope: &Envelope,
) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let action: Action = envelope.action.parse()?;

    let current = state.directory.lock().await.session(*user)?.state();
    if !action.permits(current) {
        return Err(ProtocolError::NotPermitted {
            action: action.code().to_string(),
            state: current.to_string(),
        }
        .into());
    }

    tracing::debug!(session = %user, %action, "dispatching");
    let req = Request {
        state,
        user: *user,
        envelope,
    };
    match action {
        Action::VersionCheck => handlers::version_check(&req).await,
        Action::Login => {
            let (id, flow) = handlers::login(&req).await?;
            *user = id;
            Ok(flow)
        }
        Action::LoadBuddyList => handlers::load_buddy_list(&req).await,
        Action::AddBuddy => handlers::add_buddy(&req).await,
        Action::PrivateMessage => handlers::private_message(&req).await,
        Action::GetRoomList => handlers::room_list(&req).await,
        Action::JoinRoom => handlers::join_room(&req).await,
        Action::SetUserVars => handlers::set_user_vars(&req).await,
        Action::PublishMessage => handlers::publish_message(&req).await,
        Action::CreateRoom => handlers::create_room(&req).await,
        Action::SetRoomVars => handlers::set_room_vars(&req).await,
        Action::DataObject => handlers::data_object(&req).await,
        Action::GameDataObject => handlers::game_data_object(&req).await,
        Action::Relay => handlers::relay(&req).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Action; 14] = [
        Action::VersionCheck,
        Action::Login,
        Action::LoadBuddyList,
        Action::AddBuddy,
        Action::PrivateMessage,
        Action::GetRoomList,
        Action::JoinRoom,
        Action::SetUserVars,
        Action::PublishMessage,
        Action::CreateRoom,
        Action::SetRoomVars,
        Action::DataObject,
        Action::GameDataObject,
        Action::Relay,
    ];

    #[test]
    fn test_codes_round_trip() {
        for action in ALL {
            assert_eq!(action.code().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_code_is_unknown_action() {
        assert!(matches!(
            "dance".parse::<Action>(),
            Err(ProtocolError::UnknownAction(code)) if code == "dance"
        ));
    }

    #[test]
    fn test_version_check_only_before_handshake() {
        assert!(Action::VersionCheck.permits(SessionState::Connected));
        assert!(!Action::VersionCheck.permits(SessionState::VersionChecked));
        assert!(!Action::VersionCheck.permits(SessionState::InRoom));
    }

    #[test]
    fn test_login_only_before_login() {
        assert!(Action::Login.permits(SessionState::Connected));
        assert!(Action::Login.permits(SessionState::VersionChecked));
        assert!(!Action::Login.permits(SessionState::LoggedIn));
    }

    #[test]
    fn test_lobby_actions_need_login() {
        for action in [Action::GetRoomList, Action::JoinRoom, Action::PrivateMessage] {
            assert!(!action.permits(SessionState::VersionChecked));
            assert!(action.permits(SessionState::LoggedIn));
            assert!(action.permits(SessionState::InRoom));
        }
    }

    #[test]
    fn test_room_actions_need_a_room() {
        for action in [Action::PublishMessage, Action::Relay, Action::GameDataObject] {
            assert!(!action.permits(SessionState::LoggedIn));
            assert!(action.permits(SessionState::InRoom));
        }
    }
}
