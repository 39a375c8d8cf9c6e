//! Joining rooms, room chat, room creation, and room/user variables.

use colony_protocol::{ProtocolError, Recipient, RoomId, ServerMessage, UserId};
use colony_room::{RoomDirectory, RoomSpec};
use colony_session::{AccountStore, PresenceSink, UserVariable};

use super::Request;
use crate::commands::{self, ChatCommand};
use crate::dispatch::Flow;
use crate::server::Settings;
use crate::ColonyError;

/// `joinRoom`: the first join always lands in the lobby.
pub(crate) async fn join_room<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let mut dir = req.state.directory.lock().await;
    let dest = if dir.session(req.user)?.room.is_none() {
        RoomId::LOBBY
    } else {
        req.envelope
            .body
            .require_child("room")?
            .require_attr("id")?
            .parse()?
    };
    enter_room(&mut dir, &req.state.settings, req.user, dest)?;
    Ok(Flow::Continue)
}

/// Moves `user` into `dest` and tells everyone involved.
///
/// The old room hears `userGone` and its new count, empty rooms are swept,
/// the joiner gets `joinOK` with the roster, and when the room is shared
/// both sides learn about each other. Landing in the lobby adds the
/// welcome banner.
fn enter_room(
    dir: &mut RoomDirectory,
    settings: &Settings,
    user: UserId,
    dest: RoomId,
) -> Result<(), ColonyError> {
    let moved = dir.move_member(user, dest)?;
    if let Some(from) = moved.from {
        dir.announce_departure(from, user);
    }
    dir.sweep();

    let room = dir.require_room(dest)?;
    let (name, game, count) = (room.name.clone(), room.game_vars(), room.user_count());
    let members = dir.member_entries(dest);
    let joiner = dir.session(user)?.member_entry();

    dir.deliver(
        Recipient::User(user),
        &ServerMessage::JoinOk {
            room: dest,
            user,
            game,
            members: members.clone(),
        },
    );
    if count > 1 {
        dir.deliver(Recipient::Room(dest), &ServerMessage::UserCount { room: dest, count });
        dir.deliver(
            Recipient::RoomExcept(dest, user),
            &ServerMessage::UserEnterRoom {
                room: dest,
                member: joiner,
            },
        );
        for member in members.into_iter().filter(|m| m.id != user) {
            dir.deliver(
                Recipient::User(user),
                &ServerMessage::UserEnterRoom { room: dest, member },
            );
        }
    }

    if dest == RoomId::LOBBY {
        let banner = format!(
            "{}!!&amp;&amp;!!<br><font size='20' color='#008000'>{}</font>",
            settings.welcome_sender, settings.welcome_message
        );
        dir.deliver(
            Recipient::User(user),
            &ServerMessage::PrivateMessage {
                room: Some(dest),
                user: None,
                text: banner,
            },
        );
    }

    tracing::info!(session = %user, room = %dest, %name, "joined room");
    Ok(())
}

/// `setUvars`: update the sender's stats and echo them to the room.
///
/// All variables are validated before any is applied.
pub(crate) async fn set_user_vars<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let vars = req.body_vars()?;

    let mut dir = req.state.directory.lock().await;
    let room = req.current_room(&dir)?;
    let session = dir.session_mut(req.user)?;
    let mut stats = session.stats.clone();
    for var in &vars {
        let variable: UserVariable = var.name.parse()?;
        stats.apply(variable, &var.value)?;
    }
    session.stats = stats;

    dir.deliver(
        Recipient::Room(room),
        &ServerMessage::UserVarsUpdate {
            room,
            user: req.user,
            vars,
        },
    );
    Ok(Flow::Continue)
}

/// `setRvars`: update the room's game-state fields and echo them.
///
/// Names the room does not track are echoed without being stored.
pub(crate) async fn set_room_vars<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let vars = req.body_vars()?;

    let mut dir = req.state.directory.lock().await;
    let room_id = req.current_room(&dir)?;
    let room = dir.require_room_mut(room_id)?;
    let mut updated = room.clone();
    for var in &vars {
        if !updated.apply_variable(&var.name, &var.value)? {
            tracing::debug!(room = %room_id, name = %var.name, "room variable not stored");
        }
    }
    *room = updated;

    dir.deliver(
        Recipient::Room(room_id),
        &ServerMessage::RoomVarsUpdate {
            room: room_id,
            vars,
        },
    );
    Ok(Flow::Continue)
}

/// `pubMsg`: run any chat command, then relay the text to the room.
///
/// A moderator's `/restart` or `/update` warns every session, waits, and
/// stops the server instead of relaying.
pub(crate) async fn publish_message<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let text = req.envelope.body.require_child("txt")?.text().to_string();
    let settings = &req.state.settings;

    let (moderator, name) = {
        let dir = req.state.directory.lock().await;
        let session = dir.session(req.user)?;
        (session.moderator, session.name.clone())
    };

    // Moderator-only commands from anyone else are plain chat.
    let command = match ChatCommand::detect(&text) {
        Some(command) if command.moderator_only() && !moderator => {
            tracing::warn!(session = %req.user, %name, command = command.keyword(), "moderator command from non-moderator");
            None
        }
        command => command,
    };

    if let Some(request) = command.and_then(ChatCommand::shutdown) {
        tracing::info!(session = %req.user, %name, ?request, "shutdown triggered");
        let warning = request.warning(settings.restart_delay);
        {
            let dir = req.state.directory.lock().await;
            for session in dir.sessions().iter() {
                session.send(&ServerMessage::AdminMessage {
                    room: session.room,
                    user: session.id,
                    text: warning.clone(),
                });
            }
        }
        tokio::time::sleep(settings.restart_delay).await;
        return Ok(Flow::Shutdown(request));
    }

    let dir = req.state.directory.lock().await;
    let room = req.current_room(&dir)?;
    if command == Some(ChatCommand::ShowRooms) {
        dir.deliver(
            Recipient::Room(room),
            &ServerMessage::PublicMessage {
                room,
                user: req.user,
                text: commands::room_listing(&dir),
            },
        );
    }
    dir.deliver(
        Recipient::Room(room),
        &ServerMessage::PublicMessage {
            room,
            user: req.user,
            text,
        },
    );
    Ok(Flow::Continue)
}

/// `createRoom`: make a room, announce it to the creator's room, and move
/// the creator in.
pub(crate) async fn create_room<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let el = req.envelope.body.require_child("room")?;
    let spec = RoomSpec {
        name: el.child("name").map(|n| n.text().to_string()).unwrap_or_default(),
        temporary: parse_flag("tmp", el.attr("tmp"))?,
        game: parse_flag("gam", el.attr("gam"))?,
        max_spectators: match el.attr("spec") {
            Some(raw) => raw.trim().parse().map_err(|_| ProtocolError::InvalidValue {
                field: "spec".to_string(),
                value: raw.to_string(),
            })?,
            None => 0,
        },
    };
    let exit: Option<RoomId> = el.attr("exit").and_then(|raw| raw.parse().ok());

    let mut dir = req.state.directory.lock().await;
    let origin = req.current_room(&dir)?;
    let id = dir.create_room(spec);
    let entry = dir.require_room(id)?.add_entry();
    dir.deliver(
        Recipient::Room(origin),
        &ServerMessage::RoomAdded {
            origin,
            room: entry,
        },
    );
    enter_room(&mut dir, &req.state.settings, req.user, id)?;

    if let Some(exit) = exit.filter(|exit| *exit != origin) {
        dir.deliver(
            Recipient::Room(exit),
            &ServerMessage::UserGone {
                room: exit,
                user: req.user,
            },
        );
    }
    Ok(Flow::Continue)
}

/// Reads a `0`/`1` attribute. Absent means `false`.
fn parse_flag(field: &str, raw: Option<&str>) -> Result<bool, ProtocolError> {
    match raw.map(str::trim) {
        None | Some("") | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(other) => Err(ProtocolError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}
