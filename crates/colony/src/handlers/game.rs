//! In-match traffic: data objects (`asObj`, `asObjG`) and relay orders
//! (`xtReq`).
//!
//! Payloads arrive as a data object in the envelope body. Its root `var`s
//! carry the `id` discriminator and, for game messages, the acting player
//! in `_$$_`; the first `obj` carries the arguments.

use std::collections::HashMap;

use colony_protocol::{
    DataObject, Obj, ObjKind, ProtocolError, Recipient, RoomId, ServerMessage, UserId, Var,
    VarType, XtCommand,
};
use colony_room::RoomDirectory;
use colony_session::{AccountStore, PresenceSink};

use super::Request;
use crate::dispatch::Flow;
use crate::ColonyError;

/// Root variable naming the player a game message is about.
const ACTOR_VAR: &str = "_$$_";

fn payload<S: AccountStore, P: PresenceSink>(
    req: &Request<'_, S, P>,
) -> Result<DataObject, ProtocolError> {
    DataObject::parse(req.envelope.body.text())
}

/// The `_$$_` player, or `fallback` when the payload names nobody.
fn actor(vars: &HashMap<String, String>, fallback: UserId) -> Result<UserId, ProtocolError> {
    match vars.get(ACTOR_VAR).map(|v| v.trim()) {
        None | Some("") => Ok(fallback),
        Some(raw) => raw.parse(),
    }
}

fn id_var(id: &str) -> Var {
    Var::new("id", VarType::String, id)
}

/// `asObj`: lobby-side data objects.
pub(crate) async fn data_object<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let payload = payload(req)?;
    let vars = payload.room_vars();
    let id = vars.get("id").map(String::as_str).unwrap_or_default();

    let mut dir = req.state.directory.lock().await;
    let room = req.current_room(&dir)?;
    match id {
        "updateIncome" => {
            let args = payload.require_first_obj()?;
            let out = DataObject::new().with_var(id_var(id)).with_obj(
                Obj::new(ObjKind::Object, "sub")
                    .with_var(Var::new("pos", VarType::Number, args.require_var("pos")?))
                    .with_var(Var::new("race", VarType::Number, args.require_var("race")?)),
            );
            dir.deliver(
                Recipient::RoomExcept(room, req.user),
                &ServerMessage::DataObject {
                    room,
                    user: req.user,
                    payload: out,
                },
            );
        }
        "sendChat" => send_chat(&dir, room, req.user, id, &payload, None)?,
        "updateTeamDisplay" => {
            let slots = payload
                .array("arrayId")
                .or_else(|| payload.array("array"))
                .ok_or_else(|| ProtocolError::MissingElement("obj array".into()))?;
            store_slots(&mut dir, room, slots)?;
        }
        other => tracing::warn!(session = %req.user, id = other, "unhandled asObj payload"),
    }
    Ok(Flow::Continue)
}

/// `asObjG`: in-game data objects. Unrecognized ids are an unknown case.
pub(crate) async fn game_data_object<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let payload = payload(req)?;
    let vars = payload.room_vars();
    let id = vars.get("id").map(String::as_str).unwrap_or_default();

    let mut dir = req.state.directory.lock().await;
    let room = req.current_room(&dir)?;
    match id {
        "updateTeamDisplay" => {
            let slots = payload
                .array("array")
                .ok_or_else(|| ProtocolError::MissingElement("obj array".into()))?;
            let out = DataObject::new().with_var(id_var(id)).with_obj(
                Obj::new(ObjKind::Object, "sub").with_obj(Obj::indexed_array("array", slots.iter().cloned())),
            );
            store_slots(&mut dir, room, slots)?;
            broadcast(&dir, room, actor(&vars, req.user)?, out);
        }
        "beginGame" => {
            let seed_name = payload
                .require_first_obj()?
                .first_var()
                .map(|v| v.value.clone())
                .unwrap_or_default();
            let mut sub = Obj::new(ObjKind::Object, "sub")
                .with_var(Var::new("randName", VarType::String, seed_name));
            for (orientation, items) in payload.array_objects() {
                sub = sub.with_obj(Obj::indexed_array(&orientation, items));
            }
            let out = DataObject::new().with_var(id_var(id)).with_obj(sub);
            broadcast(&dir, room, actor(&vars, req.user)?, out);

            let players: Vec<String> = dir
                .member_entries(room)
                .into_iter()
                .map(|m| format!("{}({})", m.name, m.id))
                .collect();
            tracing::info!(%room, ?players, "game started");
        }
        "killUnit" => {
            let args = payload.require_first_obj()?;
            let unit = args
                .vars()
                .cloned()
                .fold(Obj::new(ObjKind::Array, "sub"), Obj::with_var);
            let out = DataObject::new().with_var(id_var(id)).with_obj(unit);
            broadcast(&dir, room, actor(&vars, req.user)?, out);
        }
        "orderUnit" => {
            let args = payload.require_first_obj()?;
            let unit = args
                .first_var()
                .ok_or_else(|| ProtocolError::MissingElement("var".into()))?;
            let order = args
                .first_obj()
                .map(|o| o.vars().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
                .into_iter()
                .fold(Obj::new(ObjKind::Array, "orderArray"), Obj::with_var);
            let out = DataObject::new().with_var(id_var(id)).with_obj(
                Obj::new(ObjKind::Array, "sub")
                    .with_var(Var::new("id", VarType::Number, unit.value.clone()))
                    .with_obj(order),
            );
            broadcast(&dir, room, actor(&vars, req.user)?, out);
        }
        "sendChat" => {
            let ally = actor(&vars, req.user)?;
            send_chat(&dir, room, req.user, id, &payload, Some(ally))?;
        }
        "sendTeamChat" => {
            tracing::warn!(session = %req.user, %room, "sendTeamChat is not relayed");
        }
        "getKicked" => {
            let target = match vars.get(ACTOR_VAR).map(|v| v.trim()) {
                None | Some("") => return Ok(Flow::Continue),
                Some(raw) => raw.parse::<UserId>()?,
            };
            kick(&dir, room, target);
        }
        other => return Err(ProtocolError::UnknownCase(format!("asObjG id {other}")).into()),
    }
    Ok(Flow::Continue)
}

/// `xtReq`: slot assignment or a relay order.
pub(crate) async fn relay<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let payload = payload(req)?;

    let mut dir = req.state.directory.lock().await;
    let room = req.current_room(&dir)?;
    match XtCommand::parse(room, &payload)? {
        None => tracing::debug!(session = %req.user, "xtReq without cmd"),
        Some(XtCommand::SetPositions(ids)) => {
            dir.require_room_mut(room)?.position_assignment_ids = ids;
        }
        Some(XtCommand::Order(record)) => {
            dir.deliver(Recipient::Room(room), &ServerMessage::Relay(record));
        }
    }
    Ok(Flow::Continue)
}

/// Sends `payload` to every member of `room` as coming from `user`.
fn broadcast(dir: &RoomDirectory, room: RoomId, user: UserId, payload: DataObject) {
    dir.deliver(
        Recipient::Room(room),
        &ServerMessage::DataObject {
            room,
            user,
            payload,
        },
    );
}

/// Relays chat. Without an ally it goes to everyone else in the room as
/// coming from the sender; with one it goes to that player only.
fn send_chat(
    dir: &RoomDirectory,
    room: RoomId,
    sender: UserId,
    id: &str,
    payload: &DataObject,
    ally: Option<UserId>,
) -> Result<(), ProtocolError> {
    let args = payload.require_first_obj()?;
    let chat = args
        .vars()
        .cloned()
        .fold(Obj::new(ObjKind::Object, "sub"), Obj::with_var);
    let out = DataObject::new().with_obj(chat).with_var(id_var(id));

    let (to, user) = match ally {
        Some(ally) if dir.room(room).is_some_and(|r| r.contains(ally)) => (Recipient::User(ally), ally),
        Some(ally) => {
            tracing::debug!(%room, %ally, "ally chat target not in room");
            return Ok(());
        }
        None => (Recipient::RoomExcept(room, sender), sender),
    };
    dir.deliver(
        to,
        &ServerMessage::DataObject {
            room,
            user,
            payload: out,
        },
    );
    Ok(())
}

/// Tells `target` it was kicked and the room that it is gone.
fn kick(dir: &RoomDirectory, room: RoomId, target: UserId) {
    if dir.sessions().get(target).is_none() {
        tracing::debug!(%room, %target, "kick target not connected");
        return;
    }
    let notice = DataObject::new()
        .with_obj(Obj::new(ObjKind::Array, "sub"))
        .with_var(id_var("getKicked"));
    dir.deliver(
        Recipient::User(target),
        &ServerMessage::DataObject {
            room,
            user: target,
            payload: notice,
        },
    );
    dir.deliver(
        Recipient::Room(room),
        &ServerMessage::UserGone { room, user: target },
    );
    tracing::info!(%room, %target, "player kicked");
}

/// Writes a team-display array into the room's position slots.
fn store_slots(dir: &mut RoomDirectory, room: RoomId, slots: Vec<String>) -> Result<(), ColonyError> {
    let dropped = dir.require_room_mut(room)?.set_position_slots(slots);
    if dropped > 0 {
        tracing::warn!(%room, dropped, "team display longer than the position slots");
    }
    Ok(())
}
