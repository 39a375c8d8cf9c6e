//! Handshake, login, buddies, private messages, and the room list.

use colony_protocol::{BuddyEntry, ProtocolError, Recipient, ServerMessage, UserId};
use colony_session::{AccountStore, PresenceSink, SessionError};

use super::Request;
use crate::dispatch::Flow;
use crate::ColonyError;

/// Shown to clients whose reported version differs from the server's.
pub(crate) const VERSION_WARNING: &str = "You do not have the Latest Version of the Game!";

/// `verChk`: record the client's protocol version and acknowledge.
pub(crate) async fn version_check<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let raw = req.envelope.body.require_child("ver")?.require_attr("v")?;
    let version: i64 = raw.trim().parse().map_err(|_| ProtocolError::InvalidValue {
        field: "v".to_string(),
        value: raw.to_string(),
    })?;

    let mut dir = req.state.directory.lock().await;
    let session = dir.session_mut(req.user)?;
    session.protocol_version = Some(version);
    session.send(&ServerMessage::Policy {
        port: req.state.settings.port,
    });
    session.send(&ServerMessage::ApiOk);

    tracing::debug!(session = %req.user, version, "version checked");
    Ok(Flow::Continue)
}

/// `login`: name the session, adopt its stored account, greet buddies.
///
/// Returns the session's id after login, which is the stored account id
/// when one exists and is free.
pub(crate) async fn login<S, P>(req: &Request<'_, S, P>) -> Result<(UserId, Flow), ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let state = req.state;
    let nick = req
        .envelope
        .body
        .require_child("login")?
        .child("nick")
        .map(|n| n.text().to_string())
        .unwrap_or_default();

    let guest = nick.is_empty();
    let name = if guest {
        format!("guest_{}", req.user)
    } else {
        nick
    };
    let moderator = state.moderators.contains(&name);

    let reported = state.directory.lock().await.session(req.user)?.protocol_version;
    let version_ok = reported == Some(state.settings.game_version);

    let mut record = None;
    if !guest {
        record = state.store.get_user_info(&name).await?;
        if record.is_none() && version_ok {
            state.store.add_user(&name).await?;
            record = state.store.get_user_info(&name).await?;
        }
    }

    let id = {
        let mut dir = state.directory.lock().await;
        let mut id = req.user;
        if guest {
            dir.sessions_mut().reserve_guest(id);
        }
        if let Some(record) = &record {
            match dir.sessions_mut().rekey(id, UserId(record.id)) {
                Ok(()) => id = UserId(record.id),
                Err(SessionError::IdInUse(taken)) => {
                    tracing::warn!(session = %id, account = %taken, "account id held by a live session, keeping connection id");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let session = dir.session_mut(id)?;
        session.name = name.clone();
        session.moderator = moderator;
        session.guest = guest;
        if let Some(record) = &record {
            session.stats.games_played = record.games_played;
            session.stats.games_won = record.games_won;
            session.stats.consecutive_wins = record.consecutive_wins;
            session.stats.rank = record.rank;
        }
        session.send(&ServerMessage::LoginOk {
            name: name.clone(),
            user: id,
            moderator,
        });
        if !version_ok {
            session.send(&ServerMessage::AdminMessage {
                room: session.room,
                user: id,
                text: VERSION_WARNING.to_string(),
            });
        }
        id
    };
    tracing::info!(session = %id, %name, moderator, guest, "logged in");

    if !version_ok {
        tracing::info!(session = %id, ?reported, expected = state.settings.game_version, "client version mismatch");
        return Ok((id, Flow::CloseAfter(state.settings.version_grace)));
    }
    if guest {
        return Ok((id, Flow::Continue));
    }

    state.presence.notify_login(&name);

    // The session already carries its new id, so failures from here on are
    // logged instead of propagated.
    match state.store.get_buddies(&name).await {
        Ok(buddies) => {
            let dir = state.directory.lock().await;
            let online = ServerMessage::BuddyUpdate {
                online: true,
                user: id,
                name: name.clone(),
            };
            for buddy in &buddies {
                if let Some(session) = dir.sessions().find_by_name(buddy) {
                    session.send(&online);
                }
            }
        }
        Err(e) => tracing::warn!(session = %id, error = %e, "buddy lookup failed"),
    }
    Ok((id, Flow::Continue))
}

/// `loadB`: the caller's buddies with their live presence.
pub(crate) async fn load_buddy_list<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let name = req.state.directory.lock().await.session(req.user)?.name.clone();
    let buddies = req.state.store.get_buddies(&name).await?;

    let dir = req.state.directory.lock().await;
    let entries = buddies
        .into_iter()
        .map(|buddy| BuddyEntry {
            online: dir.sessions().find_by_name(&buddy).map(|s| s.id),
            name: buddy,
        })
        .collect();
    dir.deliver(Recipient::User(req.user), &ServerMessage::BuddyList(entries));
    Ok(Flow::Continue)
}

/// `addB`: record a buddy if the account exists.
pub(crate) async fn add_buddy<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let buddy = req.envelope.body.require_child("n")?.text().to_string();
    let name = req.state.directory.lock().await.session(req.user)?.name.clone();

    if req.state.store.get_user_info(&buddy).await?.is_none() {
        tracing::warn!(session = %req.user, %buddy, "buddy is not a known account");
        return Ok(Flow::Continue);
    }
    req.state.store.add_buddy(&name, &buddy).await?;

    let dir = req.state.directory.lock().await;
    dir.deliver(
        Recipient::User(req.user),
        &ServerMessage::BuddyAdded { name: buddy },
    );
    Ok(Flow::Continue)
}

/// `prvMsg`: deliver the text after the last `!` to one session.
pub(crate) async fn private_message<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let txt = req.envelope.body.require_child("txt")?;
    let target: UserId = txt.require_attr("rcp")?.parse()?;
    let text = txt.text().rsplit('!').next().unwrap_or_default();

    let dir = req.state.directory.lock().await;
    let sender = dir.session(req.user)?;
    let Some(recipient) = dir.sessions().get(target) else {
        tracing::warn!(session = %req.user, %target, "private message to unknown session");
        return Ok(Flow::Continue);
    };
    recipient.send(&ServerMessage::PrivateMessage {
        room: recipient.room,
        user: Some(recipient.id),
        text: format!("{}!!&amp;&amp;!!{text}", sender.name),
    });
    tracing::info!(from = %sender.name, to = %recipient.name, "private message");
    Ok(Flow::Continue)
}

/// `getRmList`: every room not flagged empty.
pub(crate) async fn room_list<S, P>(req: &Request<'_, S, P>) -> Result<Flow, ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let mut dir = req.state.directory.lock().await;
    let rooms = dir.room_list();
    dir.deliver(Recipient::User(req.user), &ServerMessage::RoomList(rooms));
    Ok(Flow::Continue)
}
