//! Per-connection handler: session setup, the read loop, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Split the socket; a writer task drains the session's outbox
//!   2. Register a fresh session under the directory lock
//!   3. Loop: receive frames → answer the policy request or dispatch
//!   4. On any exit path, the [`Client`] guard runs disconnect cleanup

use std::sync::Arc;

use colony_protocol::{Inbound, ProtocolError, ServerMessage, UserId, decode_frame};
use colony_session::{AccountStore, PresenceSink, Session};
use colony_transport::TcpConnection;
use tokio::sync::mpsc;

use crate::config::UnknownCasePolicy;
use crate::dispatch::{Flow, dispatch};
use crate::server::ServerState;
use crate::ColonyError;

/// Drop guard that tears a session down when the handler exits.
///
/// Cleanup happens even if the handler panics. Since `Drop` is
/// synchronous, it spawns a task for the async part.
struct Client<S: AccountStore, P: PresenceSink> {
    /// The session's id. Changes once if login adopts a stored account id.
    user: UserId,
    state: Arc<ServerState<S, P>>,
}

impl<S: AccountStore, P: PresenceSink> Drop for Client<S, P> {
    fn drop(&mut self) {
        let user = self.user;
        let state = Arc::clone(&self.state);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { disconnect(&state, user).await });
            }
            Err(_) => tracing::warn!(%user, "no runtime left for session cleanup"),
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, P>(
    conn: TcpConnection,
    state: Arc<ServerState<S, P>>,
) -> Result<(), ColonyError>
where
    S: AccountStore,
    P: PresenceSink,
{
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    let (mut reader, mut writer) = conn.into_split();

    // Everything for this client, replies and broadcasts alike, goes
    // through one queue; the writer task owns the socket's write half.
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            if let Err(e) = writer.send(&message).await {
                tracing::debug!(%conn_id, error = %e, "write failed");
                break;
            }
        }
        let _ = writer.close().await;
    });

    // --- Step 1: Session ---
    let persisted = state.store.get_all_ids().await?;
    let user = {
        let mut dir = state.directory.lock().await;
        let id = dir.sessions_mut().allocate_id(&persisted);
        dir.sessions_mut()
            .insert(Session::new(id, peer, outbox.clone()))?;
        id
    };
    let mut client = Client {
        user,
        state: Arc::clone(&state),
    };
    tracing::info!(%conn_id, %peer, session = %user, "client connected");

    // --- Step 2: Message loop ---
    loop {
        let frame = match reader.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(session = %client.user, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(session = %client.user, error = %e, "recv error");
                break;
            }
        };
        tracing::debug!(session = %client.user, %frame, "received");

        let envelope = match decode_frame(&frame) {
            Ok(Inbound::PolicyRequest) => {
                let reply = ServerMessage::Policy {
                    port: state.settings.port,
                };
                let _ = outbox.send(reply.to_string());
                continue;
            }
            Ok(Inbound::Envelope(envelope)) => envelope,
            Err(e) => {
                tracing::error!(session = %client.user, error = %e, "dropping undecodable message");
                continue;
            }
        };

        match dispatch(&state, &mut client.user, &envelope).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::CloseAfter(grace)) => {
                tokio::time::sleep(grace).await;
                tracing::info!(session = %client.user, "closing connection");
                break;
            }
            Ok(Flow::Shutdown(request)) => {
                let _ = state.shutdown.send(request);
            }
            Err(e) => report(state.settings.unknown_case, client.user, &envelope.action, e),
        }
    }

    // client drops here → disconnect cleanup fires.
    Ok(())
}

/// Logs a failed request. Unimplemented sub-protocol variants follow the
/// configured policy.
fn report(policy: UnknownCasePolicy, user: UserId, action: &str, error: ColonyError) {
    if error.is_unknown_case() && policy == UnknownCasePolicy::Panic {
        panic!("unhandled {action} case from session {user}: {error}");
    }
    match &error {
        ColonyError::Protocol(ProtocolError::UnknownAction(_)) => {
            tracing::warn!(session = %user, action, error = %error, "dropping message")
        }
        _ => tracing::error!(session = %user, action, error = %error, "request failed"),
    }
}

/// Removes a session: buddy-offline notices, room departure, registry
/// removal (which releases a guest id), then a sweep.
pub(crate) async fn disconnect<S, P>(state: &ServerState<S, P>, user: UserId)
where
    S: AccountStore,
    P: PresenceSink,
{
    let (name, guest) = {
        let dir = state.directory.lock().await;
        match dir.session(user) {
            Ok(session) => (session.name.clone(), session.guest),
            Err(_) => return,
        }
    };

    let buddies = if name.is_empty() || guest {
        Vec::new()
    } else {
        state.store.get_buddies(&name).await.unwrap_or_else(|e| {
            tracing::warn!(session = %user, error = %e, "buddy lookup failed");
            Vec::new()
        })
    };

    let mut dir = state.directory.lock().await;
    let offline = ServerMessage::BuddyUpdate {
        online: false,
        user,
        name: name.clone(),
    };
    for buddy in &buddies {
        if let Some(session) = dir.sessions().find_by_name(buddy) {
            session.send(&offline);
        }
    }

    match dir.leave(user) {
        Ok(Some(room)) => dir.announce_departure(room, user),
        Ok(None) => {}
        Err(e) => tracing::warn!(session = %user, error = %e, "leave on disconnect failed"),
    }
    dir.sessions_mut().remove(user);
    dir.sweep();

    tracing::info!(session = %user, %name, "session removed");
}
