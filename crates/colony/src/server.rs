//! `ColonyServer` builder and server loop.
//!
//! This is the entry point for running a Colony server. It ties together
//! all the layers: transport → protocol → session → room.

use std::sync::Arc;
use std::time::Duration;

use colony_room::RoomDirectory;
use colony_session::{AccountStore, ModeratorList, PresenceSink};
use colony_transport::{TcpTransport, Transport};
use tokio::sync::{Mutex, mpsc};

use crate::config::{ServerConfig, UnknownCasePolicy};
use crate::handler::handle_connection;
use crate::{ColonyError, ShutdownRequest};

/// Tunables the handlers read on every request.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) game_version: i64,
    pub(crate) welcome_message: String,
    pub(crate) welcome_sender: String,
    pub(crate) restart_delay: Duration,
    pub(crate) version_grace: Duration,
    pub(crate) unknown_case: UnknownCasePolicy,
    /// The port embedded in policy replies: the one actually bound.
    pub(crate) port: u16,
}

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The room
/// directory is the only mutable part; everything else is fixed at build
/// time.
pub(crate) struct ServerState<S: AccountStore, P: PresenceSink> {
    pub(crate) directory: Mutex<RoomDirectory>,
    pub(crate) store: S,
    pub(crate) presence: P,
    pub(crate) moderators: ModeratorList,
    pub(crate) settings: Settings,
    pub(crate) shutdown: mpsc::UnboundedSender<ShutdownRequest>,
}

/// Builder for configuring and starting a Colony server.
///
/// # Example
///
/// ```rust,ignore
/// use colony::prelude::*;
///
/// let server = ColonyServer::builder()
///     .bind("0.0.0.0:9339")
///     .moderators(["Alice"])
///     .build(MemoryAccountStore::new(), SilentPresence)
///     .await?;
/// let request = server.run().await?;
/// std::process::exit(request.exit_code());
/// ```
pub struct ColonyServerBuilder {
    bind_addr: String,
    moderators: Vec<String>,
    game_version: i64,
    welcome_message: String,
    welcome_sender: String,
    restart_delay: Duration,
    version_grace: Duration,
    unknown_case: UnknownCasePolicy,
}

impl ColonyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// Creates a builder from loaded configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.connection.bind_addr(),
            moderators: config.admin.moderators.clone(),
            game_version: config.game.version,
            welcome_message: config.welcome.message.clone(),
            welcome_sender: config.welcome.sender.clone(),
            restart_delay: config.server.restart_delay(),
            version_grace: config.server.version_grace(),
            unknown_case: config.unknown_case(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the names allowed to run moderator commands.
    pub fn moderators<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.moderators = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the client protocol version logins must report.
    pub fn game_version(mut self, version: i64) -> Self {
        self.game_version = version;
        self
    }

    /// Sets the banner shown on entering the lobby and who it is from.
    pub fn welcome(mut self, sender: &str, message: &str) -> Self {
        self.welcome_sender = sender.to_string();
        self.welcome_message = message.to_string();
        self
    }

    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn version_grace(mut self, grace: Duration) -> Self {
        self.version_grace = grace;
        self
    }

    pub fn unknown_case(mut self, policy: UnknownCasePolicy) -> Self {
        self.unknown_case = policy;
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build<S, P>(self, store: S, presence: P) -> Result<ColonyServer<S, P>, ColonyError>
    where
        S: AccountStore,
        P: PresenceSink,
    {
        let transport = TcpTransport::bind(&self.bind_addr).await?;
        let port = transport
            .local_addr()
            .map(|addr| addr.port())
            .map_err(colony_transport::TransportError::AcceptFailed)?;

        let moderators = ModeratorList::new(&self.moderators);
        if moderators.is_empty() {
            tracing::warn!("no moderators configured, /restart and /update are disabled");
        }

        let (shutdown, shutdown_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ServerState {
            directory: Mutex::new(RoomDirectory::new()),
            store,
            presence,
            moderators,
            settings: Settings {
                game_version: self.game_version,
                welcome_message: self.welcome_message,
                welcome_sender: self.welcome_sender,
                restart_delay: self.restart_delay,
                version_grace: self.version_grace,
                unknown_case: self.unknown_case,
                port,
            },
            shutdown,
        });

        Ok(ColonyServer {
            transport,
            state,
            shutdown_rx,
        })
    }
}

impl Default for ColonyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Colony server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ColonyServer<S: AccountStore, P: PresenceSink> {
    transport: TcpTransport,
    state: Arc<ServerState<S, P>>,
    shutdown_rx: mpsc::UnboundedReceiver<ShutdownRequest>,
}

impl<S, P> ColonyServer<S, P>
where
    S: AccountStore,
    P: PresenceSink,
{
    /// Creates a new builder.
    pub fn builder() -> ColonyServerBuilder {
        ColonyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Returns when a moderator asks for a restart or an update; the
    /// caller decides what that means for the process.
    pub async fn run(mut self) -> Result<ShutdownRequest, ColonyError> {
        tracing::info!(port = self.state.settings.port, "Colony server running");

        loop {
            tokio::select! {
                Some(request) = self.shutdown_rx.recv() => {
                    tracing::info!(?request, "shutdown requested");
                    return Ok(request);
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
