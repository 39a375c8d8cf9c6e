//! # Colony
//!
//! Session and room server for a real-time multiplayer lobby-and-match
//! game. Clients connect over TCP, speak a null-delimited XML protocol,
//! log in, browse and join rooms, chat, and relay in-match orders.
//!
//! This crate is the top of the stack:
//!
//! ```text
//! colony (server loop, dispatch, handlers)
//!     ↕
//! colony-room      (rooms + sessions under one lock)
//!     ↕
//! colony-session   (sessions, registry, account store)
//!     ↕
//! colony-protocol  (envelopes, data objects, relay records)
//!     ↕
//! colony-transport (TCP framing)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colony::prelude::*;
//!
//! # async fn start() -> Result<(), ColonyError> {
//! let server = ColonyServer::<MemoryAccountStore, SilentPresence>::builder()
//!     .bind("0.0.0.0:9339")
//!     .moderators(["Alice"])
//!     .build(MemoryAccountStore::new(), SilentPresence)
//!     .await?;
//! let request = server.run().await?;
//! std::process::exit(request.exit_code());
//! # }
//! ```

mod commands;
pub mod config;
mod dispatch;
mod error;
mod handler;
mod handlers;
pub mod logging;
mod server;

pub use commands::{CRASH_EXIT_CODE, ChatCommand, ShutdownRequest};
pub use config::{ServerConfig, UnknownCasePolicy};
pub use dispatch::{Action, Flow};
pub use error::ColonyError;
pub use server::{ColonyServer, ColonyServerBuilder};

/// Everything needed to start a server.
pub mod prelude {
    pub use crate::{
        ColonyError, ColonyServer, ColonyServerBuilder, ServerConfig, ShutdownRequest,
        UnknownCasePolicy,
    };
    pub use colony_protocol::{RoomId, ServerMessage, UserId};
    pub use colony_session::{
        AccountStore, MemoryAccountStore, PresenceSink, SilentPresence, SqliteAccountStore,
    };
}
