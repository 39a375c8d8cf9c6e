//! User session management for Colony.
//!
//! This crate handles who is connected and what we know about them:
//!
//! 1. **Sessions**: one [`Session`] per live connection, with its
//!    handshake [`SessionState`], stats, and outbound queue
//! 2. **Registry**: [`SessionRegistry`] tracks live sessions, allocates
//!    ids, and reserves guest ids
//! 3. **Accounts**: the [`AccountStore`] trait, with in-memory and SQLite
//!    implementations
//! 4. **Collaborators**: [`ModeratorList`] and the [`PresenceSink`] bridge
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← owns the registry inside the room directory
//!     ↕
//! Session Layer (this crate)  ← user identity and connection state
//!     ↕
//! Protocol Layer (below)  ← provides UserId, ServerMessage types
//! ```

mod error;
mod memory;
mod moderators;
mod presence;
mod registry;
mod session;
#[cfg(feature = "sqlite")]
mod sqlite;
mod store;

pub use error::SessionError;
pub use memory::MemoryAccountStore;
pub use moderators::ModeratorList;
pub use presence::{PresenceSink, SilentPresence};
pub use registry::SessionRegistry;
pub use session::{Outbox, Session, SessionState, UserStats, UserVariable};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAccountStore;
pub use store::{AccountRecord, AccountStore};
