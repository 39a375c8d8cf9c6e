//! Wire protocol for Colony.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Envelopes** ([`Envelope`], [`Element`], [`decode_frame`]): the
//!   `<msg><body action r>` documents every command travels in, plus the
//!   legacy policy request.
//! - **Data objects** ([`DataObject`], [`Obj`], [`Var`]): the nested
//!   payload documents game clients put inside CDATA.
//! - **Relay records** ([`RelayRecord`], [`XtCommand`]): the compact
//!   `%xt%` format for real-time orders.
//! - **Outbound messages** ([`ServerMessage`]): everything the server
//!   sends, rendered through `Display`.
//! - **Errors** ([`ProtocolError`]): what can go wrong interpreting a
//!   frame.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (text frames) and the
//! session/room layers. It doesn't know about connections or rooms; it
//! only knows how to read and write messages.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Server (session + rooms)
//! ```

mod data_object;
mod envelope;
mod error;
mod message;
mod relay;
mod types;

pub use data_object::{DataObject, Node, Obj, ObjKind, Var, VarType};
pub use envelope::{Element, Envelope, Inbound, POLICY_REQUEST, decode_frame};
pub use error::ProtocolError;
pub use message::{
    BuddyEntry, GameRoomVars, MemberEntry, RoomAddEntry, RoomListEntry, ServerMessage,
};
pub use relay::{RELAY_TAG, RelayOrder, RelayRecord, XtCommand};
pub use types::{Recipient, RoomId, UserId};
