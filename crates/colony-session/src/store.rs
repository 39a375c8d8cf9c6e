//! Persistent account storage.
//!
//! Colony doesn't care where accounts live. It talks to them through the
//! [`AccountStore`] trait: lookup by name, create, buddy relations, and
//! the set of all stored ids (so fresh session ids never collide with a
//! persisted one).
//!
//! Two implementations ship with the crate:
//! - [`MemoryAccountStore`](crate::MemoryAccountStore) for tests and
//!   throwaway servers
//! - `SqliteAccountStore` (feature `sqlite`) for real deployments

use std::collections::HashSet;
use std::future::Future;

use crate::SessionError;

/// One stored account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: u32,
    pub name: String,
    pub games_played: i64,
    pub games_won: i64,
    pub consecutive_wins: i64,
    pub rank: i64,
}

/// The account store the login and buddy handlers consume.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one store is shared by every
/// connection task for the lifetime of the server.
///
/// Buddy relations are directed: `add_buddy(a, b)` makes `b` appear in
/// `get_buddies(a)` and nothing else.
pub trait AccountStore: Send + Sync + 'static {
    /// Looks up an account by exact name.
    fn get_user_info(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<AccountRecord>, SessionError>> + Send;

    /// Creates an account. Returns `false` if the name is already taken.
    fn add_user(&self, name: &str) -> impl Future<Output = Result<bool, SessionError>> + Send;

    /// The names `name` has added as buddies, in insertion order.
    fn get_buddies(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<String>, SessionError>> + Send;

    /// Records `buddy` as a buddy of `name`. A no-op if either is unknown.
    fn add_buddy(
        &self,
        name: &str,
        buddy: &str,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Every stored account id.
    fn get_all_ids(&self) -> impl Future<Output = Result<HashSet<u32>, SessionError>> + Send;
}
