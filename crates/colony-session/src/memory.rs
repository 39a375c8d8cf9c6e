//! An in-process [`AccountStore`].

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::{AccountRecord, AccountStore, SessionError};

#[derive(Debug, Default)]
struct Accounts {
    users: Vec<AccountRecord>,
    /// Directed `(user id, buddy id)` rows.
    buddies: Vec<(u32, u32)>,
    last_id: u32,
}

impl Accounts {
    fn id_of(&self, name: &str) -> Option<u32> {
        self.users.iter().find(|u| u.name == name).map(|u| u.id)
    }
}

/// Keeps accounts in memory. Ids start at 1 and auto-increment, like the
/// SQLite schema.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    inner: Mutex<Accounts>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryAccountStore {
    async fn get_user_info(&self, name: &str) -> Result<Option<AccountRecord>, SessionError> {
        let accounts = self.inner.lock().await;
        Ok(accounts.users.iter().find(|u| u.name == name).cloned())
    }

    async fn add_user(&self, name: &str) -> Result<bool, SessionError> {
        let mut accounts = self.inner.lock().await;
        if accounts.id_of(name).is_some() {
            return Ok(false);
        }
        accounts.last_id += 1;
        let id = accounts.last_id;
        accounts.users.push(AccountRecord {
            id,
            name: name.to_string(),
            games_played: 0,
            games_won: 0,
            consecutive_wins: 0,
            rank: 0,
        });
        Ok(true)
    }

    async fn get_buddies(&self, name: &str) -> Result<Vec<String>, SessionError> {
        let accounts = self.inner.lock().await;
        let Some(id) = accounts.id_of(name) else {
            return Ok(Vec::new());
        };
        Ok(accounts
            .buddies
            .iter()
            .filter(|(user, _)| *user == id)
            .filter_map(|(_, buddy)| accounts.users.iter().find(|u| u.id == *buddy))
            .map(|u| u.name.clone())
            .collect())
    }

    async fn add_buddy(&self, name: &str, buddy: &str) -> Result<(), SessionError> {
        let mut accounts = self.inner.lock().await;
        if let (Some(user), Some(buddy)) = (accounts.id_of(name), accounts.id_of(buddy)) {
            accounts.buddies.push((user, buddy));
        }
        Ok(())
    }

    async fn get_all_ids(&self) -> Result<HashSet<u32>, SessionError> {
        let accounts = self.inner.lock().await;
        Ok(accounts.users.iter().map(|u| u.id).collect())
    }
}
