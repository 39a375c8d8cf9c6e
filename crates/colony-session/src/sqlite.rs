//! SQLite-backed [`AccountStore`].

use std::collections::HashSet;

use sqlx::{Row, SqlitePool};

use crate::{AccountRecord, AccountStore, SessionError};

/// Accounts and buddy relations in a SQLite database.
///
/// Schema: `users(id AUTOINCREMENT, username UNIQUE, password, games_played,
/// games_won, consecutive_wins, rank)` and directed
/// `buddies(user_id, buddy_id)` rows.
#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// schema exists.
    pub async fn open(path: &str) -> Result<Self, SessionError> {
        let pool = SqlitePool::connect(&format!("sqlite:{path}?mode=rwc")).await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        tracing::info!(path, "account store opened");
        Ok(store)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensure the underlying tables exist.
    pub async fn init_schema(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE,
                password TEXT,
                games_played INTEGER DEFAULT 0,
                games_won INTEGER DEFAULT 0,
                consecutive_wins INTEGER DEFAULT 0,
                rank INTEGER DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS buddies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                buddy_id INTEGER,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (buddy_id) REFERENCES users(id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl AccountStore for SqliteAccountStore {
    async fn get_user_info(&self, name: &str) -> Result<Option<AccountRecord>, SessionError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, games_played, games_won, consecutive_wins, rank
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.try_get("id")?;
        Ok(Some(AccountRecord {
            id: u32::try_from(id).map_err(|_| SessionError::Store(format!("id {id} out of range")))?,
            name: row.try_get("username")?,
            games_played: row.try_get("games_played")?,
            games_won: row.try_get("games_won")?,
            consecutive_wins: row.try_get("consecutive_wins")?,
            rank: row.try_get("rank")?,
        }))
    }

    async fn add_user(&self, name: &str) -> Result<bool, SessionError> {
        let result = sqlx::query("INSERT OR IGNORE INTO users (username, password) VALUES (?, NULL)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_buddies(&self, name: &str) -> Result<Vec<String>, SessionError> {
        let rows = sqlx::query(
            r#"
            SELECT u.username
            FROM users u
            JOIN buddies b ON u.id = b.buddy_id
            JOIN users u2 ON b.user_id = u2.id
            WHERE u2.username = ?
            ORDER BY b.id
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("username").map_err(SessionError::from))
            .collect()
    }

    async fn add_buddy(&self, name: &str, buddy: &str) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            INSERT INTO buddies (user_id, buddy_id)
            SELECT u1.id, u2.id
            FROM users u1, users u2
            WHERE u1.username = ? AND u2.username = ?
            "#,
        )
        .bind(name)
        .bind(buddy)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_all_ids(&self) -> Result<HashSet<u32>, SessionError> {
        let rows = sqlx::query("SELECT id FROM users")
            .fetch_all(&self.pool)
            .await?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            if let Ok(id) = u32::try_from(id) {
                ids.insert(id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn store() -> SqliteAccountStore {
        // A single connection keeps every query on the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteAccountStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_and_lookup_user() {
        let store = store().await;

        assert!(store.add_user("alice").await.unwrap());
        assert!(!store.add_user("alice").await.unwrap());

        let record = store.get_user_info("alice").await.unwrap().unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.name, "alice");
        assert_eq!(record.rank, 0);
        assert!(store.get_user_info("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_buddies_follow_insert_direction() {
        let store = store().await;
        store.add_user("alice").await.unwrap();
        store.add_user("bob").await.unwrap();
        store.add_user("carol").await.unwrap();

        store.add_buddy("alice", "carol").await.unwrap();
        store.add_buddy("alice", "bob").await.unwrap();

        assert_eq!(store.get_buddies("alice").await.unwrap(), vec!["carol", "bob"]);
        assert!(store.get_buddies("bob").await.unwrap().is_empty());
        assert_eq!(
            store.get_all_ids().await.unwrap(),
            [1, 2, 3].into_iter().collect()
        );
    }
}
