//! Error types for the session layer.

use colony_protocol::UserId;

/// Errors that can occur while managing sessions or talking to the
/// account store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No live session exists for the given id.
    #[error("session not found for user {0}")]
    NotFound(UserId),

    /// Another live session already holds this id, so a session cannot be
    /// re-keyed onto it.
    #[error("user id {0} is already held by a live session")]
    IdInUse(UserId),

    /// The account store failed. The message carries the backend's error.
    #[error("account store error: {0}")]
    Store(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
    }
}
