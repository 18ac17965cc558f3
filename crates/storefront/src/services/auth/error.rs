//! Authentication error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] boardquest_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Sign-up without a username.
    #[error("Username is required")]
    MissingUsername,

    /// The identity provider refused the request (e.g. email already in use).
    #[error("{0}")]
    Rejected(String),

    /// Stored tokens are no longer valid and could not be refreshed.
    #[error("session expired")]
    SessionExpired,

    /// Identity provider unreachable or failing.
    #[error("identity provider error: {0}")]
    Backend(BackendError),

    /// Repository error during the admin check.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Session store error.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(_) => Self::InvalidCredentials,
            BackendError::Api { status, message } if (400..500).contains(&status) => {
                Self::Rejected(message)
            }
            other => Self::Backend(other),
        }
    }
}
