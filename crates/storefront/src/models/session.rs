//! Session-related types.
//!
//! Types stored in the session for authentication and cart state.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use boardquest_core::UserId;

use crate::backend::{AuthSession, AuthUser};

/// Refresh this long before the access token actually expires.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Session-stored user identity.
///
/// `is_admin` is evaluated at every sign-in, refresh and session check,
/// never derived from client input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Identity provider user id.
    pub id: UserId,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Whether the user has a row in `admin_users`.
    pub is_admin: bool,
}

impl CurrentUser {
    #[must_use]
    pub fn from_auth(user: &AuthUser, is_admin: bool) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            is_admin,
        }
    }
}

/// Identity provider tokens held server-side in the session store.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl StoredTokens {
    #[must_use]
    pub fn from_session(session: &AuthSession) -> Self {
        use secrecy::ExposeSecret;
        Self {
            access_token: session.access_token.expose_secret().to_string(),
            refresh_token: session.refresh_token.expose_secret().to_string(),
            expires_at: session.expires_at,
        }
    }

    /// Whether the access token is expired or about to be.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    #[must_use]
    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }

    #[must_use]
    pub fn refresh_token(&self) -> SecretString {
        SecretString::from(self.refresh_token.clone())
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the identity provider tokens.
    pub const TOKENS: &str = "auth_tokens";

    /// Key for the signed-in user's cart.
    pub const CART: &str = "cart";
}
