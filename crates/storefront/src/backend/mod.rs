//! Client ports for the hosted backend-as-a-service.
//!
//! # Architecture
//!
//! The storefront owns no database. Identity, rows, files and change
//! notifications all live in the external service, reached through three
//! narrow ports:
//!
//! - [`IdentityProvider`] - sign-up, sign-in, sign-out, token checks and refresh
//! - [`TableStore`] - per-table select/insert/update/upsert/delete plus change
//!   subscriptions
//! - [`ObjectStore`] - file upload, public URLs and removal
//!
//! Two implementations exist: [`SupabaseClient`] (REST + realtime websocket
//! against a hosted project) and [`MemoryBackend`] (in-process, used for
//! local development and tests).
//!
//! There is no retry or backoff here. A failed call surfaces as a
//! [`BackendError`] and the handler turns it into an error notice.

pub mod changes;
pub mod memory;
pub mod query;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use boardquest_core::{Email, UserId};

pub use changes::{ChangeFeed, ChangeKind, TableChange, TableSubscription};
pub use memory::MemoryBackend;
pub use query::{Order, Query};
pub use supabase::SupabaseClient;

/// Table names used by the storefront.
pub mod tables {
    pub const PRODUCTS: &str = "products";
    pub const MAIN_CONTENT: &str = "main_content";
    pub const ADMIN_USERS: &str = "admin_users";
}

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Credentials or token were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The request was rejected locally before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Realtime websocket failure.
    #[error("Realtime error: {0}")]
    Realtime(String),
}

/// Whose credentials a data request runs with.
///
/// Row-level security in the backend decides what each caller may touch.
#[derive(Debug, Clone, Default)]
pub enum Caller {
    /// Only the project's public key.
    #[default]
    Anonymous,
    /// A signed-in user's access token.
    User(SecretString),
}

impl Caller {
    #[must_use]
    pub fn user(access_token: impl Into<String>) -> Self {
        Self::User(SecretString::from(access_token.into()))
    }

    /// The bearer token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(token) => Some(token.expose_secret()),
        }
    }
}

/// An authenticated identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
    /// From user metadata; set at sign-up.
    pub username: Option<String>,
}

/// Token pair returned by sign-in, sign-up (when confirmed) and refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

/// Result of a sign-up call.
///
/// `session` is `None` when the project requires email confirmation.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

/// Options for [`ObjectStore::upload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// `Cache-Control: max-age` for the stored object.
    pub cache_control_secs: u32,
    /// Overwrite an existing object at the same path.
    pub upsert: bool,
}

/// Identity operations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. `username` is stored in the user metadata.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        username: &str,
    ) -> Result<SignUpOutcome, BackendError>;

    /// Exchange email and password for a session.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError>;

    /// Look up the user behind `access_token` (fails if it is invalid or expired).
    async fn get_user(&self, access_token: &SecretString) -> Result<AuthUser, BackendError>;

    /// Trade a refresh token for a new session.
    async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, BackendError>;
}

/// Tabular storage operations.
///
/// Rows travel as JSON objects; typed decoding happens in [`crate::db`].
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(
        &self,
        caller: &Caller,
        table: &str,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError>;

    /// Insert one row and return it as stored.
    async fn insert(&self, caller: &Caller, table: &str, row: Value)
    -> Result<Value, BackendError>;

    /// Patch every row matching `query` and return the updated rows.
    async fn update(
        &self,
        caller: &Caller,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;

    /// Insert, or merge into the row with the same primary key.
    async fn upsert(&self, caller: &Caller, table: &str, row: Value)
    -> Result<Value, BackendError>;

    /// Delete every row matching `query`.
    async fn delete(&self, caller: &Caller, table: &str, query: &Query)
    -> Result<(), BackendError>;

    /// Subscribe to change notifications for `table`.
    fn subscribe(&self, table: &str) -> TableSubscription;

    /// Whether any row has `column = value`.
    async fn exists(
        &self,
        caller: &Caller,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<bool, BackendError> {
        let query = Query::new().select(column).eq(column, value).limit(1);
        Ok(!self.select(caller, table, &query).await?.is_empty())
    }
}

/// Object storage operations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        caller: &Caller,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        options: UploadOptions,
    ) -> Result<(), BackendError>;

    /// Public URL of an object (no request is made).
    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(
        &self,
        caller: &Caller,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), BackendError>;
}

/// The three ports bundled for [`crate::state::AppState`].
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub tables: Arc<dyn TableStore>,
    pub storage: Arc<dyn ObjectStore>,
}

impl Backend {
    /// Use one client for all three ports.
    pub fn from_client<C>(client: C) -> Self
    where
        C: IdentityProvider + TableStore + ObjectStore + 'static,
    {
        Self::from_shared(Arc::new(client))
    }

    /// Use one shared client for all three ports, keeping a handle to it.
    pub fn from_shared<C>(client: Arc<C>) -> Self
    where
        C: IdentityProvider + TableStore + ObjectStore + 'static,
    {
        Self {
            identity: client.clone(),
            tables: client.clone(),
            storage: client,
        }
    }
}
