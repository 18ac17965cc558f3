//! In-process backend for local development and tests.
//!
//! Implements all three ports against plain maps. Every table write
//! publishes the matching [`TableChange`], so the live catalog behaves the
//! same as it does against the hosted realtime feed.
//!
//! Row-level security is not modelled: every caller may write every table.
//! A user caller must still present a live access token, as the hosted
//! service would reject a stale one.
//! Accounts are confirmed at sign-up unless
//! [`MemoryBackend::require_email_confirmation`] is set.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use uuid::Uuid;

use boardquest_core::{Email, UserId};

use super::{
    AuthSession, AuthUser, BackendError, Caller, ChangeFeed, IdentityProvider, ObjectStore, Query,
    SignUpOutcome, TableChange, TableStore, TableSubscription, UploadOptions,
};

const PUBLIC_BASE: &str = "http://storage.local/storage/v1/object/public";
const SESSION_LIFETIME_SECS: i64 = 3600;

/// A stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control_secs: u32,
}

#[derive(Debug)]
struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, UserId>,
    refresh_tokens: HashMap<String, UserId>,
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<(String, String), StoredObject>,
}

impl State {
    fn authorize(&self, caller: &Caller) -> Result<(), BackendError> {
        match caller {
            Caller::Anonymous => Ok(()),
            Caller::User(token) if self.access_tokens.contains_key(token.expose_secret()) => Ok(()),
            Caller::User(_) => Err(BackendError::Unauthorized("JWT expired".to_string())),
        }
    }

    fn user(&self, id: UserId) -> Option<&AuthUser> {
        self.accounts
            .values()
            .map(|account| &account.user)
            .find(|user| user.id == id)
    }

    fn issue_session(&mut self, user: AuthUser) -> AuthSession {
        let access = Uuid::new_v4().to_string();
        let refresh = Uuid::new_v4().to_string();
        self.access_tokens.insert(access.clone(), user.id);
        self.refresh_tokens.insert(refresh.clone(), user.id);
        AuthSession {
            access_token: SecretString::from(access),
            refresh_token: SecretString::from(refresh),
            expires_at: Utc::now() + Duration::seconds(SESSION_LIFETIME_SECS),
            user,
        }
    }
}

/// In-memory implementation of every backend port.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    changes: ChangeFeed,
    require_confirmation: bool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sign-up return no session, as a project with email
    /// confirmation enabled does.
    #[must_use]
    pub const fn require_email_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    /// The feed every write publishes into.
    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    /// Replace a table's rows without publishing changes.
    ///
    /// # Errors
    ///
    /// Fails only if the state lock is poisoned.
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError> {
        self.lock()?.tables.insert(table.to_string(), rows);
        Ok(())
    }

    /// Current rows of a table.
    ///
    /// # Errors
    ///
    /// Fails only if the state lock is poisoned.
    pub fn rows(&self, table: &str) -> Result<Vec<Value>, BackendError> {
        Ok(self.lock()?.tables.get(table).cloned().unwrap_or_default())
    }

    /// A stored object, if present.
    ///
    /// # Errors
    ///
    /// Fails only if the state lock is poisoned.
    pub fn object(&self, bucket: &str, path: &str) -> Result<Option<StoredObject>, BackendError> {
        Ok(self
            .lock()?
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned())
    }

    /// Paths of every object in `bucket`, sorted.
    ///
    /// # Errors
    ///
    /// Fails only if the state lock is poisoned.
    pub fn object_paths(&self, bucket: &str) -> Result<Vec<String>, BackendError> {
        let state = self.lock()?;
        let mut paths: Vec<String> = state
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, path)| path.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Forget an access token so the next check fails, as expiry would.
    ///
    /// # Errors
    ///
    /// Fails only if the state lock is poisoned.
    pub fn expire_access_token(&self, access_token: &str) -> Result<(), BackendError> {
        self.lock()?.access_tokens.remove(access_token);
        Ok(())
    }

    /// Forget every access token issued to `user_id`; refresh tokens stay
    /// valid.
    ///
    /// # Errors
    ///
    /// Fails only if the state lock is poisoned.
    pub fn expire_access_tokens_for(&self, user_id: UserId) -> Result<(), BackendError> {
        self.lock()?.access_tokens.retain(|_, id| *id != user_id);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        self.state.lock().map_err(|_| BackendError::Api {
            status: 500,
            message: "memory backend state poisoned".to_string(),
        })
    }

    fn user_for_token(&self, access_token: &SecretString) -> Result<AuthUser, BackendError> {
        let state = self.lock()?;
        state
            .access_tokens
            .get(access_token.expose_secret())
            .and_then(|id| state.user(*id))
            .cloned()
            .ok_or_else(|| BackendError::Unauthorized("invalid or expired token".to_string()))
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        username: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let mut state = self.lock()?;
        if state.accounts.contains_key(email.as_str()) {
            return Err(BackendError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let user = AuthUser {
            id: UserId::random(),
            email: Some(email.as_str().to_string()),
            username: Some(username.to_string()),
        };
        state.accounts.insert(
            email.as_str().to_string(),
            Account {
                user: user.clone(),
                password: password.expose_secret().to_string(),
            },
        );

        let session = (!self.require_confirmation).then(|| state.issue_session(user.clone()));
        Ok(SignUpOutcome { user, session })
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let mut state = self.lock()?;
        let user = state
            .accounts
            .get(email.as_str())
            .filter(|account| account.password == password.expose_secret())
            .map(|account| account.user.clone())
            .ok_or_else(|| BackendError::Unauthorized("Invalid login credentials".to_string()))?;
        Ok(state.issue_session(user))
    }

    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        let Some(user_id) = state.access_tokens.remove(access_token.expose_secret()) else {
            return Err(BackendError::Unauthorized("invalid or expired token".to_string()));
        };
        state.refresh_tokens.retain(|_, id| *id != user_id);
        Ok(())
    }

    async fn get_user(&self, access_token: &SecretString) -> Result<AuthUser, BackendError> {
        self.user_for_token(access_token)
    }

    async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let mut state = self.lock()?;
        let user = state
            .refresh_tokens
            .remove(refresh_token.expose_secret())
            .and_then(|id| state.user(id).cloned())
            .ok_or_else(|| BackendError::Unauthorized("Invalid Refresh Token".to_string()))?;
        Ok(state.issue_session(user))
    }
}

#[async_trait]
impl TableStore for MemoryBackend {
    async fn select(
        &self,
        _caller: &Caller,
        table: &str,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .get(table)
            .map(|rows| query.apply(rows))
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        caller: &Caller,
        table: &str,
        row: Value,
    ) -> Result<Value, BackendError> {
        let row = with_generated_columns(row)?;
        {
            let mut state = self.lock()?;
            state.authorize(caller)?;
            state.tables.entry(table.to_string()).or_default().push(row.clone());
        }
        self.changes.publish(TableChange::insert(table, row.clone()));
        Ok(row)
    }

    async fn update(
        &self,
        caller: &Caller,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        if !query.has_filters() {
            return Err(BackendError::InvalidRequest(
                "update requires a filter".to_string(),
            ));
        }
        let patch = into_object(patch)?;

        let mut changes = Vec::new();
        {
            let mut state = self.lock()?;
            state.authorize(caller)?;
            let rows = state.tables.entry(table.to_string()).or_default();
            for row in rows.iter_mut().filter(|row| query.matches(row)) {
                let old = row.clone();
                merge(row, &patch);
                changes.push((row.clone(), old));
            }
        }

        let updated = changes.iter().map(|(new, _)| new.clone()).collect();
        for (new, old) in changes {
            self.changes.publish(TableChange::update(table, new, old));
        }
        Ok(updated)
    }

    async fn upsert(
        &self,
        caller: &Caller,
        table: &str,
        row: Value,
    ) -> Result<Value, BackendError> {
        let row = with_generated_columns(row)?;
        let fields = into_object(row.clone())?;
        let id = row.get("id").cloned();

        let (stored, change) = {
            let mut state = self.lock()?;
            state.authorize(caller)?;
            let rows = state.tables.entry(table.to_string()).or_default();
            if let Some(existing) = rows.iter_mut().find(|r| r.get("id") == id.as_ref()) {
                let old = existing.clone();
                // Merge keeps the original creation time.
                let mut patch = fields;
                patch.remove("created_at");
                merge(existing, &patch);
                (
                    existing.clone(),
                    TableChange::update(table, existing.clone(), old),
                )
            } else {
                rows.push(row.clone());
                (row.clone(), TableChange::insert(table, row))
            }
        };

        self.changes.publish(change);
        Ok(stored)
    }

    async fn delete(
        &self,
        caller: &Caller,
        table: &str,
        query: &Query,
    ) -> Result<(), BackendError> {
        if !query.has_filters() {
            return Err(BackendError::InvalidRequest(
                "delete requires a filter".to_string(),
            ));
        }

        let removed = {
            let mut state = self.lock()?;
            state.authorize(caller)?;
            let rows = state.tables.entry(table.to_string()).or_default();
            let (removed, kept) = std::mem::take(rows)
                .into_iter()
                .partition::<Vec<_>, _>(|row| query.matches(row));
            *rows = kept;
            removed
        };

        for old in removed {
            self.changes.publish(TableChange::delete(table, old));
        }
        Ok(())
    }

    fn subscribe(&self, table: &str) -> TableSubscription {
        self.changes.subscribe(table)
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(
        &self,
        caller: &Caller,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        options: UploadOptions,
    ) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        state.authorize(caller)?;
        let key = (bucket.to_string(), path.to_string());
        if !options.upsert && state.objects.contains_key(&key) {
            return Err(BackendError::Api {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        state.objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                cache_control_secs: options.cache_control_secs,
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{PUBLIC_BASE}/{bucket}/{path}")
    }

    async fn remove(
        &self,
        caller: &Caller,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        state.authorize(caller)?;
        for path in paths {
            state.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, BackendError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidRequest(format!(
            "row must be a JSON object, got {other}"
        ))),
    }
}

// Server-side defaults the hosted tables provide.
fn with_generated_columns(row: Value) -> Result<Value, BackendError> {
    let mut map = into_object(row)?;
    map.entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    map.entry("created_at")
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    Ok(Value::Object(map))
}

fn merge(row: &mut Value, patch: &Map<String, Value>) {
    if let Value::Object(fields) = row {
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
    }
}
