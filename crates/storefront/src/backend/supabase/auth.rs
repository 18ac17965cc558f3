//! GoTrue (`auth/v1`) endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use boardquest_core::{Email, UserId};

use super::SupabaseClient;
use crate::backend::{
    AuthSession, AuthUser, BackendError, Caller, IdentityProvider, SignUpOutcome,
};

#[derive(Debug, Deserialize)]
struct RawUser {
    id: UserId,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    expires_at: Option<i64>,
    user: RawUser,
}

impl From<RawUser> for AuthUser {
    fn from(raw: RawUser) -> Self {
        Self {
            id: raw.id,
            email: raw.email,
            username: raw.user_metadata.username,
        }
    }
}

impl From<TokenResponse> for AuthSession {
    fn from(raw: TokenResponse) -> Self {
        let expires_at = raw
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(raw.expires_in));
        Self {
            access_token: SecretString::from(raw.access_token),
            refresh_token: SecretString::from(raw.refresh_token),
            expires_at,
            user: raw.user.into(),
        }
    }
}

/// Sign-up answers with a session when the account is usable immediately
/// and with the bare user when email confirmation is pending.
fn parse_sign_up(value: Value) -> Result<SignUpOutcome, BackendError> {
    if value.get("access_token").is_some() {
        let session: AuthSession = serde_json::from_value::<TokenResponse>(value)?.into();
        Ok(SignUpOutcome {
            user: session.user.clone(),
            session: Some(session),
        })
    } else {
        let user = value.get("user").cloned().unwrap_or(value);
        Ok(SignUpOutcome {
            user: serde_json::from_value::<RawUser>(user)?.into(),
            session: None,
        })
    }
}

// GoTrue reports bad credentials as 400 invalid_grant rather than 401.
fn credentials_rejected(err: BackendError) -> BackendError {
    match err {
        BackendError::Api { status: 400, message } => BackendError::Unauthorized(message),
        other => other,
    }
}

impl SupabaseClient {
    fn token_url(&self, grant_type: &str) -> Result<url::Url, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        username: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let url = self.endpoint("auth/v1/signup")?;
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "data": { "username": username },
        });
        let value: Value = self
            .send_json(self.request(Method::POST, url, &Caller::Anonymous).json(&body))
            .await?;
        let outcome = parse_sign_up(value)?;
        tracing::info!(user_id = %outcome.user.id, confirmed = outcome.session.is_some(), "User signed up");
        Ok(outcome)
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let url = self.token_url("password")?;
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
        });
        let response: TokenResponse = self
            .send_json(self.request(Method::POST, url, &Caller::Anonymous).json(&body))
            .await
            .map_err(credentials_rejected)?;
        Ok(response.into())
    }

    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
        let url = self.endpoint("auth/v1/logout")?;
        let caller = Caller::User(access_token.clone());
        self.send(self.request(Method::POST, url, &caller)).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &SecretString) -> Result<AuthUser, BackendError> {
        let url = self.endpoint("auth/v1/user")?;
        let caller = Caller::User(access_token.clone());
        let user: RawUser = self
            .send_json(self.request(Method::GET, url, &caller))
            .await?;
        Ok(user.into())
    }

    async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let url = self.token_url("refresh_token")?;
        let body = json!({ "refresh_token": refresh_token.expose_secret() });
        let response: TokenResponse = self
            .send_json(self.request(Method::POST, url, &Caller::Anonymous).json(&body))
            .await
            .map_err(credentials_rejected)?;
        Ok(response.into())
    }
}
