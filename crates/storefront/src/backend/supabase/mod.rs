//! Client for a hosted Supabase project.
//!
//! # APIs
//!
//! - `auth/v1` (GoTrue) - [`IdentityProvider`](super::IdentityProvider)
//! - `rest/v1` (PostgREST) - [`TableStore`](super::TableStore)
//! - `storage/v1` - [`ObjectStore`](super::ObjectStore)
//! - `realtime/v1` websocket - feeds the client's [`ChangeFeed`]
//!
//! Every request carries the project's anon key as `apikey`. Data calls
//! made on behalf of a signed-in user send their access token as the bearer,
//! so row-level security applies; anonymous calls send the anon key.

mod auth;
pub mod realtime;
mod rest;
mod storage;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use super::{BackendError, Caller, ChangeFeed};
use crate::config::SupabaseConfig;

/// Client for the Supabase REST, auth, storage and realtime APIs.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    changes: ChangeFeed,
}

impl SupabaseClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the HTTP client cannot be built.
    pub fn new(config: &SupabaseConfig, changes: ChangeFeed) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("boardquest-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // `Url::join` replaces the last segment unless the base ends in '/'.
        let mut base_url = config.url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                client,
                base_url,
                anon_key: config.anon_key.clone(),
                changes,
            }),
        })
    }

    /// The feed the realtime listener publishes into.
    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.inner.changes
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub(crate) fn anon_key(&self) -> &SecretString {
        &self.inner.anon_key
    }

    /// Resolve a path relative to the project URL.
    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| BackendError::InvalidRequest(format!("bad endpoint {path}: {e}")))
    }

    /// Start a request with the project key and the caller's bearer token.
    fn request(&self, method: Method, url: Url, caller: &Caller) -> RequestBuilder {
        let bearer = caller
            .access_token()
            .unwrap_or_else(|| self.inner.anon_key.expose_secret());
        self.inner
            .client
            .request(method, url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(bearer)
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!(status = %status, message = %message, "Supabase rejected credentials");
                Err(BackendError::Unauthorized(message))
            }
            StatusCode::NOT_FOUND => Err(BackendError::NotFound(message)),
            _ => {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Supabase API returned non-success status"
                );
                Err(BackendError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Send a request and parse the JSON body.
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse Supabase response"
            );
            BackendError::Parse(e)
        })
    }
}

/// Pull a human-readable message out of a Supabase error body.
///
/// PostgREST uses `message`, GoTrue uses `msg` or `error_description`,
/// storage uses `message` or `error`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}
