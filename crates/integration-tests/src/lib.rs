//! Integration tests for the Board Quest storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p boardquest-integration-tests
//! ```
//!
//! The tests drive the real router in-process with
//! [`tower::ServiceExt::oneshot`] against the in-memory backend, so no
//! Supabase project or network is needed.
//!
//! # Test Categories
//!
//! - `storefront_cart` - Cart rules through the HTTP API
//! - `storefront_auth` - Sign-up, sign-in, sign-out and session checks
//! - `storefront_admin` - Admin gate, product and main content editors
//! - `storefront_catalog` - Live catalog following table changes

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use boardquest_storefront::backend::tables::{ADMIN_USERS, PRODUCTS};
use boardquest_storefront::backend::{Backend, Caller, MemoryBackend, TableStore};
use boardquest_storefront::catalog::SyncPolicy;
use boardquest_storefront::config::{BackendConfig, StorefrontConfig};
use boardquest_storefront::services::cart_store::{CartStore, MemoryCartStore};
use boardquest_storefront::state::AppState;

const BOUNDARY: &str = "boardquest-test-boundary";

/// Storefront configuration for tests: memory backend, no Sentry.
#[must_use]
pub fn test_config(catalog_sync: SyncPolicy) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        backend: BackendConfig::Memory,
        cart_dir: PathBuf::from("unused"),
        catalog_sync,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A router over a fresh in-memory backend.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub backend: Arc<MemoryBackend>,
    pub carts: Arc<MemoryCartStore>,
}

impl TestApp {
    /// Build with the default (refetch) catalog policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(MemoryBackend::new(), SyncPolicy::Refetch)
    }

    #[must_use]
    pub fn with_backend(backend: MemoryBackend, catalog_sync: SyncPolicy) -> Self {
        let backend = Arc::new(backend);
        let carts = Arc::new(MemoryCartStore::new());
        let state = AppState::new(
            test_config(catalog_sync),
            Backend::from_shared(Arc::clone(&backend)),
            Arc::clone(&carts) as Arc<dyn CartStore>,
        );
        Self {
            router: boardquest_storefront::app(state.clone()),
            state,
            backend,
            carts,
        }
    }

    /// A client with its own cookie, like a separate browser.
    #[must_use]
    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// Insert a product row straight into the store.
    pub async fn seed_product(&self, name: &str, price: &str) -> Value {
        self.backend
            .insert(
                &Caller::Anonymous,
                PRODUCTS,
                json!({ "name": name, "price": price, "description": "" }),
            )
            .await
            .unwrap()
    }

    /// Put a user on the admin allow-list.
    pub async fn grant_admin(&self, user_id: &str) {
        self.backend
            .insert(&Caller::Anonymous, ADMIN_USERS, json!({ "id": user_id }))
            .await
            .unwrap();
    }

    /// A signed-in client whose user is an admin.
    pub async fn admin_client(&self, email: &str) -> TestClient {
        let mut client = self.client();
        let user_id = client.sign_up(email, "secret1", "admin").await;
        self.grant_admin(&user_id).await;
        // The session check re-evaluates the admin gate.
        let session = client.get("/auth/session").await;
        assert_eq!(session.body["is_admin"], true);
        client
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The notice message, on success or error bodies alike.
    #[must_use]
    pub fn notice(&self) -> &str {
        self.body["notice"]["message"].as_str().unwrap_or_default()
    }
}

/// Sends requests through the router, carrying the session cookie.
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
}

impl TestClient {
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse { status, body }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&mut self, uri: &str, body: &Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_multipart(&mut self, uri: &str, form: &MultipartForm) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(form.encode()))
                .unwrap(),
        )
        .await
    }

    /// Sign up (signed in right away) and return the new user's id.
    pub async fn sign_up(&mut self, email: &str, password: &str, username: &str) -> String {
        let response = self
            .post_json(
                "/auth/signup",
                &json!({ "email": email, "password": password, "username": username }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["user"]["id"].as_str().unwrap().to_string()
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/auth/signin",
            &json!({ "email": email, "password": password }),
        )
        .await
    }
}

/// A multipart body under construction.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: Vec<(String, String)>,
    file: Option<(String, String, Vec<u8>)>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    /// Attach the `image` file part.
    #[must_use]
    pub fn image(mut self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        self.file = Some((file_name.to_string(), content_type.to_string(), bytes));
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in &self.fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = &self.file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
