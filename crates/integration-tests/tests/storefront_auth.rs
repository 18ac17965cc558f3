//! Integration tests for sign-up, sign-in and the session check.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use boardquest_integration_tests::TestApp;
use boardquest_storefront::backend::MemoryBackend;
use boardquest_storefront::catalog::SyncPolicy;

// ============================================================================
// Sign-up
// ============================================================================

#[tokio::test]
async fn test_sign_up_signs_in() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client
        .post_json(
            "/auth/signup",
            &json!({ "email": "ana@example.com", "password": "secret1", "username": "ana" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.notice(), "Account created successfully");
    assert_eq!(response.body["user"]["username"], "ana");
    assert_eq!(response.body["is_admin"], false);

    let session = client.get("/auth/session").await;
    assert_eq!(session.body["user"]["email"], "ana@example.com");
}

#[tokio::test]
async fn test_sign_up_waiting_for_confirmation() {
    let app = TestApp::with_backend(
        MemoryBackend::new().require_email_confirmation(),
        SyncPolicy::Refetch,
    );
    let mut client = app.client();

    let response = client
        .post_json(
            "/auth/signup",
            &json!({ "email": "ana@example.com", "password": "secret1", "username": "ana" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.notice(), "Check your email to confirm your account");
    assert_eq!(response.body["user"], Value::Null);
    assert_eq!(client.get("/auth/session").await.body["user"], Value::Null);
}

#[tokio::test]
async fn test_sign_up_input_errors() {
    let app = TestApp::new();
    let mut client = app.client();

    let weak = client
        .post_json(
            "/auth/signup",
            &json!({ "email": "ana@example.com", "password": "12345", "username": "ana" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(weak.notice(), "Password must be at least 6 characters");

    let nameless = client
        .post_json(
            "/auth/signup",
            &json!({ "email": "ana@example.com", "password": "secret1", "username": " " }),
        )
        .await;
    assert_eq!(nameless.status, StatusCode::BAD_REQUEST);
    assert_eq!(nameless.notice(), "Username is required");

    let bad_email = client
        .post_json(
            "/auth/signup",
            &json!({ "email": "ana", "password": "secret1", "username": "ana" }),
        )
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_email.notice(), "Invalid email address");
}

#[tokio::test]
async fn test_duplicate_sign_up_is_rejected() {
    let app = TestApp::new();
    app.client().sign_up("ana@example.com", "secret1", "ana").await;

    let response = app
        .client()
        .post_json(
            "/auth/signup",
            &json!({ "email": "ana@example.com", "password": "secret1", "username": "ana" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.notice(), "User already registered");
}

// ============================================================================
// Sign-in / Sign-out
// ============================================================================

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.client().sign_up("ana@example.com", "secret1", "ana").await;

    let response = app.client().sign_in("ana@example.com", "not-it").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.notice(), "Invalid email or password");
}

#[tokio::test]
async fn test_sign_in_then_sign_out() {
    let app = TestApp::new();
    app.client().sign_up("ana@example.com", "secret1", "ana").await;
    let mut client = app.client();

    let response = client.sign_in("ana@example.com", "secret1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.notice(), "Signed in successfully");
    assert_eq!(response.body["user"]["email"], "ana@example.com");

    let response = client.post_json("/auth/signout", &json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"], Value::Null);

    let session = client.get("/auth/session").await;
    assert_eq!(session.body["user"], Value::Null);
    assert_eq!(session.body["cart_count"], 0);
}

// ============================================================================
// Session Check
// ============================================================================

#[tokio::test]
async fn test_session_check_picks_up_admin_grant() {
    let app = TestApp::new();
    let mut client = app.client();
    let user_id = client.sign_up("boss@example.com", "secret1", "boss").await;
    assert_eq!(client.get("/auth/session").await.body["is_admin"], false);

    app.grant_admin(&user_id).await;

    let session = client.get("/auth/session").await;
    assert_eq!(session.body["is_admin"], true);
    assert_eq!(session.body["user"]["is_admin"], true);
}

#[tokio::test]
async fn test_anonymous_session() {
    let app = TestApp::new();
    let session = app.client().get("/auth/session").await;
    assert_eq!(session.status, StatusCode::OK);
    assert_eq!(session.body["user"], Value::Null);
    assert_eq!(session.body["is_admin"], false);
}
