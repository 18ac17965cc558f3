//! Integration tests for the live catalog following table changes.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use boardquest_integration_tests::{TestApp, eventually};
use boardquest_storefront::backend::tables::{MAIN_CONTENT, PRODUCTS};
use boardquest_storefront::backend::{Caller, MemoryBackend, Query, TableStore};
use boardquest_storefront::catalog::SyncPolicy;

async fn started(policy: SyncPolicy) -> TestApp {
    let app = TestApp::with_backend(MemoryBackend::new(), policy);
    app.state.start_catalog_sync();
    eventually(|| async { app.state.catalog().is_ready() }).await;
    assert_eq!(app.client().get("/health/ready").await.status, StatusCode::OK);
    app
}

async fn product_names(app: &TestApp) -> Vec<String> {
    app.state
        .catalog()
        .products()
        .await
        .into_iter()
        .map(|p| p.name)
        .collect()
}

#[tokio::test]
async fn test_not_ready_before_first_load() {
    let app = TestApp::new();
    let response = app.client().get("/health/ready").await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.client().get("/health").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refetch_reflects_outside_insert() {
    let app = started(SyncPolicy::Refetch).await;
    assert!(product_names(&app).await.is_empty());

    // A write that did not go through this instance's handlers.
    app.seed_product("Catan", "10.00").await;

    eventually(|| async { product_names(&app).await == ["Catan"] }).await;
    let listing = app.client().get("/products").await;
    assert_eq!(listing.body["products"][0]["name"], "Catan");
}

#[tokio::test]
async fn test_merge_applies_insert_update_delete() {
    let app = started(SyncPolicy::Merge).await;

    let catan = app.seed_product("Catan", "10.00").await;
    app.seed_product("Dice", "5.50").await;
    eventually(|| async { product_names(&app).await == ["Dice", "Catan"] }).await;

    app.backend
        .update(
            &Caller::Anonymous,
            PRODUCTS,
            &Query::new().eq("id", catan["id"].as_str().unwrap()),
            json!({ "name": "Catan Deluxe" }),
        )
        .await
        .unwrap();
    eventually(|| async { product_names(&app).await == ["Dice", "Catan Deluxe"] }).await;

    app.backend
        .delete(
            &Caller::Anonymous,
            PRODUCTS,
            &Query::new().eq("id", catan["id"].as_str().unwrap()),
        )
        .await
        .unwrap();
    eventually(|| async { product_names(&app).await == ["Dice"] }).await;
}

#[tokio::test]
async fn test_main_content_change_reaches_home() {
    let app = started(SyncPolicy::Refetch).await;
    assert_eq!(
        app.client().get("/").await.body["main_content"],
        serde_json::Value::Null
    );

    app.backend
        .upsert(
            &Caller::Anonymous,
            MAIN_CONTENT,
            json!({
                "big_title": "Board Quest",
                "paragraph": "Games for every table",
                "button_text": "Shop now",
                "hero_image": null,
            }),
        )
        .await
        .unwrap();

    eventually(|| async {
        app.state
            .catalog()
            .main_content()
            .await
            .is_some_and(|c| c.title == "Board Quest")
    })
    .await;
    let home = app.client().get("/").await;
    assert_eq!(home.body["main_content"]["button_text"], "Shop now");
}
