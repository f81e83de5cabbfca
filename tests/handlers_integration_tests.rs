mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mandi_price_sync::handlers;
use mandi_price_sync::services::data_gov::PriceFeed;
use mandi_price_sync::services::price_store::{MemoryPriceStore, PriceStore};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::common::{
    build_state, example_feed, row, setup_test_db, FailingFeed, FailingStore, StaticFeed,
};

struct TestApp {
    router: Router,
    store: Arc<MemoryPriceStore>,
    _dir: TempDir,
}

async fn test_app(feed: Arc<dyn PriceFeed>, token: Option<&str>) -> TestApp {
    let (db, dir) = setup_test_db().await.expect("Failed to set up test DB");
    let store = Arc::new(MemoryPriceStore::new());
    let state = build_state(db, feed, store.clone(), token);

    TestApp {
        router: handlers::router(state),
        store,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_http_sync_returns_counts() {
    let app = test_app(Arc::new(StaticFeed(example_feed())), None).await;

    let (status, json) = send(&app.router, post("/api/sync/mandi-prices?date=2024-01-10")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["date"], "2024-01-10");
    assert_eq!(json["fetched"], 2);
    assert_eq!(json["written"], 1);
    assert_eq!(json["rejected"], 1);
    assert_eq!(json["write_failed"], 0);
    // The only rejection is a state outside the allow-list, which is counted
    // but not itemised
    assert_eq!(json["errors"].as_array().unwrap().len(), 0);
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_one_malformed_row_among_valid_rows() {
    let mut feed = vec![
        row("Punjab", "Ludhiana", "Wheat", (1800, 1900, 2000)),
        row("Punjab", "Khanna", "Wheat", (1800, 1900, 2000)),
        row("Punjab", "Jagraon", "Wheat", (1800, 1900, 2000)),
    ];
    feed.push(serde_json::json!({"state": "Punjab", "commodity": "Wheat", "modal_price": "1900"}));
    let app = test_app(Arc::new(StaticFeed(feed)), None).await;

    let (status, json) = send(&app.router, post("/api/sync/mandi-prices")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["written"], 3);
    assert_eq!(json["rejected"], 1);
    assert!(json["errors"][0].as_str().unwrap().contains("market"));
}

#[tokio::test]
async fn test_http_sync_upstream_failure_is_bad_gateway() {
    let app = test_app(Arc::new(FailingFeed), None).await;

    let (status, json) = send(&app.router, post("/api/sync/mandi-prices")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["success"], false);
    assert!(json["date"].is_string());
    assert_eq!(json["written"], 0);
    assert!(json["errors"][0].as_str().unwrap().contains("upstream unavailable"));
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_http_sync_all_writes_failed_is_server_error() {
    let (db, _dir) = setup_test_db().await.expect("Failed to set up test DB");
    let store: Arc<dyn PriceStore> = Arc::new(FailingStore);
    let state = build_state(db, Arc::new(StaticFeed(example_feed())), store, None);
    let router = handlers::router(state);

    let (status, json) = send(&router, post("/api/sync/mandi-prices?date=2024-01-10")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["date"], "2024-01-10");
    assert_eq!(json["written"], 0);
    assert_eq!(json["write_failed"], 1);
    assert!(json["errors"][0].as_str().unwrap().contains("disk full"));

    // Recorded as a failed attempt, not a success
    let (_, json) = send(&router, get("/api/sync/status")).await;
    assert_eq!(json[0]["job_name"], "mandi_price_sync_manual");
    assert_eq!(json[0]["success_count"], 0);
    assert_eq!(json[0]["error_count"], 1);
}

#[tokio::test]
async fn test_http_sync_rejects_bad_date() {
    let app = test_app(Arc::new(StaticFeed(example_feed())), None).await;

    let (status, json) = send(&app.router, post("/api/sync/mandi-prices?date=tomorrow")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_http_sync_requires_token_when_configured() {
    let app = test_app(Arc::new(StaticFeed(example_feed())), Some("s3cret")).await;

    let (status, json) = send(&app.router, post("/api/sync/mandi-prices?date=2024-01-10")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["date"], "2024-01-10");
    assert!(app.store.is_empty());

    let request = Request::builder()
        .method("POST")
        .uri("/api/sync/mandi-prices")
        .header("x-sync-token", "s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["written"], 1);
}

#[tokio::test]
async fn test_prices_listing_reflects_latest_sync() {
    let app = test_app(Arc::new(StaticFeed(example_feed())), None).await;

    let (_, json) = send(&app.router, get("/api/prices?state=Punjab")).await;
    assert_eq!(json["count"], 0);

    send(&app.router, post("/api/sync/mandi-prices")).await;

    // The sync clears the cached empty result
    let (status, json) = send(&app.router, get("/api/prices?state=Punjab")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["prices"][0]["market"], "Ludhiana");
    assert_eq!(json["prices"][0]["price_date"], "2024-01-10");
}

#[tokio::test]
async fn test_sync_status_and_health() {
    let app = test_app(Arc::new(StaticFeed(example_feed())), None).await;
    send(&app.router, post("/api/sync/mandi-prices")).await;

    let (status, json) = send(&app.router, get("/api/sync/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["job_name"], "mandi_price_sync_manual");
    assert_eq!(json[0]["success_count"], 1);

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
