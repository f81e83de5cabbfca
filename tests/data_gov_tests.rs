use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use mandi_price_sync::config::UpstreamConfig;
use mandi_price_sync::error::SyncError;
use mandi_price_sync::services::data_gov::{DataGovService, PriceFeed};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Stand-in for the data.gov.in resource endpoint
struct FakeUpstream {
    rows: Vec<Value>,
    report_total: bool,
    /// (offset, limit, arrival date filter) of each request served
    requests: Mutex<Vec<(usize, usize, String)>>,
}

async fn resource(
    State(upstream): State<Arc<FakeUpstream>>,
    Path(resource_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if resource_id == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded").into_response();
    }

    let number = |name: &str| {
        params
            .get(name)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0)
    };
    let offset = number("offset");
    let limit = number("limit");
    let date = params.get("filters[arrival_date]").cloned().unwrap_or_default();
    upstream.requests.lock().push((offset, limit, date));

    let page: Vec<Value> = upstream.rows.iter().skip(offset).take(limit).cloned().collect();
    let mut body = json!({ "status": "ok", "count": page.len(), "records": page });
    if upstream.report_total {
        body["total"] = json!(upstream.rows.len());
    }
    Json(body).into_response()
}

async fn spawn_upstream(rows: usize, report_total: bool) -> (String, Arc<FakeUpstream>) {
    let upstream = Arc::new(FakeUpstream {
        rows: (0..rows)
            .map(|i| {
                json!({"state": "Punjab", "market": format!("Market {}", i), "modal_price": "1900"})
            })
            .collect(),
        report_total,
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/resource/{id}", get(resource))
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), upstream)
}

fn service(base_url: &str, resource_id: &str, page_limit: u32, max_pages: u32) -> DataGovService {
    DataGovService::new(UpstreamConfig {
        base_url: base_url.to_string(),
        resource_id: resource_id.to_string(),
        api_key: "test-key".to_string(),
        page_limit,
        max_pages,
        timeout_secs: 5,
    })
    .unwrap()
}

fn jan_10() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

#[tokio::test]
async fn test_paging_stops_at_reported_total() {
    let (base_url, upstream) = spawn_upstream(4, true).await;

    let rows = service(&base_url, "prices", 2, 10)
        .fetch_rows(jan_10())
        .await
        .unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3]["market"], "Market 3");
    let requests = upstream.requests.lock().clone();
    assert_eq!(
        requests,
        vec![
            (0, 2, "10/01/2024".to_string()),
            (2, 2, "10/01/2024".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_paging_stops_on_short_page() {
    let (base_url, upstream) = spawn_upstream(5, false).await;

    let rows = service(&base_url, "prices", 2, 10)
        .fetch_rows(jan_10())
        .await
        .unwrap();

    assert_eq!(rows.len(), 5);
    let offsets: Vec<usize> = upstream.requests.lock().iter().map(|r| r.0).collect();
    assert_eq!(offsets, vec![0, 2, 4]);
}

#[tokio::test]
async fn test_paging_respects_page_cap() {
    let (base_url, upstream) = spawn_upstream(10, true).await;

    let rows = service(&base_url, "prices", 2, 3)
        .fetch_rows(jan_10())
        .await
        .unwrap();

    assert_eq!(rows.len(), 6);
    assert_eq!(upstream.requests.lock().len(), 3);
}

#[tokio::test]
async fn test_server_error_is_upstream_unavailable() {
    let (base_url, _upstream) = spawn_upstream(0, true).await;

    let err = service(&base_url, "broken", 2, 10)
        .fetch_rows(jan_10())
        .await
        .unwrap_err();

    assert!(
        matches!(err, SyncError::UpstreamUnavailable(ref msg) if msg.contains("500") && msg.contains("backend exploded"))
    );
}

#[tokio::test]
async fn test_unreachable_upstream_is_upstream_unavailable() {
    // Bind then drop so nothing listens on the port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = service(&format!("http://{}", addr), "prices", 2, 10)
        .fetch_rows(jan_10())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::UpstreamUnavailable(_)));
}
