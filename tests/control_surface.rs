//! Integration tests for the HTTP control surface, driven directly against
//! the `axum::Router` via `tower::ServiceExt::oneshot` (no socket bind).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use txcost_sim::config::Config;
use txcost_sim::simulator::Simulator;
use txcost_sim::{api, wire::Snapshot};

fn app() -> axum::Router {
    let simulator = Simulator::new(Config::default());
    simulator.start();
    api::router(simulator)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_running_status() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["running"], true);
}

#[tokio::test]
async fn get_parameters_echoes_defaults() {
    let response = app()
        .oneshot(Request::builder().uri("/api/parameters").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["exchange"], "OKX");
    assert_eq!(body["fee_tier"], "VIP0");
}

#[tokio::test]
async fn post_parameters_rejects_unknown_name() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/parameters")
        .header("content-type", "application/json")
        .body(Body::from(json!({"name": "leverage", "value": 5}).to_string()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_parameters_updates_quantity() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/parameters")
        .header("content-type", "application/json")
        .body(Body::from(json!({"name": "quantity", "value": 250.0}).to_string()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "quantity");
    assert_eq!(body["value"], 250.0);
}

#[tokio::test]
async fn results_reflect_ingested_snapshot() {
    let simulator = Simulator::new(Config::default());
    simulator.start();

    let snapshot = Snapshot {
        timestamp: "2024-01-01T00:00:00Z".to_string(),
        exchange: "OKX".to_string(),
        symbol: "BTC-USDT".to_string(),
        asks: vec![("50000".to_string(), "1".to_string()), ("50010".to_string(), "2".to_string())],
        bids: vec![("49990".to_string(), "1.5".to_string()), ("49980".to_string(), "2.5".to_string())],
    };
    simulator.on_snapshot(&snapshot);

    let app = api::router(simulator);
    let response = app
        .oneshot(Request::builder().uri("/api/results").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // No batch boundary has been crossed yet, so the orderbook summary is
    // still unset: only `on_snapshot`'s periodic full simulation publishes it.
    assert!(body["orderbook_summary"]["mid"].is_null());
}

#[tokio::test]
async fn performance_report_exposes_benchmark_and_book_sections() {
    let response = app()
        .oneshot(Request::builder().uri("/api/performance").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body.get("benchmark").is_some());
    assert!(body.get("book").is_some());
    assert_eq!(body["tick_count"], 0);
}
