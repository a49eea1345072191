/// HTTP API tests driven through the router in-process

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use settlement_engine::{build_router, AppState, EngineConfig};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn app() -> Router {
    app_with(EngineConfig {
        allow_time_override: true,
        ..EngineConfig::default()
    })
}

fn app_with(config: EngineConfig) -> Router {
    let state = AppState::ephemeral(config).unwrap().shared();
    build_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn call(app: &Router, caller: &str, timestamp: u64, command: Value) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/rpc/call",
        Some(json!({ "caller": caller, "timestamp": timestamp, "command": command })),
    )
    .await
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["markets"], 0);
    assert_eq!(body["settlement_token"], "USDC");
}

#[tokio::test]
async fn test_call_returns_receipt_and_query_sees_it() {
    let app = app();

    let (status, receipt) = call(
        &app,
        "owner",
        1_000,
        json!({ "method": "mint", "params": { "token": "USDC", "to": "alice", "amount": 500 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(receipt["tx_id"].as_str().unwrap().starts_with("tx_"));
    assert_eq!(receipt["output"], "done");
    assert_eq!(receipt["events"][0]["event"]["name"], "Minted");
    assert_eq!(receipt["events"][0]["seq"], 0);

    let (status, body) = send(
        &app,
        "POST",
        "/rpc/query",
        Some(json!({ "query": "balance", "params": { "token": "USDC", "account": "alice" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["amount"], 500);
}

#[tokio::test]
async fn test_rejected_call_maps_error_class_to_status() {
    let app = app();

    let (status, body) = call(
        &app,
        "mallory",
        1_000,
        json!({ "method": "mint", "params": { "token": "USDC", "to": "mallory", "amount": 1 } }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "Unauthorized");
    assert_eq!(body["class"], "authorization");

    let (status, body) = call(
        &app,
        "owner",
        1_000,
        json!({ "method": "set_fee_split", "params": { "split": {
            "lp_bps": 5000, "promo_bps": 2000, "insurance_bps": 1000, "treasury_bps": 1000
        } } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "InvalidFeeSplit");
}

#[tokio::test]
async fn test_market_round_trip_over_http() {
    let app = app();

    let (status, body) = call(
        &app,
        "owner",
        1_000,
        json!({ "method": "create_market", "params": { "params": {
            "outcome_count": 2,
            "lock_timestamp": 2000,
            "dispute_period": 100,
            "fee_rate": 200,
            "fee_recipient": "house",
            "settlement_token": "USDC"
        } } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"]["market_created"]["market_id"], 1);

    let (status, body) = send(
        &app,
        "POST",
        "/rpc/query?at=1000",
        Some(json!({ "query": "is_locked", "params": { "market_id": 1 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["locked"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/rpc/query?at=2000",
        Some(json!({ "query": "is_locked", "params": { "market_id": 1 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["locked"], true);

    let (status, body) = send(
        &app,
        "POST",
        "/rpc/query",
        Some(json!({ "query": "market", "params": { "market_id": 9 } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "MarketNotFound");

    let (status, body) = send(&app, "GET", "/events?from=0&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["events"][0]["event"]["name"], "MarketCreated");
}

#[tokio::test]
async fn test_unknown_method_is_rejected_before_dispatch() {
    let app = app();
    let (status, _) = call(&app, "owner", 1_000, json!({ "method": "self_destruct" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = send(&app, "GET", "/events", None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_timestamp_override_needs_opt_in() {
    let app = app_with(EngineConfig::default());

    let (status, body) = call(
        &app,
        "owner",
        1_000,
        json!({ "method": "mint", "params": { "token": "USDC", "to": "alice", "amount": 5 } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "TimestampOverrideDisabled");

    let (status, _) = send(
        &app,
        "POST",
        "/rpc/call",
        Some(json!({
            "caller": "owner",
            "command": { "method": "mint", "params": { "token": "USDC", "to": "alice", "amount": 5 } }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/events", None).await;
    assert_eq!(body["total"], 1);
}
