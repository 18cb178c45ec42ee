#![cfg(test)]

use super::web::*;
use crate::config::Config;
use crate::persistence::{BlobStore, MemoryBlobStore};
use crate::session::ChargeLog;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

fn test_state() -> AppState {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let log = ChargeLog::new(store, Config::default()).unwrap();
    AppState {
        log: Arc::new(Mutex::new(log)),
    }
}

async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn economy_seven() -> serde_json::Value {
    serde_json::json!({
        "peak_start": "00:30:00",
        "peak_end": "04:30:00",
        "price_peak": "0.075",
        "price_off_peak": "0.2451",
        "surcharge": "0"
    })
}

#[tokio::test]
async fn health_ok() {
    let router = axum::Router::new().route("/api/health", get(health));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_without_session() {
    let state = test_state();
    let (status, json) = send(&state, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["open_session"].is_null());
    assert!(json["last_home_cost"].is_null());
    assert_eq!(json["currency_symbol"], "£");
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn home_session_flow_prices_overnight_charge() {
    let state = test_state();

    let (status, _) = send(&state, "PUT", "/api/prices/home", Some(economy_seven())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &state,
        "PUT",
        "/api/vehicle",
        Some(serde_json::json!({"battery_capacity_kwh": 64})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let start = serde_json::json!({
        "location": "Home",
        "start": "2024-05-04T22:00:00",
        "battery_start_percent": 20
    });
    let (status, json) = send(&state, "POST", "/api/session/start", Some(start.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["Timestamp Start"], "2024-05-04 22:00:00");

    let (status, json) = send(&state, "POST", "/api/session/start", Some(start)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("2024-05-04 22:00:00"));

    let finish = serde_json::json!({"end_time": "02:00:00", "battery_end_percent": 80});
    let (status, json) = send(&state, "POST", "/api/session/finish", Some(finish.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["record"]["Timestamp End"], "2024-05-05 02:00:00");
    assert_eq!(json["record"]["Price per kWh"], "0.1813");
    assert_eq!(json["record"]["kWh"], "38.4");
    assert_eq!(json["record"]["Total Cost"], "6.96");
    assert_eq!(json["energy"]["source"], "battery_percent");
    assert_eq!(json["cost"]["source"], "tariff");

    let (status, _) = send(&state, "POST", "/api/session/finish", Some(finish)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = send(&state, "GET", "/api/status", None).await;
    assert!(json["open_session"].is_null());
    assert_eq!(json["last_home_cost"], "6.96");

    let (_, json) = send(&state, "GET", "/api/history", None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn preview_does_not_close_session() {
    let state = test_state();
    send(&state, "PUT", "/api/prices/home", Some(economy_seven())).await;
    send(
        &state,
        "POST",
        "/api/session/start",
        Some(serde_json::json!({"location": "Home", "start": "2024-05-04T01:00:00"})),
    )
    .await;

    let body = serde_json::json!({"end": "2024-05-04T03:00:00", "manual_kwh": 10});
    let (status, json) = send(&state, "POST", "/api/session/preview", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["record"]["Total Cost"], "0.75");

    let (_, json) = send(&state, "GET", "/api/status", None).await;
    assert!(!json["open_session"].is_null());
    let (_, json) = send(&state, "GET", "/api/history", None).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn public_session_needs_company_and_tariff() {
    let state = test_state();

    let (status, json) = send(
        &state,
        "POST",
        "/api/session/start",
        Some(serde_json::json!({"location": "Public", "company": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("company"));

    let (status, _) = send(
        &state,
        "POST",
        "/api/session/start",
        Some(serde_json::json!({"location": "Public", "company": "Ionity", "start": "2024-05-04T10:00:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let finish = serde_json::json!({"end": "2024-05-04T10:40:00", "manual_kwh": 10, "manual_total": 5.5});
    let (status, _) = send(&state, "POST", "/api/session/finish", Some(finish.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let entry = serde_json::json!({"company": "Ionity", "tariff": economy_seven()});
    let (status, json) = send(&state, "POST", "/api/prices/public", Some(entry)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, json) = send(&state, "POST", "/api/session/finish", Some(finish)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["record"]["Price per kWh"], "0.55");
    assert_eq!(json["record"]["Total Cost"], "5.5");
    assert_eq!(json["cost"]["source"], "manual_total");

    let (_, json) = send(&state, "GET", "/api/status", None).await;
    assert!(json["last_home_cost"].is_null());
}

#[tokio::test]
async fn negative_home_price_is_400() {
    let state = test_state();
    let mut tariff = economy_seven();
    tariff["price_peak"] = serde_json::json!("-0.01");
    let (status, json) = send(&state, "PUT", "/api/prices/home", Some(tariff)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("price_peak"));

    let (status, json) = send(&state, "GET", "/api/prices/home", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.is_null());
}

#[tokio::test]
async fn quote_prices_and_rejects_backwards_interval() {
    let state = test_state();
    let body = serde_json::json!({
        "tariff": economy_seven(),
        "start": "2024-05-04T01:00:00",
        "end": "2024-05-04T03:00:00"
    });
    let (status, json) = send(&state, "POST", "/api/quote", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price_per_kwh"], "0.075");

    let body = serde_json::json!({
        "tariff": economy_seven(),
        "start": "2024-05-04T03:00:00",
        "end": "2024-05-04T01:00:00"
    });
    let (status, _) = send(&state, "POST", "/api/quote", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quote_with_oversized_price_is_400() {
    let state = test_state();
    let mut tariff = economy_seven();
    tariff["price_peak"] = serde_json::json!("100000000000000000000");
    let body = serde_json::json!({
        "tariff": tariff,
        "start": "2024-05-04T01:00:00",
        "end": "2024-05-04T03:00:00"
    });
    let (status, json) = send(&state, "POST", "/api/quote", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("price_peak"));
}

#[tokio::test]
async fn vehicle_rejects_negative_capacity() {
    let state = test_state();
    let (status, json) = send(&state, "GET", "/api/vehicle", None).await;
    assert_eq!(status, StatusCode::OK);
    let capacity: rust_decimal::Decimal = json["battery_capacity_kwh"].as_str().unwrap().parse().unwrap();
    assert!(capacity.is_zero());

    let (status, _) = send(
        &state,
        "PUT",
        "/api/vehicle",
        Some(serde_json::json!({"battery_capacity_kwh": -1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let state = test_state();
    let response = build_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/session/start")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{invalid"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn error_status_mapping() {
    use crate::error::ChargeLogError;
    assert_eq!(ApiError(ChargeLogError::zero_energy("x")).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError(ChargeLogError::tariff_not_found("x")).status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError(ChargeLogError::NoOpenSession).status(), StatusCode::CONFLICT);
    assert_eq!(
        ApiError(ChargeLogError::storage("x")).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[cfg(feature = "openapi")]
#[tokio::test]
async fn openapi_document_lists_session_routes() {
    let state = test_state();
    let (status, json) = send(&state, "GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"].get("/api/session/finish").is_some());
}
