use axum::http::{Request, StatusCode, header};
use chargelog::export::build_router;
use chargelog::persistence::{BlobStore, ChargingLogRecord, MemoryBlobStore, Table};
use std::sync::Arc;
use tower::ServiceExt;

async fn get(store: Arc<dyn BlobStore>, uri: &str) -> axum::response::Response {
    build_router(store)
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn missing_log_is_404() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let response = get(store, "/export/log").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn log_is_served_as_csv_attachment() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let csv = format!(
        "{}\n2024-03-01 22:00:00,2024-03-02 06:00:00,8,Home,,20,80,,,38.4,0.0923,3.54\n",
        ChargingLogRecord::COLUMNS.join(",")
    );
    store
        .put(ChargingLogRecord::KEY, csv.clone().into_bytes())
        .await
        .unwrap();

    let response = get(store, "/export/log").await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=charging_log.csv"
    );
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body, csv.as_bytes());
}

#[tokio::test]
async fn health_is_exposed() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let response = get(store, "/api/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}
