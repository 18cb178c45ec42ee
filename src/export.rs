//! Download service for the raw charging log

use crate::logging::get_logger;
use crate::persistence::{BlobStore, ChargingLogRecord, Table};
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct ExportState {
    pub store: Arc<dyn BlobStore>,
}

/// The stored `charging_log.csv`, byte for byte
pub async fn export_log(State(state): State<ExportState>) -> Response {
    let key = ChargingLogRecord::KEY;
    match state.store.get(key).await {
        Ok(Some(bytes)) => {
            let mut resp = Response::new(bytes.into());
            let headers = resp.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=charging_log.csv"),
            );
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            resp
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Charging log not available").into_response(),
        Err(e) => {
            get_logger("export").error(&format!("Failed to read {}: {}", key, e));
            (StatusCode::INTERNAL_SERVER_ERROR, "Charging log not readable").into_response()
        }
    }
}

pub fn build_router(store: Arc<dyn BlobStore>) -> Router {
    Router::new()
        .route("/export/log", get(export_log))
        .route("/api/health", get(crate::web::health))
        .with_state(ExportState { store })
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(store: Arc<dyn BlobStore>, host: &str, port: u16) -> anyhow::Result<()> {
    let logger = get_logger("export");
    let listener = crate::web::bind(host, port, &logger).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Export service listening at http://{}:{}/export/log",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, build_router(store)).await?;
    Ok(())
}
