//! Axum-based HTTP API with OpenAPI (utoipa) and Swagger UI

use crate::error::ChargeLogError;
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::{ChargingLogRecord, OpenSessionRow};
use crate::pricing::{ChargingInterval, PricingResult, TariffWindow};
use crate::session::{ChargeLog, CompanyTariff, FinishRequest, SessionSummary, StartRequest};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub log: Arc<Mutex<ChargeLog>>,
}

/// Error body `{"error": message}` with a status derived from the error kind
#[derive(Debug)]
pub struct ApiError(pub ChargeLogError);

impl From<ChargeLogError> for ApiError {
    fn from(err: ChargeLogError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            ChargeLogError::TariffNotFound { .. } => StatusCode::NOT_FOUND,
            ChargeLogError::SessionAlreadyOpen { .. } | ChargeLogError::NoOpenSession => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            get_logger("web").error(&format!("Request failed: {}", self.0));
        }
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusBody {
    pub open_session: Option<OpenSessionRow>,

    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub last_home_cost: Option<Decimal>,

    pub currency_symbol: String,

    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VehicleBody {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub battery_capacity_kwh: Decimal,

    /// Configured full-charge range; ignored on update
    #[serde(default)]
    pub full_range: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuoteBody {
    pub tariff: TariffWindow,

    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub start: NaiveDateTime,

    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub end: NaiveDateTime,
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
)))]
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/status", responses(
    (status = 200, description = "Open session and last home cost", body = StatusBody)
)))]
pub async fn status(State(state): State<AppState>) -> ApiResult<StatusBody> {
    let log = state.log.lock().await;
    Ok(Json(StatusBody {
        open_session: log.open_session().await?,
        last_home_cost: log.last_home_cost(),
        currency_symbol: log.config().pricing.currency_symbol.clone(),
        version: env!("APP_VERSION").to_string(),
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/session/start", request_body = StartRequest, responses(
    (status = 200, body = OpenSessionRow),
    (status = 400, description = "Invalid readings or missing company"),
    (status = 409, description = "A session is already open")
)))]
pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartRequest>,
) -> ApiResult<OpenSessionRow> {
    let log = state.log.lock().await;
    Ok(Json(log.start_session(body).await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/session/preview", request_body = FinishRequest, responses(
    (status = 200, body = SessionSummary),
    (status = 404, description = "No tariff for the session"),
    (status = 409, description = "No open session")
)))]
pub async fn preview_session(
    State(state): State<AppState>,
    Json(body): Json<FinishRequest>,
) -> ApiResult<SessionSummary> {
    let log = state.log.lock().await;
    Ok(Json(log.preview_finish(&body).await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/session/finish", request_body = FinishRequest, responses(
    (status = 200, body = SessionSummary),
    (status = 404, description = "No tariff for the session"),
    (status = 409, description = "No open session")
)))]
pub async fn finish_session(
    State(state): State<AppState>,
    Json(body): Json<FinishRequest>,
) -> ApiResult<SessionSummary> {
    let mut log = state.log.lock().await;
    Ok(Json(log.finish_session(body).await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/history", responses(
    (status = 200, body = Vec<ChargingLogRecord>)
)))]
pub async fn get_history(State(state): State<AppState>) -> ApiResult<Vec<ChargingLogRecord>> {
    let log = state.log.lock().await;
    Ok(Json(log.history().await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(put, path = "/api/history", request_body = Vec<ChargingLogRecord>, responses(
    (status = 200, body = Vec<ChargingLogRecord>)
)))]
pub async fn put_history(
    State(state): State<AppState>,
    Json(rows): Json<Vec<ChargingLogRecord>>,
) -> ApiResult<Vec<ChargingLogRecord>> {
    let log = state.log.lock().await;
    log.replace_history(rows).await?;
    Ok(Json(log.history().await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/prices/home", responses(
    (status = 200, body = TariffWindow, description = "null until a home price is saved")
)))]
pub async fn get_home_price(State(state): State<AppState>) -> ApiResult<Option<TariffWindow>> {
    let log = state.log.lock().await;
    Ok(Json(log.home_tariff().await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(put, path = "/api/prices/home", request_body = TariffWindow, responses(
    (status = 200, body = TariffWindow),
    (status = 400, description = "Negative price")
)))]
pub async fn put_home_price(
    State(state): State<AppState>,
    Json(tariff): Json<TariffWindow>,
) -> ApiResult<TariffWindow> {
    let log = state.log.lock().await;
    log.set_home_tariff(&tariff).await?;
    Ok(Json(tariff))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/prices/public", responses(
    (status = 200, body = Vec<CompanyTariff>)
)))]
pub async fn get_public_prices(State(state): State<AppState>) -> ApiResult<Vec<CompanyTariff>> {
    let log = state.log.lock().await;
    Ok(Json(log.public_tariffs().await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/prices/public", request_body = CompanyTariff, responses(
    (status = 200, body = Vec<CompanyTariff>),
    (status = 400, description = "Missing company or negative price")
)))]
pub async fn post_public_price(
    State(state): State<AppState>,
    Json(entry): Json<CompanyTariff>,
) -> ApiResult<Vec<CompanyTariff>> {
    let log = state.log.lock().await;
    log.upsert_public_tariff(&entry).await?;
    Ok(Json(log.public_tariffs().await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/vehicle", responses(
    (status = 200, body = VehicleBody)
)))]
pub async fn get_vehicle(State(state): State<AppState>) -> ApiResult<VehicleBody> {
    let log = state.log.lock().await;
    Ok(Json(VehicleBody {
        battery_capacity_kwh: log.battery_capacity().await?,
        full_range: Some(log.config().vehicle.full_range),
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(put, path = "/api/vehicle", request_body = VehicleBody, responses(
    (status = 200, body = VehicleBody),
    (status = 400, description = "Negative capacity")
)))]
pub async fn put_vehicle(
    State(state): State<AppState>,
    Json(body): Json<VehicleBody>,
) -> ApiResult<VehicleBody> {
    let log = state.log.lock().await;
    log.set_battery_capacity(body.battery_capacity_kwh).await?;
    Ok(Json(VehicleBody {
        battery_capacity_kwh: body.battery_capacity_kwh,
        full_range: Some(log.config().vehicle.full_range),
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/quote", request_body = QuoteBody, responses(
    (status = 200, body = PricingResult),
    (status = 400, description = "Invalid tariff or interval")
)))]
pub async fn quote(
    State(state): State<AppState>,
    Json(body): Json<QuoteBody>,
) -> ApiResult<PricingResult> {
    let interval = ChargingInterval::new(body.start, body.end)?;
    let log = state.log.lock().await;
    Ok(Json(log.quote(&body.tariff, &interval)?))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        health, status, start_session, preview_session, finish_session,
        get_history, put_history, get_home_price, put_home_price,
        get_public_prices, post_public_price, get_vehicle, put_vehicle, quote,
    ),
    components(schemas(
        StatusBody, VehicleBody, QuoteBody, StartRequest, FinishRequest, SessionSummary,
        CompanyTariff, TariffWindow, PricingResult, ChargingLogRecord, OpenSessionRow,
    )),
    tags((name = "chargelog", description = "Chargelog charging log API"))
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/session/start", post(start_session))
        .route("/api/session/preview", post(preview_session))
        .route("/api/session/finish", post(finish_session))
        .route("/api/history", get(get_history).put(put_history))
        .route("/api/prices/home", get(get_home_price).put(put_home_price))
        .route("/api/prices/public", get(get_public_prices).post(post_public_price))
        .route("/api/vehicle", get(get_vehicle).put(put_vehicle))
        .route("/api/quote", post(quote));

    #[cfg(feature = "openapi")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()),
        )
    };

    let router = router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    #[cfg(feature = "compression")]
    let router = router.layer(tower_http::compression::CompressionLayer::new());

    router
}

/// Bind a listener, falling back to loopback when the host does not parse
pub async fn bind(host: &str, port: u16, logger: &StructuredLogger) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };
    logger.info(&format!("Binding to {}:{}", addr.ip(), addr.port()));
    Ok(TcpListener::bind(addr).await?)
}

pub async fn serve(log: Arc<Mutex<ChargeLog>>, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(AppState { log });

    let logger = get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let listener = bind(host, port, &logger).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api, docs /docs)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}
