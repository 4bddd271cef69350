use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use transit_fleet_engine::crowd::{CrowdLevel, CrowdObservation};
use transit_fleet_engine::eta::{EtaResult, PredictorSource};
use transit_fleet_engine::telemetry::{DistanceEtaRequest, EtaRequest, PositionUpdate};
use transit_fleet_engine::FleetEngine;

const NO_COUNT: &str = "no occupancy count supplied";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FleetEngine>,
    pub timezone: Tz,
    pub default_vehicle_id: String,
}

impl AppState {
    fn vehicle_or_default(&self, vehicle_id: Option<String>) -> String {
        vehicle_id.unwrap_or_else(|| self.default_vehicle_id.clone())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/api/v1/location", post(update_location))
        .route("/api/v1/eta", post(calculate_eta))
        .route("/api/v1/eta/predict", get(predict_eta))
        .route("/api/v1/crowd", post(analyze_crowd))
        .route("/api/v1/status", get(fleet_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn home() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "online",
        "message": "Fleet state engine is running",
    }))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[derive(Debug, Serialize, Deserialize)]
struct LocationAck {
    status: String,
    server_time: f64,
}

async fn update_location(
    State(state): State<AppState>,
    Json(ping): Json<PositionUpdate>,
) -> impl IntoResponse {
    state.engine.ingest_position(&ping);
    Json(LocationAck {
        status: "synced".to_string(),
        server_time: ping.timestamp,
    })
}

#[derive(Debug, Deserialize)]
struct EtaCall {
    #[serde(default)]
    vehicle_id: Option<String>,
    #[serde(flatten)]
    request: EtaRequest,
}

async fn calculate_eta(
    State(state): State<AppState>,
    Json(call): Json<EtaCall>,
) -> Json<EtaResult> {
    let vehicle_id = state.vehicle_or_default(call.vehicle_id);
    Json(state.engine.request_eta(&vehicle_id, &call.request))
}

#[derive(Debug, Deserialize)]
struct PredictParams {
    distance_meters: f64,
    current_speed_kmh: f64,
    vehicle_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PredictResponse {
    prediction: String,
    seconds: f64,
    source: PredictorSource,
    status: String,
    delay_minutes: i32,
}

async fn predict_eta(
    State(state): State<AppState>,
    Query(params): Query<PredictParams>,
) -> Json<PredictResponse> {
    let vehicle_id = state.vehicle_or_default(params.vehicle_id);
    let hour_of_day = Utc::now().with_timezone(&state.timezone).hour();

    let result = state.engine.request_predicted_eta(
        &vehicle_id,
        &DistanceEtaRequest {
            distance_meters: params.distance_meters,
            current_speed_kmh: params.current_speed_kmh,
            hour_of_day,
        },
    );

    Json(PredictResponse {
        prediction: format!("{:.2} mins", result.eta_minutes),
        seconds: result.eta_minutes * 60.0,
        source: state.engine.eta_engine().predictor_source(),
        status: result.status,
        delay_minutes: result.delay_minutes,
    })
}

#[derive(Debug, Deserialize)]
struct CrowdCall {
    #[serde(default)]
    vehicle_id: Option<String>,
    #[serde(default)]
    count: Option<u32>,
    /// Set by the camera collaborator when it could not produce a count.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CrowdResponse {
    people_count: u32,
    crowd_level: CrowdLevel,
    confidence: f64,
    legacy_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn analyze_crowd(
    State(state): State<AppState>,
    Json(call): Json<CrowdCall>,
) -> Json<CrowdResponse> {
    let vehicle_id = state.vehicle_or_default(call.vehicle_id);
    let observation = match (call.count, call.error) {
        (_, Some(reason)) => CrowdObservation::Unavailable { reason },
        (Some(count), None) => CrowdObservation::Count(count),
        (None, None) => CrowdObservation::Unavailable {
            reason: NO_COUNT.to_string(),
        },
    };

    let result = state.engine.observe_crowd(&vehicle_id, &observation);
    Json(CrowdResponse {
        people_count: result.count,
        crowd_level: result.level,
        confidence: result.confidence,
        legacy_label: result.legacy_label().to_string(),
        error: result.error,
    })
}

async fn fleet_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.engine.snapshot();
    (
        [("x-fleet-version", snapshot.version.to_string())],
        Json(snapshot.vehicles),
    )
}
