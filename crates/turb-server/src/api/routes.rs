//! REST API routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use turb_core::classify::Tunables;
use turb_core::models::{ClassifiedWindow, ResampledTrack};
use turb_core::pipeline::TrackFailure;

use crate::api::control;
use crate::engine::{AnalyticsEngine, EngineState, Generation};

type ApiError = (StatusCode, Json<Value>);

fn no_data() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": "no data yet"})),
    )
}

fn unknown_track(icao24: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("no track {}", icao24)})),
    )
}

fn current(engine: &AnalyticsEngine) -> Result<Arc<Generation>, ApiError> {
    engine.current_generation().ok_or_else(no_data)
}

/// Create the API router.
pub fn create_router() -> Router<Arc<AnalyticsEngine>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/v1/status", get(get_status))
        .route("/v1/tracks", get(list_tracks))
        .route("/v1/tracks/:icao24", get(get_track))
        .route("/v1/turbulence", get(list_turbulence))
        .route("/v1/turbulence/:icao24/chart", get(get_chart))
        .route(
            "/v1/control",
            get(control::get_control).put(control::update_control),
        )
}

#[derive(Debug, Serialize)]
struct GenerationStatus {
    id: u64,
    produced_at: DateTime<Utc>,
    tunables: Tunables,
    tracks: usize,
    windows: usize,
    turbulent_windows: usize,
    rejected_records: usize,
    failures: Vec<TrackFailure>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    state: EngineState,
    source: String,
    tunables: Tunables,
    generation: Option<GenerationStatus>,
}

async fn get_status(State(engine): State<Arc<AnalyticsEngine>>) -> Json<StatusResponse> {
    let generation = engine.current_generation().map(|g| GenerationStatus {
        id: g.id,
        produced_at: g.produced_at,
        tunables: g.tunables,
        tracks: g.dataset.len(),
        windows: g.classified.len(),
        turbulent_windows: g.classified.turbulent().count(),
        rejected_records: g.rejected_records,
        failures: g.failures.clone(),
    });

    Json(StatusResponse {
        state: engine.state().await,
        source: engine.source_description(),
        tunables: engine.control().snapshot(),
        generation,
    })
}

#[derive(Debug, Serialize)]
struct TrackSummary {
    icao24: String,
    callsign: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    samples: usize,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    track: Option<f64>,
    windows: usize,
    turbulent_windows: usize,
}

fn summarize(track: &ResampledTrack, generation: &Generation) -> TrackSummary {
    let last = track.last_position();
    let windows: Vec<&ClassifiedWindow> = generation.classified.for_track(&track.icao24).collect();
    TrackSummary {
        icao24: track.icao24.clone(),
        callsign: track.callsign.clone(),
        start: track.start(),
        end: track.end(),
        samples: track.samples.len(),
        latitude: last.and_then(|s| s.latitude),
        longitude: last.and_then(|s| s.longitude),
        altitude: last.and_then(|s| s.altitude),
        track: last.and_then(|s| s.track()),
        windows: windows.len(),
        turbulent_windows: windows.iter().filter(|w| w.is_turbulent()).count(),
    }
}

/// Latest position and window counts for every resampled track.
async fn list_tracks(
    State(engine): State<Arc<AnalyticsEngine>>,
) -> Result<Json<Vec<TrackSummary>>, ApiError> {
    let generation = current(&engine)?;
    let summaries = generation
        .dataset
        .tracks
        .values()
        .map(|track| summarize(track, &generation))
        .collect();
    Ok(Json(summaries))
}

/// Full 1 Hz series of one track.
async fn get_track(
    State(engine): State<Arc<AnalyticsEngine>>,
    Path(icao24): Path<String>,
) -> Result<Json<ResampledTrack>, ApiError> {
    let generation = current(&engine)?;
    let icao24 = icao24.to_lowercase();
    generation
        .dataset
        .get(&icao24)
        .cloned()
        .map(Json)
        .ok_or_else(|| unknown_track(&icao24))
}

#[derive(Debug, Deserialize)]
struct TurbulenceQuery {
    /// Only windows classified turbulent
    turbulent_only: Option<bool>,
    icao24: Option<String>,
}

async fn list_turbulence(
    State(engine): State<Arc<AnalyticsEngine>>,
    Query(query): Query<TurbulenceQuery>,
) -> Result<Json<Vec<ClassifiedWindow>>, ApiError> {
    let generation = current(&engine)?;
    let icao24 = query.icao24.map(|id| id.to_lowercase());
    let turbulent_only = query.turbulent_only.unwrap_or(false);

    let windows = generation
        .classified
        .windows
        .iter()
        .filter(|w| icao24.as_deref().map_or(true, |id| w.icao24() == id))
        .filter(|w| !turbulent_only || w.is_turbulent())
        .cloned()
        .collect();
    Ok(Json(windows))
}

#[derive(Debug, Serialize)]
struct ChartPoint<T> {
    /// Window start, milliseconds since the epoch
    t: i64,
    y: T,
}

#[derive(Debug, Serialize)]
struct ChartData {
    turbulence: Vec<ChartPoint<bool>>,
    vertical_rate_inertial_std: Vec<ChartPoint<f64>>,
    vertical_rate_barometric_std: Vec<ChartPoint<f64>>,
    criterion: Vec<ChartPoint<f64>>,
    threshold: Vec<ChartPoint<f64>>,
}

fn series(
    windows: &[&ClassifiedWindow],
    value: impl Fn(&ClassifiedWindow) -> Option<f64>,
) -> Vec<ChartPoint<f64>> {
    windows
        .iter()
        .filter_map(|&w| {
            value(w).map(|y| ChartPoint {
                t: w.stats.window_start.timestamp_millis(),
                y,
            })
        })
        .collect()
}

/// Per-window series of one track for charting.
async fn get_chart(
    State(engine): State<Arc<AnalyticsEngine>>,
    Path(icao24): Path<String>,
) -> Result<Json<ChartData>, ApiError> {
    let generation = current(&engine)?;
    let icao24 = icao24.to_lowercase();
    if generation.dataset.get(&icao24).is_none() {
        return Err(unknown_track(&icao24));
    }

    let windows: Vec<&ClassifiedWindow> = generation.classified.for_track(&icao24).collect();
    Ok(Json(ChartData {
        turbulence: windows
            .iter()
            .filter(|w| w.is_turbulent())
            .map(|w| ChartPoint {
                t: w.stats.window_start.timestamp_millis(),
                y: true,
            })
            .collect(),
        vertical_rate_inertial_std: series(&windows, |w| w.stats.std_vertical_rate_inertial),
        vertical_rate_barometric_std: series(&windows, |w| w.stats.std_vertical_rate_barometric),
        criterion: series(&windows, |w| w.criterion),
        threshold: series(&windows, |w| Some(w.threshold)),
    }))
}
