//! Runtime tunable endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use turb_core::classify::Tunables;

use crate::engine::AnalyticsEngine;

#[derive(Debug, Deserialize)]
pub struct ControlUpdate {
    pub threshold_floor: Option<f64>,
    pub multiplier: Option<f64>,
}

/// Current tunables.
pub async fn get_control(State(engine): State<Arc<AnalyticsEngine>>) -> Json<Tunables> {
    Json(engine.control().snapshot())
}

/// Update the floor and/or multiplier. Takes effect from the next cycle.
pub async fn update_control(
    State(engine): State<Arc<AnalyticsEngine>>,
    Json(update): Json<ControlUpdate>,
) -> Result<Json<Tunables>, (StatusCode, Json<Value>)> {
    if update.threshold_floor.is_none() && update.multiplier.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "expected threshold_floor and/or multiplier"})),
        ));
    }

    engine
        .control()
        .update(update.threshold_floor, update.multiplier)
        .map(Json)
        .map_err(|err| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": err.to_string()})),
            )
        })
}
