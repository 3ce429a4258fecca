use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use turb_core::models::{RawTrack, Sample, Snapshot};

use crate::api;
use crate::control::RuntimeControl;
use crate::engine::{AnalyticsEngine, EngineSettings};
use crate::source::{RawSampleSource, SourceError};

const T0: i64 = 1_700_000_040;

struct FixedSource(Snapshot);

#[async_trait]
impl RawSampleSource for FixedSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}

/// Ten minutes of steady flight with a rough patch in minute 6.
fn snapshot() -> Snapshot {
    let samples = (0..600)
        .step_by(2)
        .map(|t| {
            let rough = (360..420).contains(&t);
            let baro = if rough && (t / 2) % 2 == 0 { 1_800.0 } else { 0.0 };
            let baro = if rough && baro == 0.0 { -1_800.0 } else { baro };
            Sample {
                latitude: Some(48.85 + t as f64 * 1e-4),
                longitude: Some(2.5),
                altitude: Some(34_000.0),
                heading: Some(359.0),
                track: Some(1.0),
                vertical_rate: Some(0.0),
                vertical_rate_barometric: Some(baro),
                vertical_rate_inertial: Some(0.0),
                ..Sample::empty(Utc.timestamp_opt(T0 + t, 0).unwrap())
            }
        })
        .collect();
    let track = RawTrack {
        icao24: "39ac45".to_string(),
        callsign: Some("AFR1234".to_string()),
        samples,
    };
    Snapshot {
        tracks: [("39ac45".to_string(), track)].into_iter().collect(),
        rejected_records: 0,
    }
}

fn setup_app() -> (axum::Router, Arc<AnalyticsEngine>) {
    let engine = Arc::new(AnalyticsEngine::new(
        Arc::new(FixedSource(snapshot())),
        Arc::new(RuntimeControl::default()),
        EngineSettings::default(),
    ));
    let app = api::routes().with_state(engine.clone());
    (app, engine)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn data_endpoints_report_no_data_before_first_cycle() {
    let (app, _engine) = setup_app();

    for uri in ["/v1/tracks", "/v1/turbulence", "/v1/tracks/39ac45"] {
        let res = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        assert_eq!(read_json(res).await["error"], "no data yet");
    }

    let res = app.clone().oneshot(get("/v1/status")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["state"], "idle");
    assert!(body["generation"].is_null());
}

#[tokio::test]
async fn tracks_and_turbulence_after_refresh() {
    let (app, engine) = setup_app();
    engine.refresh_once().await.unwrap();

    let res = app.clone().oneshot(get("/v1/tracks")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tracks = read_json(res).await;
    assert_eq!(tracks.as_array().unwrap().len(), 1);
    assert_eq!(tracks[0]["icao24"], "39ac45");
    assert_eq!(tracks[0]["callsign"], "AFR1234");
    assert_eq!(tracks[0]["windows"], 10);
    assert_eq!(tracks[0]["turbulent_windows"], 1);

    let res = app
        .clone()
        .oneshot(get("/v1/turbulence?turbulent_only=true"))
        .await
        .unwrap();
    let windows = read_json(res).await;
    let windows = windows.as_array().unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0]["is_turbulent"], true);
    assert_eq!(
        windows[0]["window_start"],
        json!(Utc.timestamp_opt(T0 + 360, 0).unwrap())
    );

    let res = app.clone().oneshot(get("/v1/tracks/39AC45")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let track = read_json(res).await;
    assert_eq!(track["samples"].as_array().unwrap().len(), 599);

    let res = app.clone().oneshot(get("/v1/tracks/ffffff")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chart_series_cover_every_window() {
    let (app, engine) = setup_app();
    engine.refresh_once().await.unwrap();

    let res = app
        .clone()
        .oneshot(get("/v1/turbulence/39ac45/chart"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let chart = read_json(res).await;
    assert_eq!(chart["threshold"].as_array().unwrap().len(), 10);
    assert_eq!(chart["criterion"].as_array().unwrap().len(), 10);
    assert_eq!(chart["turbulence"].as_array().unwrap().len(), 1);
    assert_eq!(
        chart["turbulence"][0]["t"],
        (T0 + 360) * 1000
    );
}

#[tokio::test]
async fn control_roundtrip_and_validation() {
    let (app, engine) = setup_app();

    let res = app.clone().oneshot(get("/v1/control")).await.unwrap();
    let body = read_json(res).await;
    assert_eq!(body["threshold_floor"], 150.0);
    assert_eq!(body["multiplier"], 1.2);

    let put = |payload: Value| {
        Request::builder()
            .method("PUT")
            .uri("/v1/control")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    };

    let res = app
        .clone()
        .oneshot(put(json!({"multiplier": 2.5})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(engine.multiplier(), 2.5);
    assert_eq!(engine.threshold_floor(), 150.0);

    let res = app
        .clone()
        .oneshot(put(json!({"threshold_floor": -3.0, "multiplier": 1.0})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(engine.multiplier(), 2.5);

    let res = app.clone().oneshot(put(json!({}))).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
