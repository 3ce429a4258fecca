//! Server configuration from environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use turb_core::classify::{AnomalyPolicy, Tunables};

use crate::engine::EngineSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Base URL of the decoder serving `/traffic`
    pub decoder_url: String,
    /// Recorded snapshot to analyse instead of the live decoder
    pub replay_path: Option<PathBuf>,
    pub refresh_period: Duration,
    pub fetch_timeout: Duration,
    pub threshold_floor: f64,
    pub multiplier: f64,
    pub anomaly_policy: AnomalyPolicy,
    /// Serve the API without running the refresh loop
    pub live_disable: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: parse_var("TURB_PORT", 5000),
            decoder_url: env::var("TURB_DECODER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5050".to_string()),
            replay_path: env::var("TURB_REPLAY_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            refresh_period: Duration::from_millis(parse_var("TURB_REFRESH_MS", 1000)),
            fetch_timeout: Duration::from_millis(parse_var("TURB_FETCH_TIMEOUT_MS", 5500)),
            threshold_floor: parse_var("TURB_THRESHOLD_FLOOR", Tunables::default().threshold_floor),
            multiplier: parse_var("TURB_MULTIPLIER", Tunables::default().multiplier),
            anomaly_policy: env::var("TURB_ANOMALY_POLICY")
                .ok()
                .and_then(|s| AnomalyPolicy::parse(&s))
                .unwrap_or_default(),
            live_disable: env::var("TURB_LIVE_DISABLE")
                .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    pub fn tunables(&self) -> Tunables {
        Tunables {
            threshold_floor: self.threshold_floor,
            multiplier: self.multiplier,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            refresh_period: self.refresh_period,
            fetch_timeout: self.fetch_timeout,
            anomaly_policy: self.anomaly_policy,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
