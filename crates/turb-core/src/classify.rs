//! Windowed turbulence classification.
//!
//! Barometric and inertial vertical-rate estimates diverge under turbulent
//! excitation. Per one-minute window the criterion is the absolute
//! difference of the two channels' standard deviations; a window is
//! turbulent when its criterion exceeds a threshold adapted to the track's
//! own criterion history.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrackError;
use crate::models::{ClassifiedWindow, ResampledTrack, WindowedStats};
use crate::stats::{mean, median_filter, population_std, sample_std};

/// Kernel of the median filter applied to both vertical-rate channels.
pub const MEDIAN_KERNEL: usize = 3;

/// Positional outlier cutoff, in standard deviations.
pub const ANOMALY_SIGMA: f64 = 3.0;

pub const DEFAULT_THRESHOLD_FLOOR: f64 = 150.0;
pub const DEFAULT_MULTIPLIER: f64 = 1.2;

/// Classification knobs, read once per refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunables {
    /// Lower bound of every threshold, in vertical-rate units
    pub threshold_floor: f64,
    /// Weight of the criterion spread in the adaptive threshold
    pub multiplier: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            threshold_floor: DEFAULT_THRESHOLD_FLOOR,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl Tunables {
    /// `max(floor, mean + multiplier * std)` over a track's criteria.
    pub fn threshold(&self, criteria: &[f64]) -> Option<f64> {
        let m = mean(criteria)?;
        let s = population_std(criteria)?;
        let adaptive = m + self.multiplier * s;
        if !adaptive.is_finite() {
            return None;
        }
        Some(adaptive.max(self.threshold_floor))
    }
}

/// What to do with positionally anomalous windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyPolicy {
    /// Leave them out of the classified dataset
    #[default]
    Drop,
    /// Keep them, flagged
    Flag,
}

impl AnomalyPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "drop" => Some(Self::Drop),
            "flag" | "keep" => Some(Self::Flag),
            _ => None,
        }
    }

    pub fn keeps(&self, window: &ClassifiedWindow) -> bool {
        match self {
            Self::Drop => !window.is_anomalous,
            Self::Flag => true,
        }
    }
}

/// Aggregate a resampled track into one-minute windows aligned to the clock
/// minute. Vertical rates are median-filtered before aggregation.
pub fn aggregate_windows(track: &ResampledTrack) -> Vec<WindowedStats> {
    let baro: Vec<Option<f64>> = track
        .samples
        .iter()
        .map(|s| s.vertical_rate_barometric)
        .collect();
    let inertial: Vec<Option<f64>> = track
        .samples
        .iter()
        .map(|s| s.vertical_rate_inertial)
        .collect();
    let baro = median_filter(&baro, MEDIAN_KERNEL);
    let inertial = median_filter(&inertial, MEDIAN_KERNEL);

    let mut windows = Vec::new();
    let mut start = 0;
    while start < track.samples.len() {
        let window_start = minute_of(track.samples[start].timestamp);
        let mut end = start + 1;
        while end < track.samples.len() && minute_of(track.samples[end].timestamp) == window_start {
            end += 1;
        }

        let slice = &track.samples[start..end];
        let collect = |values: Vec<Option<f64>>| -> Vec<f64> { values.into_iter().flatten().collect() };
        let latitudes = collect(slice.iter().map(|s| s.latitude).collect());
        let longitudes = collect(slice.iter().map(|s| s.longitude).collect());
        let altitudes = collect(slice.iter().map(|s| s.altitude).collect());
        let baro_window = collect(baro[start..end].to_vec());
        let inertial_window = collect(inertial[start..end].to_vec());

        windows.push(WindowedStats {
            icao24: track.icao24.clone(),
            callsign: track.callsign.clone(),
            window_start,
            sample_count: slice.len(),
            mean_latitude: mean(&latitudes),
            mean_longitude: mean(&longitudes),
            altitude: mean(&altitudes),
            std_vertical_rate_barometric: sample_std(&baro_window),
            std_vertical_rate_inertial: sample_std(&inertial_window),
        });
        start = end;
    }
    windows
}

fn minute_of(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(TimeDelta::minutes(1))
        .unwrap_or(timestamp)
}

/// Criterion of one window, defined only when both channel spreads are.
pub fn criterion(stats: &WindowedStats) -> Option<f64> {
    let baro = stats.std_vertical_rate_barometric?;
    let inertial = stats.std_vertical_rate_inertial?;
    Some((baro - inertial).abs())
}

/// Mean and spread of one coordinate over a track's windows.
struct Spread {
    mean: f64,
    std: f64,
}

impl Spread {
    fn of(values: &[f64]) -> Option<Self> {
        Some(Self {
            mean: mean(values)?,
            std: population_std(values)?,
        })
    }

    fn is_outlier(&self, value: f64) -> bool {
        (value - self.mean).abs() > ANOMALY_SIGMA * self.std
    }
}

/// Classify every window of a track.
///
/// All windows are returned, anomalous ones included; apply an
/// [`AnomalyPolicy`] to decide what gets published.
pub fn classify_track(
    track: &ResampledTrack,
    tunables: &Tunables,
) -> Result<Vec<ClassifiedWindow>, TrackError> {
    let windows = aggregate_windows(track);
    let criteria: Vec<Option<f64>> = windows.iter().map(criterion).collect();
    let defined: Vec<f64> = criteria.iter().flatten().copied().collect();
    if defined.is_empty() {
        return Err(TrackError::Degenerate("no window with both vertical-rate channels"));
    }
    let threshold = tunables
        .threshold(&defined)
        .ok_or(TrackError::NonFinite("criterion"))?;

    let latitudes: Vec<f64> = windows.iter().filter_map(|w| w.mean_latitude).collect();
    let longitudes: Vec<f64> = windows.iter().filter_map(|w| w.mean_longitude).collect();
    let lat_spread = Spread::of(&latitudes);
    let lon_spread = Spread::of(&longitudes);

    let classified = windows
        .into_iter()
        .zip(criteria)
        .map(|(stats, criterion)| {
            let lat_outlier = match (&lat_spread, stats.mean_latitude) {
                (Some(spread), Some(lat)) => spread.is_outlier(lat),
                _ => false,
            };
            let lon_outlier = match (&lon_spread, stats.mean_longitude) {
                (Some(spread), Some(lon)) => spread.is_outlier(lon),
                _ => false,
            };
            ClassifiedWindow {
                stats,
                criterion,
                threshold,
                is_turbulent: criterion.map(|c| c > threshold),
                is_anomalous: lat_outlier || lon_outlier,
            }
        })
        .collect();

    Ok(classified)
}
