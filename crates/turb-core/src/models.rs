//! Core data models for trajectory analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One decoded report as served by the decoder's `/traffic` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderRecord {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub icao24: String,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub track: Option<f64>,
    #[serde(default)]
    pub vertical_rate: Option<f64>,
    #[serde(default)]
    pub vertical_rate_barometric: Option<f64>,
    #[serde(default)]
    pub vertical_rate_inertial: Option<f64>,
}

/// A single raw observation. Fields the decoder did not report are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
    pub track: Option<f64>,
    pub vertical_rate: Option<f64>,
    pub vertical_rate_barometric: Option<f64>,
    pub vertical_rate_inertial: Option<f64>,
}

impl Sample {
    /// Sample at `timestamp` with every measurement absent.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            latitude: None,
            longitude: None,
            altitude: None,
            heading: None,
            track: None,
            vertical_rate: None,
            vertical_rate_barometric: None,
            vertical_rate_inertial: None,
        }
    }

    fn from_record(record: &DecoderRecord) -> Option<Self> {
        let timestamp = DateTime::from_timestamp_millis(record.timestamp)?;
        Some(Self {
            timestamp,
            latitude: finite(record.latitude),
            longitude: finite(record.longitude),
            altitude: finite(record.altitude),
            heading: finite(record.heading),
            track: finite(record.track),
            vertical_rate: finite(record.vertical_rate),
            vertical_rate_barometric: finite(record.vertical_rate_barometric),
            vertical_rate_inertial: finite(record.vertical_rate_inertial),
        })
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Raw reports of one aircraft, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrack {
    pub icao24: String,
    pub callsign: Option<String>,
    pub samples: Vec<Sample>,
}

/// Latest full trajectory snapshot for the fleet, keyed by icao24.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tracks: BTreeMap<String, RawTrack>,
    /// Records discarded while grouping (bad timestamp, empty address)
    #[serde(default)]
    pub rejected_records: usize,
}

impl Snapshot {
    /// Group decoder records into per-aircraft tracks.
    ///
    /// Samples are stably sorted by timestamp; the track callsign is the
    /// last non-empty callsign reported.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = DecoderRecord>,
    {
        let mut snapshot = Snapshot::default();

        for record in records {
            let icao24 = record.icao24.trim().to_lowercase();
            if icao24.is_empty() {
                snapshot.rejected_records += 1;
                continue;
            }
            let Some(sample) = Sample::from_record(&record) else {
                snapshot.rejected_records += 1;
                continue;
            };

            let track = snapshot
                .tracks
                .entry(icao24.clone())
                .or_insert_with(|| RawTrack {
                    icao24,
                    callsign: None,
                    samples: Vec::new(),
                });
            if let Some(callsign) = record
                .callsign
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
            {
                track.callsign = Some(callsign.to_string());
            }
            track.samples.push(sample);
        }

        for track in snapshot.tracks.values_mut() {
            track.samples.sort_by_key(|s| s.timestamp);
        }
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }
}

/// One point of the 1 Hz grid.
///
/// Heading and track are continuous (unwrapped) so they can exceed the
/// [0, 360) range; use [`ResampledSample::heading`] and
/// [`ResampledSample::track`] for compass values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub heading_unwrapped: Option<f64>,
    pub track_unwrapped: Option<f64>,
    pub vertical_rate: Option<f64>,
    pub vertical_rate_barometric: Option<f64>,
    pub vertical_rate_inertial: Option<f64>,
}

impl ResampledSample {
    pub fn heading(&self) -> Option<f64> {
        self.heading_unwrapped.map(wrap_degrees)
    }

    pub fn track(&self) -> Option<f64> {
        self.track_unwrapped.map(wrap_degrees)
    }
}

/// Normalize an angle to [0, 360).
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// A track resampled onto a gap-free 1 Hz grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledTrack {
    pub icao24: String,
    pub callsign: Option<String>,
    pub samples: Vec<ResampledSample>,
}

impl ResampledTrack {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }

    /// Most recent grid point with a known position.
    pub fn last_position(&self) -> Option<&ResampledSample> {
        self.samples
            .iter()
            .rev()
            .find(|s| s.latitude.is_some() && s.longitude.is_some())
    }
}

/// Aggregates over one non-overlapping one-minute window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedStats {
    pub icao24: String,
    pub callsign: Option<String>,
    pub window_start: DateTime<Utc>,
    pub sample_count: usize,
    pub mean_latitude: Option<f64>,
    pub mean_longitude: Option<f64>,
    /// Mean altitude over the window
    pub altitude: Option<f64>,
    pub std_vertical_rate_barometric: Option<f64>,
    pub std_vertical_rate_inertial: Option<f64>,
}

/// A window with its turbulence and anomaly verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedWindow {
    #[serde(flatten)]
    pub stats: WindowedStats,
    pub criterion: Option<f64>,
    pub threshold: f64,
    /// `None` when the criterion is undefined for this window
    pub is_turbulent: Option<bool>,
    pub is_anomalous: bool,
}

impl ClassifiedWindow {
    pub fn icao24(&self) -> &str {
        &self.stats.icao24
    }

    pub fn is_turbulent(&self) -> bool {
        self.is_turbulent.unwrap_or(false)
    }
}

/// Every resampled track of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub tracks: BTreeMap<String, ResampledTrack>,
}

impl Dataset {
    pub fn get(&self, icao24: &str) -> Option<&ResampledTrack> {
        self.tracks.get(icao24)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Every classified window of one refresh cycle, ordered by
/// (icao24, window_start).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedDataset {
    pub windows: Vec<ClassifiedWindow>,
}

impl ClassifiedDataset {
    pub fn for_track<'a>(&'a self, icao24: &'a str) -> impl Iterator<Item = &'a ClassifiedWindow> {
        self.windows.iter().filter(move |w| w.icao24() == icao24)
    }

    pub fn turbulent(&self) -> impl Iterator<Item = &ClassifiedWindow> {
        self.windows.iter().filter(|w| w.is_turbulent())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(icao24: &str, timestamp: i64) -> DecoderRecord {
        DecoderRecord {
            timestamp,
            icao24: icao24.to_string(),
            callsign: None,
            latitude: Some(52.0),
            longitude: Some(4.3),
            altitude: Some(35_000.0),
            heading: None,
            track: None,
            vertical_rate: None,
            vertical_rate_barometric: None,
            vertical_rate_inertial: None,
        }
    }

    #[test]
    fn test_records_grouped_and_sorted() {
        let mut late = record("4CA7B5", 2_000);
        late.callsign = Some("EIN12A ".to_string());
        let records = vec![late, record("4ca7b5", 1_000), record("3c6444", 1_500)];

        let snapshot = Snapshot::from_records(records);
        assert_eq!(snapshot.len(), 2);

        let track = &snapshot.tracks["4ca7b5"];
        assert_eq!(track.callsign.as_deref(), Some("EIN12A"));
        assert_eq!(track.samples.len(), 2);
        assert!(track.samples[0].timestamp < track.samples[1].timestamp);
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let json = r#"{"timestamp": 1700000000000, "icao24": "abc123", "latitude": 51.5, "vertical_rate_inertial": null}"#;
        let rec: DecoderRecord = serde_json::from_str(json).unwrap();
        let snapshot = Snapshot::from_records(vec![rec]);

        let sample = &snapshot.tracks["abc123"].samples[0];
        assert_eq!(sample.latitude, Some(51.5));
        assert_eq!(sample.longitude, None);
        assert_eq!(sample.vertical_rate_inertial, None);
    }

    #[test]
    fn test_bad_records_rejected() {
        let mut nan = record("abc123", 1_000);
        nan.latitude = Some(f64::NAN);
        let records = vec![record("  ", 1_000), record("abc123", i64::MAX), nan];

        let snapshot = Snapshot::from_records(records);
        assert_eq!(snapshot.rejected_records, 2);
        assert_eq!(snapshot.tracks["abc123"].samples[0].latitude, None);
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-10.0), 350.0);
        assert_eq!(wrap_degrees(720.0), 0.0);
    }
}
