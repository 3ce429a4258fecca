//! One refresh cycle's worth of work over a whole fleet.
//!
//! Tracks are independent, so both stages fan out across the rayon pool.
//! A failing track is reported back to the caller and left out; it never
//! aborts the others, not even by panicking.

use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::classify::{classify_track, AnomalyPolicy, Tunables};
use crate::error::TrackError;
use crate::models::{ClassifiedDataset, Dataset, Snapshot};
use crate::resample::resample_track;

/// A track that was skipped this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackFailure {
    pub icao24: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: TrackError,
}

fn serialize_error<S: serde::Serializer>(error: &TrackError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Run one track's work, turning a panic into a [`TrackError::Panicked`].
fn guarded<T>(work: impl FnOnce() -> Result<T, TrackError>) -> Result<T, TrackError> {
    catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        Err(TrackError::Panicked(panic_message(payload.as_ref())))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Resample every track of a snapshot. Tracks under a minute are dropped
/// silently; failures are returned alongside the dataset.
pub fn resample_snapshot(snapshot: &Snapshot) -> (Dataset, Vec<TrackFailure>) {
    let results: Vec<_> = snapshot
        .tracks
        .par_iter()
        .map(|(icao24, raw)| (icao24, guarded(|| resample_track(raw))))
        .collect();

    let mut dataset = Dataset::default();
    let mut failures = Vec::new();
    for (icao24, result) in results {
        match result {
            Ok(Some(track)) => {
                dataset.tracks.insert(icao24.clone(), track);
            }
            Ok(None) => {}
            Err(error) => failures.push(TrackFailure {
                icao24: icao24.clone(),
                error,
            }),
        }
    }
    (dataset, failures)
}

/// Classify every track of a dataset and apply the anomaly policy.
pub fn classify_dataset(
    dataset: &Dataset,
    tunables: &Tunables,
    policy: AnomalyPolicy,
) -> (ClassifiedDataset, Vec<TrackFailure>) {
    let results: Vec<_> = dataset
        .tracks
        .par_iter()
        .map(|(icao24, track)| (icao24, guarded(|| classify_track(track, tunables))))
        .collect();

    let mut classified = ClassifiedDataset::default();
    let mut failures = Vec::new();
    // BTreeMap order is preserved by the indexed parallel collect
    for (icao24, result) in results {
        match result {
            Ok(windows) => classified
                .windows
                .extend(windows.into_iter().filter(|w| policy.keeps(w))),
            Err(error) => failures.push(TrackFailure {
                icao24: icao24.clone(),
                error,
            }),
        }
    }
    (classified, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawTrack, Sample};
    use chrono::{DateTime, TimeZone, Utc};

    const T0: i64 = 1_700_000_040;

    fn at(second: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(T0 + second, 0).unwrap()
    }

    fn level(second: i64) -> Sample {
        Sample {
            latitude: Some(52.0),
            longitude: Some(4.5),
            altitude: Some(30_000.0),
            vertical_rate_barometric: Some(64.0),
            vertical_rate_inertial: Some(64.0),
            ..Sample::empty(at(second))
        }
    }

    fn raw(icao24: &str, samples: Vec<Sample>) -> RawTrack {
        RawTrack {
            icao24: icao24.to_string(),
            callsign: None,
            samples,
        }
    }

    /// Level flight reported every 5 s over `[0, end)`.
    fn every_5s(end: i64) -> Vec<Sample> {
        (0..end).step_by(5).map(level).collect()
    }

    fn snapshot(tracks: Vec<RawTrack>) -> Snapshot {
        Snapshot {
            tracks: tracks.into_iter().map(|t| (t.icao24.clone(), t)).collect(),
            rejected_records: 0,
        }
    }

    #[test]
    fn test_failures_do_not_abort_other_tracks() {
        let snap = snapshot(vec![
            raw("aaaaaa", vec![level(0), level(30), level(90)]),
            raw("bbbbbb", vec![level(0), level(90), level(45)]),
            raw("cccccc", vec![level(0), level(20)]),
        ]);
        let (dataset, failures) = resample_snapshot(&snap);

        assert_eq!(dataset.len(), 1);
        assert!(dataset.get("aaaaaa").is_some());
        assert!(dataset.get("cccccc").is_none());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].icao24, "bbbbbb");
    }

    #[test]
    fn test_stray_timestamp_isolated_to_its_track() {
        let mut corrupted = every_5s(180);
        corrupted.insert(0, Sample::empty(Utc.timestamp_opt(0, 0).unwrap()));
        let snap = snapshot(vec![raw("aaaaaa", every_5s(180)), raw("eeeeee", corrupted)]);

        let (dataset, failures) = resample_snapshot(&snap);
        assert_eq!(dataset.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].icao24, "eeeeee");
        assert!(matches!(failures[0].error, TrackError::SpanTooLong { .. }));

        let (classified, failures) =
            classify_dataset(&dataset, &Tunables::default(), AnomalyPolicy::Drop);
        assert!(failures.is_empty());
        assert_eq!(classified.len(), 3);
    }

    #[test]
    fn test_panicking_track_becomes_failure() {
        let result: Result<(), TrackError> = guarded(|| panic!("bad track"));
        assert_eq!(result, Err(TrackError::Panicked("bad track".to_string())));

        let result: Result<u8, TrackError> = guarded(|| Ok(7));
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_classified_windows_reference_dataset_tracks() {
        let late: Vec<Sample> = (5..200).step_by(4).map(level).collect();
        let snap = snapshot(vec![raw("aaaaaa", every_5s(135)), raw("dddddd", late)]);
        let (dataset, _) = resample_snapshot(&snap);
        let (classified, failures) =
            classify_dataset(&dataset, &Tunables::default(), AnomalyPolicy::Drop);

        assert!(failures.is_empty());
        assert!(!classified.is_empty());
        for window in &classified.windows {
            assert!(dataset.get(window.icao24()).is_some());
        }
        let order: Vec<_> = classified
            .windows
            .iter()
            .map(|w| (w.icao24().to_string(), w.stats.window_start))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_single_report_spike_is_not_turbulence() {
        let mut samples = every_5s(240);
        samples[18].vertical_rate_barometric = Some(5_000.0); // t = 90 s
        let (dataset, _) = resample_snapshot(&snapshot(vec![raw("aaaaaa", samples)]));
        let (classified, failures) =
            classify_dataset(&dataset, &Tunables::default(), AnomalyPolicy::Drop);

        assert!(failures.is_empty());
        assert_eq!(classified.len(), 4);
        assert!(classified.windows.iter().all(|w| w.criterion == Some(0.0)));
        assert_eq!(classified.turbulent().count(), 0);
    }

    #[test]
    fn test_silent_channel_leaves_criterion_undefined() {
        let samples = every_5s(240)
            .into_iter()
            .map(|mut s| {
                if s.timestamp > at(10) {
                    s.vertical_rate_inertial = None;
                }
                s
            })
            .collect();
        let (dataset, _) = resample_snapshot(&snapshot(vec![raw("aaaaaa", samples)]));
        let (classified, failures) =
            classify_dataset(&dataset, &Tunables::default(), AnomalyPolicy::Drop);

        assert!(failures.is_empty());
        assert_eq!(classified.len(), 4);
        assert_eq!(classified.windows[0].criterion, Some(0.0));
        for window in &classified.windows[1..] {
            assert_eq!(window.stats.std_vertical_rate_inertial, None);
            assert_eq!(window.criterion, None);
            assert_eq!(window.is_turbulent, None);
        }
    }

    #[test]
    fn test_offset_window_dropped_from_classified_dataset() {
        let samples = (0..3600)
            .step_by(5)
            .map(|second| {
                let mut s = level(second);
                if (1800..1860).contains(&second) {
                    s.latitude = Some(10.0);
                }
                s
            })
            .collect();
        let (dataset, _) = resample_snapshot(&snapshot(vec![raw("aaaaaa", samples)]));

        let (flagged, _) = classify_dataset(&dataset, &Tunables::default(), AnomalyPolicy::Flag);
        assert_eq!(flagged.len(), 60);
        let anomalous: Vec<_> = flagged
            .windows
            .iter()
            .filter(|w| w.is_anomalous)
            .map(|w| w.stats.window_start)
            .collect();
        assert_eq!(anomalous, vec![at(1800)]);

        let (kept, failures) =
            classify_dataset(&dataset, &Tunables::default(), AnomalyPolicy::Drop);
        assert!(failures.is_empty());
        assert_eq!(kept.len(), 59);
        assert!(kept.windows.iter().all(|w| w.stats.window_start != at(1800)));
    }
}
