//! Resampling of irregular raw reports onto a 1 Hz grid.
//!
//! Position, altitude, vertical rate and the unwrapped angles are
//! interpolated linearly between the bracketing observations of each field.
//! The barometric and inertial vertical rates are never interpolated: each
//! report lands on its nearest grid point and every other point stays
//! absent, so the median filter and the window spreads see only what the
//! aircraft actually reported. Nothing is extrapolated past a field's
//! observations.

use chrono::{DateTime, Utc};

use crate::error::TrackError;
use crate::models::{RawTrack, ResampledSample, ResampledTrack, Sample};
use crate::stats::unwrap_degrees;

/// Tracks spanning less than this are dropped.
pub const MIN_TRACK_SPAN_MS: i64 = 60_000;

/// Grid step.
pub const GRID_STEP_MS: i64 = 1_000;

/// Tracks spanning more than this are rejected rather than gridded.
pub const MAX_TRACK_SPAN_MS: i64 = 24 * 60 * 60 * 1_000;

/// Resample one track.
///
/// Returns `Ok(None)` when the track spans less than a minute, and
/// [`TrackError::SpanTooLong`] when a stray timestamp stretches it past
/// [`MAX_TRACK_SPAN_MS`].
pub fn resample_track(raw: &RawTrack) -> Result<Option<ResampledTrack>, TrackError> {
    let samples = &raw.samples;
    if let Some(index) = samples
        .windows(2)
        .position(|pair| pair[1].timestamp < pair[0].timestamp)
    {
        return Err(TrackError::NonMonotonic { index: index + 1 });
    }

    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Ok(None);
    };
    let first_ms = first.timestamp.timestamp_millis();
    let last_ms = last.timestamp.timestamp_millis();
    let span_ms = last_ms - first_ms;
    if span_ms < MIN_TRACK_SPAN_MS {
        return Ok(None);
    }
    if span_ms > MAX_TRACK_SPAN_MS {
        return Err(TrackError::SpanTooLong { span_ms });
    }

    let grid = grid_points(first_ms, last_ms);
    let times: Vec<i64> = samples.iter().map(|s| s.timestamp.timestamp_millis()).collect();

    let column = |field: fn(&Sample) -> Option<f64>| -> Vec<Option<f64>> {
        samples.iter().map(field).collect()
    };
    let heading = unwrap_degrees(&column(|s| s.heading));
    let track = unwrap_degrees(&column(|s| s.track));

    let latitude = interpolate(&times, &column(|s| s.latitude), &grid);
    let longitude = interpolate(&times, &column(|s| s.longitude), &grid);
    let altitude = interpolate(&times, &column(|s| s.altitude), &grid);
    let heading = interpolate(&times, &heading, &grid);
    let track = interpolate(&times, &track, &grid);
    let vertical_rate = interpolate(&times, &column(|s| s.vertical_rate), &grid);
    let vertical_rate_barometric = nearest(&times, &column(|s| s.vertical_rate_barometric), &grid);
    let vertical_rate_inertial = nearest(&times, &column(|s| s.vertical_rate_inertial), &grid);

    let mut resampled = Vec::with_capacity(grid.len());
    for (i, &t) in grid.iter().enumerate() {
        let Some(timestamp) = DateTime::<Utc>::from_timestamp_millis(t) else {
            continue;
        };
        resampled.push(ResampledSample {
            timestamp,
            latitude: latitude[i],
            longitude: longitude[i],
            altitude: altitude[i],
            heading_unwrapped: heading[i],
            track_unwrapped: track[i],
            vertical_rate: vertical_rate[i],
            vertical_rate_barometric: vertical_rate_barometric[i],
            vertical_rate_inertial: vertical_rate_inertial[i],
        });
    }

    Ok(Some(ResampledTrack {
        icao24: raw.icao24.clone(),
        callsign: raw.callsign.clone(),
        samples: resampled,
    }))
}

/// Whole seconds from `first_ms` rounded up to `last_ms` rounded down.
fn grid_points(first_ms: i64, last_ms: i64) -> Vec<i64> {
    let start = first_ms.div_euclid(GRID_STEP_MS) * GRID_STEP_MS
        + if first_ms.rem_euclid(GRID_STEP_MS) == 0 { 0 } else { GRID_STEP_MS };
    let end = last_ms.div_euclid(GRID_STEP_MS) * GRID_STEP_MS;
    (start..=end).step_by(GRID_STEP_MS as usize).collect()
}

fn observations(times: &[i64], values: &[Option<f64>]) -> Vec<(i64, f64)> {
    times
        .iter()
        .zip(values)
        .filter_map(|(&t, v)| v.map(|v| (t, v)))
        .collect()
}

/// Index of the last observation at or before `t`, advancing `cursor`.
fn advance(obs: &[(i64, f64)], cursor: &mut usize, t: i64) -> Option<usize> {
    while *cursor + 1 < obs.len() && obs[*cursor + 1].0 <= t {
        *cursor += 1;
    }
    match obs.get(*cursor) {
        Some(&(ot, _)) if ot <= t => Some(*cursor),
        _ => None,
    }
}

/// Linear interpolation between bracketing observations; absent outside them.
fn interpolate(times: &[i64], values: &[Option<f64>], grid: &[i64]) -> Vec<Option<f64>> {
    let obs = observations(times, values);
    let mut cursor = 0;

    grid.iter()
        .map(|&t| {
            let i = advance(&obs, &mut cursor, t)?;
            let (t0, v0) = obs[i];
            if t0 == t {
                return Some(v0);
            }
            let (t1, v1) = *obs.get(i + 1)?;
            let frac = (t - t0) as f64 / (t1 - t0) as f64;
            Some(v0 + (v1 - v0) * frac)
        })
        .collect()
}

/// Each observation placed on its nearest grid point, absent elsewhere.
/// Reports sharing a grid point are averaged.
fn nearest(times: &[i64], values: &[Option<f64>], grid: &[i64]) -> Vec<Option<f64>> {
    let mut sums = vec![(0.0, 0usize); grid.len()];
    if let Some(&start) = grid.first() {
        for (t, v) in observations(times, values) {
            let offset = (t - start + GRID_STEP_MS / 2).div_euclid(GRID_STEP_MS);
            let index = offset.clamp(0, grid.len() as i64 - 1) as usize;
            sums[index].0 += v;
            sums[index].1 += 1;
        }
    }

    sums.into_iter()
        .map(|(sum, n)| (n > 0).then(|| sum / n as f64))
        .collect()
}
