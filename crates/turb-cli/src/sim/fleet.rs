//! Synthetic aircraft producing decoder records.
//!
//! Barometric and inertial vertical rates both track the true climb rate
//! with independent noise. Inside a turbulence burst the barometric channel
//! picks up far more noise than the inertial one, which is exactly the
//! divergence the classifier looks for.

use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use turb_core::models::DecoderRecord;

use super::paths::{offset, CircularPath, FlightPath, LinearPath};

/// Calm-air noise amplitudes, feet per minute.
const BARO_NOISE_FPM: f64 = 50.0;
const INERTIAL_NOISE_FPM: f64 = 20.0;

/// Latitude error of a corrupted position fix, degrees.
const GLITCH_OFFSET_DEG: f64 = 5.0;

/// Fastest tick the feed will run at.
pub const MIN_REPORT_PERIOD: Duration = Duration::from_millis(10);

/// Tick period for `rate` reports per second, never below
/// `MIN_REPORT_PERIOD`. `rate` must be positive and finite.
pub fn report_period(rate: f64) -> Duration {
    Duration::from_secs_f64(1.0 / rate).max(MIN_REPORT_PERIOD)
}

/// A period of rough air.
#[derive(Debug, Clone, Copy)]
pub struct TurbulenceBurst {
    /// Seconds since the simulation start
    pub start: f64,
    pub duration: f64,
    /// Barometric noise amplitude inside the burst, feet per minute
    pub amplitude_fpm: f64,
}

impl TurbulenceBurst {
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.start + self.duration
    }
}

pub struct SimAircraft {
    pub icao24: String,
    pub callsign: String,
    pub path: Arc<dyn FlightPath>,
    pub turbulence: Option<TurbulenceBurst>,
    /// Emit one corrupted position at this time
    pub glitch_at: Option<f64>,
}

impl SimAircraft {
    pub fn new(icao24: &str, callsign: &str, path: Arc<dyn FlightPath>) -> Self {
        Self {
            icao24: icao24.to_string(),
            callsign: callsign.to_string(),
            path,
            turbulence: None,
            glitch_at: None,
        }
    }

    /// Decoder record at `t` seconds into the simulation.
    ///
    /// `epoch_ms` is the wall-clock time of `t = 0`.
    pub fn record<R: Rng>(&self, t: f64, epoch_ms: i64, rng: &mut R) -> DecoderRecord {
        let (mut latitude, longitude) = self.path.position(t);
        if let Some(at) = self.glitch_at {
            if (t - at).abs() < 0.5 {
                latitude += GLITCH_OFFSET_DEG;
            }
        }

        let rough = self.turbulence.filter(|burst| burst.contains(t));
        let baro_noise = rough.map_or(BARO_NOISE_FPM, |burst| burst.amplitude_fpm);
        let inertial_noise = rough.map_or(INERTIAL_NOISE_FPM, |_| 2.0 * INERTIAL_NOISE_FPM);
        let climb = self.path.vertical_rate_fpm(t);
        let track = self.path.track_deg(t);

        DecoderRecord {
            timestamp: epoch_ms + (t * 1000.0).round() as i64,
            icao24: self.icao24.clone(),
            callsign: Some(self.callsign.clone()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude: Some(self.path.altitude_ft(t)),
            heading: Some((track + rng.random_range(-2.0..2.0)).rem_euclid(360.0)),
            track: Some(track),
            vertical_rate: Some(climb),
            vertical_rate_barometric: Some(climb + rng.random_range(-baro_noise..baro_noise)),
            vertical_rate_inertial: Some(
                climb + rng.random_range(-inertial_noise..inertial_noise),
            ),
        }
    }
}

pub struct Fleet {
    pub aircraft: Vec<SimAircraft>,
}

impl Fleet {
    /// One record per aircraft at `t`.
    pub fn records_at<R: Rng>(
        &self,
        t: f64,
        epoch_ms: i64,
        rng: &mut R,
    ) -> Vec<DecoderRecord> {
        self.aircraft
            .iter()
            .map(|aircraft| aircraft.record(t, epoch_ms, rng))
            .collect()
    }
}

/// Three aircraft around a center point: an eastbound cruiser, a
/// climbing departure and a holding pattern.
///
/// With `turbulence`, the cruiser flies through rough air from minute 5 to
/// minute 7. With `glitch`, the holding aircraft reports one bad fix at
/// minute 4.
pub fn create_demo_fleet(center_lat: f64, center_lon: f64, turbulence: bool, glitch: bool) -> Fleet {
    let cruise_start = offset(center_lat, center_lon, 150_000.0, 270.0);
    let cruise_end = offset(center_lat, center_lon, 150_000.0, 90.0);
    let mut cruiser = SimAircraft::new(
        "4ca7b5",
        "EIN12A",
        Arc::new(LinearPath::new(cruise_start, cruise_end, 36_000.0, 36_000.0, 240.0)),
    );
    if turbulence {
        cruiser.turbulence = Some(TurbulenceBurst {
            start: 300.0,
            duration: 120.0,
            amplitude_fpm: 1_500.0,
        });
    }

    let departure_end = offset(center_lat, center_lon, 120_000.0, 20.0);
    let departure = SimAircraft::new(
        "39ac45",
        "AFR1234",
        Arc::new(LinearPath::new(
            (center_lat, center_lon),
            departure_end,
            3_000.0,
            31_000.0,
            180.0,
        )),
    );

    let hold_fix = offset(center_lat, center_lon, 30_000.0, 180.0);
    let mut holding = SimAircraft::new(
        "400a0b",
        "BAW45K",
        Arc::new(CircularPath::new(hold_fix.0, hold_fix.1, 6_000.0, 9_000.0, 110.0, true)),
    );
    if glitch {
        holding.glitch_at = Some(240.0);
    }

    Fleet {
        aircraft: vec![cruiser, departure, holding],
    }
}

/// Records accumulated by the simulated decoder, oldest first.
pub struct RecordBuffer {
    retention_ms: i64,
    records: VecDeque<DecoderRecord>,
}

impl RecordBuffer {
    pub fn new(retention_ms: i64) -> Self {
        Self {
            retention_ms,
            records: VecDeque::new(),
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = DecoderRecord>) {
        self.records.extend(records);
    }

    /// Drop records older than the retention window ending at `now_ms`.
    /// Returns how many were removed.
    pub fn expire(&mut self, now_ms: i64) -> usize {
        let cutoff = now_ms - self.retention_ms;
        let before = self.records.len();
        self.records.retain(|r| r.timestamp >= cutoff);
        before - self.records.len()
    }

    pub fn snapshot(&self) -> Vec<DecoderRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use turb_core::classify::{AnomalyPolicy, Tunables};
    use turb_core::models::Snapshot;
    use turb_core::pipeline::{classify_dataset, resample_snapshot};

    /// Minute-aligned so windows line up with simulation minutes.
    const EPOCH_MS: i64 = 1_700_000_040_000;

    fn cruiser(turbulence: Option<TurbulenceBurst>) -> SimAircraft {
        let mut aircraft = SimAircraft::new(
            "4ca7b5",
            "EIN12A",
            Arc::new(LinearPath::new((53.0, -8.0), (53.0, 2.0), 36_000.0, 36_000.0, 240.0)),
        );
        aircraft.turbulence = turbulence;
        aircraft
    }

    #[test]
    fn test_record_fields() {
        let mut rng = StdRng::seed_from_u64(7);
        let record = cruiser(None).record(12.5, EPOCH_MS, &mut rng);

        assert_eq!(record.timestamp, EPOCH_MS + 12_500);
        assert_eq!(record.icao24, "4ca7b5");
        assert_eq!(record.altitude, Some(36_000.0));
        let baro = record.vertical_rate_barometric.unwrap();
        let inertial = record.vertical_rate_inertial.unwrap();
        assert!(baro.abs() < BARO_NOISE_FPM);
        assert!(inertial.abs() < INERTIAL_NOISE_FPM);
    }

    #[test]
    fn test_glitch_displaces_one_fix() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut aircraft = cruiser(None);
        aircraft.glitch_at = Some(30.0);

        let clean = aircraft.record(29.0, EPOCH_MS, &mut rng).latitude.unwrap();
        let bad = aircraft.record(30.0, EPOCH_MS, &mut rng).latitude.unwrap();
        let after = aircraft.record(31.0, EPOCH_MS, &mut rng).latitude.unwrap();
        assert!((bad - clean - GLITCH_OFFSET_DEG).abs() < 0.01);
        assert!((after - clean).abs() < 0.01);
    }

    #[test]
    fn test_buffer_expires_old_records() {
        let mut rng = StdRng::seed_from_u64(1);
        let fleet = Fleet {
            aircraft: vec![cruiser(None)],
        };
        let mut buffer = RecordBuffer::new(60_000);
        for t in 0..120 {
            buffer.extend(fleet.records_at(t as f64, EPOCH_MS, &mut rng));
        }
        assert_eq!(buffer.len(), 120);

        let removed = buffer.expire(EPOCH_MS + 119_000);
        assert_eq!(removed, 59);
        assert!(buffer
            .snapshot()
            .iter()
            .all(|r| r.timestamp >= EPOCH_MS + 59_000));
    }

    #[test]
    fn test_burst_classified_turbulent() {
        let mut rng = StdRng::seed_from_u64(42);
        let fleet = Fleet {
            aircraft: vec![cruiser(Some(TurbulenceBurst {
                start: 300.0,
                duration: 60.0,
                amplitude_fpm: 1_500.0,
            }))],
        };
        let records: Vec<_> = (0..600)
            .flat_map(|t| fleet.records_at(t as f64, EPOCH_MS, &mut rng))
            .collect();

        let (dataset, failures) = resample_snapshot(&Snapshot::from_records(records));
        assert!(failures.is_empty());
        let (classified, failures) =
            classify_dataset(&dataset, &Tunables::default(), AnomalyPolicy::Drop);
        assert!(failures.is_empty());
        assert_eq!(classified.len(), 10);

        let turbulent: Vec<i64> = classified
            .turbulent()
            .map(|w| w.stats.window_start.timestamp_millis())
            .collect();
        assert_eq!(turbulent, vec![EPOCH_MS + 300_000]);
    }

    #[test]
    fn test_report_period_has_floor() {
        assert_eq!(report_period(1.0), Duration::from_secs(1));
        assert_eq!(report_period(4.0), Duration::from_millis(250));
        assert_eq!(report_period(1e12), MIN_REPORT_PERIOD);
        assert_eq!(report_period(f64::MAX), MIN_REPORT_PERIOD);
    }

    #[test]
    fn test_demo_fleet() {
        let fleet = create_demo_fleet(50.0, 5.0, true, true);
        assert_eq!(fleet.aircraft.len(), 3);
        assert!(fleet.aircraft[0].turbulence.is_some());
        assert!(fleet.aircraft[2].glitch_at.is_some());

        let plain = create_demo_fleet(50.0, 5.0, false, false);
        assert!(plain.aircraft.iter().all(|a| a.turbulence.is_none() && a.glitch_at.is_none()));
    }
}
