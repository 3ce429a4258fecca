//! Aircraft flight paths.

use std::f64::consts::PI;

const METERS_PER_DEGREE: f64 = 111_320.0;

/// A trajectory parameterised by seconds since the start of the simulation.
pub trait FlightPath: Send + Sync {
    /// (latitude, longitude) at time t.
    fn position(&self, t: f64) -> (f64, f64);

    /// Pressure altitude in feet at time t.
    fn altitude_ft(&self, t: f64) -> f64;

    /// True climb rate in feet per minute.
    fn vertical_rate_fpm(&self, t: f64) -> f64 {
        let dt = 1.0;
        (self.altitude_ft(t + dt) - self.altitude_ft(t)) / dt * 60.0
    }

    /// Track over ground at time t (degrees, 0 = North).
    fn track_deg(&self, t: f64) -> f64 {
        let dt = 0.1;
        let (lat1, lon1) = self.position(t);
        let (lat2, lon2) = self.position(t + dt);

        let dlat = lat2 - lat1;
        let dlon = (lon2 - lon1) * lat1.to_radians().cos();
        if dlat.abs() < 1e-12 && dlon.abs() < 1e-12 {
            return 0.0;
        }
        dlon.atan2(dlat).to_degrees().rem_euclid(360.0)
    }
}

/// Holding pattern flown as a circle around a fix.
pub struct CircularPath {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: f64,
    pub altitude_ft: f64,
    pub speed_mps: f64,
    pub clockwise: bool,
    period: f64,
}

impl CircularPath {
    pub fn new(
        center_lat: f64,
        center_lon: f64,
        radius_m: f64,
        altitude_ft: f64,
        speed_mps: f64,
        clockwise: bool,
    ) -> Self {
        let period = 2.0 * PI * radius_m / speed_mps;
        Self {
            center_lat,
            center_lon,
            radius_m,
            altitude_ft,
            speed_mps,
            clockwise,
            period,
        }
    }

    /// Seconds per full circle.
    pub fn period(&self) -> f64 {
        self.period
    }
}

impl FlightPath for CircularPath {
    fn position(&self, t: f64) -> (f64, f64) {
        let mut angle = 2.0 * PI * t / self.period;
        if self.clockwise {
            angle = -angle;
        }
        let lat_offset = self.radius_m * angle.cos() / METERS_PER_DEGREE;
        let lon_offset =
            self.radius_m * angle.sin() / (METERS_PER_DEGREE * self.center_lat.to_radians().cos());
        (self.center_lat + lat_offset, self.center_lon + lon_offset)
    }

    fn altitude_ft(&self, _t: f64) -> f64 {
        self.altitude_ft
    }

    fn vertical_rate_fpm(&self, _t: f64) -> f64 {
        0.0
    }
}

/// Straight leg between two points with a constant climb or descent.
///
/// The aircraft holds the end point and altitude once the leg is flown.
pub struct LinearPath {
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub start_altitude_ft: f64,
    pub end_altitude_ft: f64,
    pub speed_mps: f64,
    pub duration: f64,
    track: f64,
}

impl LinearPath {
    pub fn new(
        start: (f64, f64),
        end: (f64, f64),
        start_altitude_ft: f64,
        end_altitude_ft: f64,
        speed_mps: f64,
    ) -> Self {
        let distance_m = haversine_distance(start.0, start.1, end.0, end.1);
        let duration = if speed_mps > 0.0 {
            distance_m / speed_mps
        } else {
            0.0
        };
        let dlat = end.0 - start.0;
        let dlon = (end.1 - start.1) * start.0.to_radians().cos();
        let track = dlon.atan2(dlat).to_degrees().rem_euclid(360.0);

        Self {
            start,
            end,
            start_altitude_ft,
            end_altitude_ft,
            speed_mps,
            duration,
            track,
        }
    }

    fn progress(&self, t: f64) -> f64 {
        if self.duration > 0.0 {
            (t / self.duration).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

impl FlightPath for LinearPath {
    fn position(&self, t: f64) -> (f64, f64) {
        let p = self.progress(t);
        (
            self.start.0 + p * (self.end.0 - self.start.0),
            self.start.1 + p * (self.end.1 - self.start.1),
        )
    }

    fn altitude_ft(&self, t: f64) -> f64 {
        self.start_altitude_ft + self.progress(t) * (self.end_altitude_ft - self.start_altitude_ft)
    }

    fn vertical_rate_fpm(&self, t: f64) -> f64 {
        if self.duration <= 0.0 || t >= self.duration {
            return 0.0;
        }
        (self.end_altitude_ft - self.start_altitude_ft) / self.duration * 60.0
    }

    fn track_deg(&self, _t: f64) -> f64 {
        self.track
    }
}

/// Point `distance_m` away along `bearing_deg`, flat-earth approximation.
pub fn offset(lat: f64, lon: f64, distance_m: f64, bearing_deg: f64) -> (f64, f64) {
    let bearing = bearing_deg.to_radians();
    let dlat = distance_m * bearing.cos() / METERS_PER_DEGREE;
    let dlon = distance_m * bearing.sin() / (METERS_PER_DEGREE * lat.to_radians().cos());
    (lat + dlat, lon + dlon)
}

/// Great-circle distance in meters.
fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const R: f64 = 6_371_000.0;

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * R * a.sqrt().atan2((1.0 - a).sqrt())
}
