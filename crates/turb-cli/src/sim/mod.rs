//! Synthetic ADS-B traffic.

pub mod fleet;
pub mod paths;

pub use fleet::{
    create_demo_fleet, report_period, Fleet, RecordBuffer, SimAircraft, TurbulenceBurst,
    MIN_REPORT_PERIOD,
};
pub use paths::{CircularPath, FlightPath, LinearPath};
