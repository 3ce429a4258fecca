//! Turbulence core - trajectory analytics for decoded ADS-B traffic.
//!
//! Resamples irregular per-aircraft reports onto a 1 Hz grid and classifies
//! one-minute windows as turbulent or positionally anomalous.

pub mod classify;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod resample;
pub mod stats;

pub use classify::{classify_track, AnomalyPolicy, Tunables};
pub use error::TrackError;
pub use models::{
    ClassifiedDataset, ClassifiedWindow, Dataset, DecoderRecord, RawTrack, ResampledSample,
    ResampledTrack, Sample, Snapshot, WindowedStats,
};
pub use pipeline::{classify_dataset, resample_snapshot, TrackFailure};
pub use resample::resample_track;
