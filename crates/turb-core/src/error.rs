//! Per-track failures raised while resampling or classifying.

use thiserror::Error;

/// Failure confined to a single track. Other tracks in the same cycle are
/// processed regardless.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// Timestamps go backwards somewhere in the track.
    #[error("timestamps decrease at sample {index}")]
    NonMonotonic { index: usize },

    /// Not enough history for stable statistics.
    #[error("degenerate track: {0}")]
    Degenerate(&'static str),

    /// First and last reports are implausibly far apart, usually one
    /// corrupted timestamp.
    #[error("track spans {span_ms} ms")]
    SpanTooLong { span_ms: i64 },

    /// Processing the track panicked.
    #[error("track processing panicked: {0}")]
    Panicked(String),

    /// A statistic came out non-finite.
    #[error("non-finite {0} statistic")]
    NonFinite(&'static str),
}
