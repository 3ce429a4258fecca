//! Periodic analytics refresh loop.
//!
//! Pulls the decoder snapshot, resamples, classifies and publishes one
//! generation per tick. Source outages are retried every tick and never end
//! the loop; shutdown is only observed between cycles.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::{AnalyticsEngine, CycleOutcome, EngineError};
use crate::outage::OutageTracker;

const OUTAGE_REPORT_BASE_SECS: u64 = 10;
const OUTAGE_REPORT_MAX_SECS: u64 = 300;

/// Start the refresh loop.
pub async fn run_refresh_loop(engine: Arc<AnalyticsEngine>, mut shutdown: broadcast::Receiver<()>) {
    let period = engine.settings().refresh_period;
    let mut ticker = interval(period);
    // A slow cycle pushes the next one back instead of bursting to catch up
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut outage = OutageTracker::new(
        Duration::from_secs(OUTAGE_REPORT_BASE_SECS),
        Duration::from_secs(OUTAGE_REPORT_MAX_SECS),
    );

    tracing::info!("Refresh loop running every {:?}", period);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("Refresh loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                match engine.refresh_once().await {
                    Ok(outcome) => {
                        if let Some((failures, elapsed)) = outage.recover() {
                            tracing::info!(
                                "Snapshot source recovered after {} failed pull(s) over {:?}",
                                failures,
                                elapsed
                            );
                        }
                        match outcome {
                            CycleOutcome::Published { generation, tracks, windows } => {
                                tracing::debug!(
                                    "Published generation {} ({} tracks, {} windows)",
                                    generation,
                                    tracks,
                                    windows
                                );
                            }
                            CycleOutcome::NoData => {
                                tracing::debug!("Snapshot source returned no data");
                            }
                        }
                    }
                    Err(EngineError::Source(err)) => {
                        if let Some(failures) = outage.fail() {
                            tracing::warn!(
                                "Snapshot pull failed ({} in a row), keeping previous generation: {}",
                                failures,
                                err
                            );
                        } else {
                            tracing::debug!("Snapshot pull failed: {}", err);
                        }
                    }
                    Err(err) => {
                        tracing::error!("Refresh cycle failed: {}", err);
                    }
                }
            }
        }
    }
}
