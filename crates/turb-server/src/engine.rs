//! Analytics engine: owns the published generation and the refresh worker.
//!
//! Each refresh cycle builds a complete [`Generation`] off to the side and
//! publishes it with one atomic handle swap. Readers load the handle without
//! locking and always see a dataset and classified dataset from the same
//! cycle. A failed pull leaves the previous generation in place.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinError, JoinHandle};

use turb_core::classify::{AnomalyPolicy, Tunables};
use turb_core::models::{ClassifiedDataset, Dataset};
use turb_core::pipeline::{classify_dataset, resample_snapshot, TrackFailure};

use crate::control::SharedControl;
use crate::loops::refresh_loop::run_refresh_loop;
use crate::source::{RawSampleSource, SourceError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("analytics task failed: {0}")]
    Compute(#[from] JoinError),
    #[error("cannot start engine in state {0:?}")]
    InvalidTransition(EngineState),
}

/// Engine lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
}

enum Lifecycle {
    Idle,
    Running {
        shutdown: broadcast::Sender<()>,
        worker: JoinHandle<()>,
    },
    Stopped,
}

impl Lifecycle {
    fn state(&self) -> EngineState {
        match self {
            Self::Idle => EngineState::Idle,
            Self::Running { .. } => EngineState::Running,
            Self::Stopped => EngineState::Stopped,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub refresh_period: Duration,
    /// Upper bound on one snapshot pull
    pub fetch_timeout: Duration,
    pub anomaly_policy: AnomalyPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            refresh_period: Duration::from_secs(1),
            fetch_timeout: Duration::from_millis(5500),
            anomaly_policy: AnomalyPolicy::Drop,
        }
    }
}

/// One atomically published (Dataset, ClassifiedDataset) pair.
#[derive(Debug, Serialize)]
pub struct Generation {
    pub id: u64,
    pub produced_at: DateTime<Utc>,
    /// Tunables this generation was classified with
    pub tunables: Tunables,
    #[serde(skip)]
    pub dataset: Arc<Dataset>,
    #[serde(skip)]
    pub classified: Arc<ClassifiedDataset>,
    pub failures: Vec<TrackFailure>,
    pub rejected_records: usize,
}

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Published {
        generation: u64,
        tracks: usize,
        windows: usize,
    },
    /// The source had nothing; the previous generation stays.
    NoData,
}

pub struct AnalyticsEngine {
    source: Arc<dyn RawSampleSource>,
    control: SharedControl,
    settings: EngineSettings,
    generation: ArcSwapOption<Generation>,
    next_generation: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
    /// Serializes cycles so at most one is ever in flight.
    cycle: Mutex<()>,
}

impl AnalyticsEngine {
    pub fn new(
        source: Arc<dyn RawSampleSource>,
        control: SharedControl,
        settings: EngineSettings,
    ) -> Self {
        Self {
            source,
            control,
            settings,
            generation: ArcSwapOption::empty(),
            next_generation: AtomicU64::new(1),
            lifecycle: Mutex::new(Lifecycle::Idle),
            cycle: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn control(&self) -> &SharedControl {
        &self.control
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub async fn state(&self) -> EngineState {
        self.lifecycle.lock().await.state()
    }

    /// Launch the refresh worker. Only valid from `Idle`.
    pub async fn start(self: &Arc<Self>) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return Err(EngineError::InvalidTransition(lifecycle.state()));
        }

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let worker = tokio::spawn(run_refresh_loop(self.clone(), shutdown_rx));
        *lifecycle = Lifecycle::Running { shutdown, worker };
        tracing::info!(
            "Analytics engine started against {}",
            self.source.describe()
        );
        Ok(())
    }

    /// Stop the refresh worker and wait for it to exit.
    ///
    /// A cycle already in flight runs to completion (publication or its
    /// failure path) before this returns; no cycle starts afterwards.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped);
        if let Lifecycle::Running { shutdown, worker } = previous {
            // The worker may already be gone if it panicked
            let _ = shutdown.send(());
            worker.await?;
            tracing::info!("Analytics engine stopped");
        }
        Ok(())
    }

    /// Current generation, or `None` before the first one is published.
    pub fn current_generation(&self) -> Option<Arc<Generation>> {
        self.generation.load_full()
    }

    pub fn current_dataset(&self) -> Option<Arc<Dataset>> {
        self.current_generation().map(|g| Arc::clone(&g.dataset))
    }

    pub fn current_classified_dataset(&self) -> Option<Arc<ClassifiedDataset>> {
        self.current_generation().map(|g| Arc::clone(&g.classified))
    }

    pub fn threshold_floor(&self) -> f64 {
        self.control.threshold_floor()
    }

    pub fn multiplier(&self) -> f64 {
        self.control.multiplier()
    }

    /// Run one pull/resample/classify/publish cycle.
    pub async fn refresh_once(&self) -> Result<CycleOutcome, EngineError> {
        let _cycle = self.cycle.lock().await;
        let tunables = self.control.snapshot();

        let timeout = self.settings.fetch_timeout;
        let snapshot = tokio::time::timeout(timeout, self.source.fetch_snapshot())
            .await
            .map_err(|_| SourceError::Timeout(timeout))??;
        if snapshot.is_empty() {
            return Ok(CycleOutcome::NoData);
        }

        let policy = self.settings.anomaly_policy;
        let rejected_records = snapshot.rejected_records;
        let (dataset, classified, failures) = tokio::task::spawn_blocking(move || {
            let (dataset, mut failures) = resample_snapshot(&snapshot);
            let (classified, classify_failures) = classify_dataset(&dataset, &tunables, policy);
            failures.extend(classify_failures);
            (dataset, classified, failures)
        })
        .await?;

        for failure in &failures {
            tracing::warn!("Skipped track {}: {}", failure.icao24, failure.error);
        }

        let id = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let outcome = CycleOutcome::Published {
            generation: id,
            tracks: dataset.len(),
            windows: classified.len(),
        };
        self.generation.store(Some(Arc::new(Generation {
            id,
            produced_at: Utc::now(),
            tunables,
            dataset: Arc::new(dataset),
            classified: Arc::new(classified),
            failures,
            rejected_records,
        })));
        Ok(outcome)
    }
}
