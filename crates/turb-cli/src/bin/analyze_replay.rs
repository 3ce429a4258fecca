//! One-shot analysis of a recorded decoder snapshot.
//!
//! Usage: analyze_replay traffic.json [--multiplier 1.5] [--json]

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

use turb_core::classify::{AnomalyPolicy, Tunables};
use turb_core::models::ClassifiedWindow;
use turb_core::pipeline::{classify_dataset, resample_snapshot, TrackFailure};
use turb_server::control::RuntimeControl;
use turb_server::source::parse_snapshot;

/// Resample and classify a recorded snapshot
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// `{"traffic": [...]}` document or bare array of decoder records
    snapshot: PathBuf,

    #[arg(long, default_value_t = Tunables::default().threshold_floor)]
    threshold_floor: f64,

    #[arg(long, default_value_t = Tunables::default().multiplier)]
    multiplier: f64,

    /// drop | flag
    #[arg(long, default_value = "drop")]
    anomaly_policy: String,

    /// Print every window as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    tunables: Tunables,
    rejected_records: usize,
    windows: &'a [ClassifiedWindow],
    failures: Vec<TrackFailure>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let policy = AnomalyPolicy::parse(&args.anomaly_policy)
        .with_context(|| format!("unknown anomaly policy {:?}", args.anomaly_policy))?;
    let tunables = RuntimeControl::new(Tunables {
        threshold_floor: args.threshold_floor,
        multiplier: args.multiplier,
    })?
    .snapshot();

    let bytes = std::fs::read(&args.snapshot)
        .with_context(|| format!("reading {}", args.snapshot.display()))?;
    let snapshot = parse_snapshot(&bytes)?;

    let (dataset, mut failures) = resample_snapshot(&snapshot);
    let (classified, classify_failures) = classify_dataset(&dataset, &tunables, policy);
    failures.extend(classify_failures);

    if args.json {
        let report = Report {
            tunables,
            rejected_records: snapshot.rejected_records,
            windows: &classified.windows,
            failures,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} raw tracks, {} resampled, {} rejected records",
        snapshot.len(),
        dataset.len(),
        snapshot.rejected_records
    );
    println!(
        "Tunables: floor {} multiplier {} policy {:?}\n",
        tunables.threshold_floor, tunables.multiplier, policy
    );

    for track in dataset.tracks.values() {
        let windows: Vec<&ClassifiedWindow> = classified.for_track(&track.icao24).collect();
        let threshold = windows.first().map(|w| w.threshold);
        println!(
            "{:<8} {:<9} {:>5} s  {:>3} windows  threshold {}",
            track.icao24,
            track.callsign.as_deref().unwrap_or("-"),
            track.samples.len(),
            windows.len(),
            threshold.map_or("-".to_string(), |t| format!("{:.1}", t)),
        );
        for window in windows.iter().filter(|w| w.is_turbulent() || w.is_anomalous) {
            println!(
                "    {}  criterion {:>8}  {}{}",
                window.stats.window_start.format("%H:%M"),
                window
                    .criterion
                    .map_or("-".to_string(), |c| format!("{:.1}", c)),
                if window.is_turbulent() { "TURBULENT " } else { "" },
                if window.is_anomalous { "ANOMALOUS" } else { "" },
            );
        }
    }

    for failure in &failures {
        eprintln!("skipped {}: {}", failure.icao24, failure.error);
    }

    Ok(())
}
