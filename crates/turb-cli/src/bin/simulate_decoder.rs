//! Synthetic decoder feed.
//!
//! Flies a small fleet and serves every record still inside the retention
//! window on `GET /traffic`, the same shape a live decoder answers with.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turb_cli::sim::{create_demo_fleet, report_period, RecordBuffer};

/// Serve synthetic ADS-B traffic for the turbulence server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to serve /traffic on
    #[arg(long, default_value_t = 5050)]
    port: u16,

    /// Center latitude of the scenario
    #[arg(long, default_value_t = 52.3086)]
    lat: f64,

    /// Center longitude of the scenario
    #[arg(long, default_value_t = 4.7639)]
    lon: f64,

    /// Reports per aircraft per second
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Seconds of history kept and served
    #[arg(long, default_value_t = 1800)]
    retention: u64,

    /// Fly the cruiser through a turbulence burst
    #[arg(long)]
    turbulence: bool,

    /// Emit one corrupted position fix
    #[arg(long)]
    glitch: bool,

    /// Seed for reproducible noise
    #[arg(long)]
    seed: Option<u64>,
}

type SharedBuffer = Arc<Mutex<RecordBuffer>>;

async fn traffic(State(buffer): State<SharedBuffer>) -> Json<Value> {
    let records = buffer.lock().await.snapshot();
    Json(json!({ "traffic": records }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("simulate_decoder=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    if !(args.rate.is_finite() && args.rate > 0.0) {
        anyhow::bail!("--rate must be positive, got {}", args.rate);
    }

    let fleet = create_demo_fleet(args.lat, args.lon, args.turbulence, args.glitch);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let retention_ms = (args.retention * 1000) as i64;
    let buffer: SharedBuffer = Arc::new(Mutex::new(RecordBuffer::new(retention_ms)));

    tracing::info!(
        "Simulating {} aircraft at {} Hz (turbulence: {}, glitch: {})",
        fleet.aircraft.len(),
        args.rate,
        args.turbulence,
        args.glitch
    );

    let period = report_period(args.rate);
    let producer = buffer.clone();
    tokio::spawn(async move {
        let epoch_ms = Utc::now().timestamp_millis();
        let start = time::Instant::now();
        let mut interval = time::interval(period);
        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs_f64();
            let records = fleet.records_at(elapsed, epoch_ms, &mut rng);

            let mut buffer = producer.lock().await;
            buffer.extend(records);
            let expired = buffer.expire(Utc::now().timestamp_millis());
            if expired > 0 {
                tracing::debug!("Expired {} record(s), {} held", expired, buffer.len());
            }
        }
    });

    let app = Router::new()
        .route("/traffic", get(traffic))
        .with_state(buffer);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("Serving /traffic on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
