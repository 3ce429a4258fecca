//! Turbulence server - always-on analytics backend over a Mode S decoder feed

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turb_server::api;
use turb_server::config::Config;
use turb_server::control::RuntimeControl;
use turb_server::engine::AnalyticsEngine;
use turb_server::source::{DecoderClient, RawSampleSource, ReplaySource};

#[derive(Parser, Debug)]
#[command(name = "turb-server", about = "Streaming turbulence analytics server")]
struct Args {
    /// HTTP port (overrides TURB_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Decoder base URL (overrides TURB_DECODER_URL)
    #[arg(long)]
    decoder_url: Option<String>,

    /// Analyse a recorded snapshot once instead of polling the decoder
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Serve the API without starting the refresh loop
    #[arg(long)]
    live_disable: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("turb_server=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(url) = args.decoder_url {
        config.decoder_url = url;
    }
    if args.replay.is_some() {
        config.replay_path = args.replay;
    }
    config.live_disable |= args.live_disable;

    tracing::info!("Starting turbulence server...");

    let source: Arc<dyn RawSampleSource> = match &config.replay_path {
        Some(path) => Arc::new(ReplaySource::from_path(path)?),
        None => Arc::new(DecoderClient::new(
            config.decoder_url.clone(),
            config.fetch_timeout,
        )?),
    };
    tracing::info!("Snapshot source: {}", source.describe());

    let control = Arc::new(RuntimeControl::new(config.tunables())?);
    let engine = Arc::new(AnalyticsEngine::new(
        source,
        control,
        config.engine_settings(),
    ));

    if config.replay_path.is_some() {
        let outcome = engine.refresh_once().await?;
        tracing::info!("Replay analysed: {:?}", outcome);
    } else if config.live_disable {
        tracing::warn!("Live refresh disabled; API will report no data");
    } else {
        engine.start().await?;
    }

    let app = api::routes()
        .with_state(engine.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", err);
            }
        })
        .await?;

    tracing::info!("HTTP server stopped, stopping engine");
    engine.stop().await?;

    Ok(())
}
