//! Raster tile compute service binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tile_api::config::ServerConfig;
use tile_api::state::AppState;
use tile_api::sweeper::{CacheSweeper, SweeperConfig};

#[derive(Parser, Debug)]
#[command(name = "tile-api")]
#[command(about = "Raster tile compute server for spectral indices and true-color imagery")]
struct Args {
    /// Listen address (defaults to HOST:PORT)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Log filter directive
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long, env = "TOKIO_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    tile_api::metrics::describe();
    info!("Prometheus metrics exporter initialized");

    let config = ServerConfig::from_env();
    let listen = args.listen.clone().unwrap_or_else(|| config.listen_addr());
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", listen))?;

    info!(
        data_dir = %config.data_dir.display(),
        default_dataset = %config.default_dataset,
        tile_size = config.tile_size,
        max_zoom = config.max_zoom,
        cache_max_age_secs = config.cache_max_age.as_secs(),
        "Starting tile server"
    );

    let state = Arc::new(AppState::new(config, prometheus_handle));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = CacheSweeper::new(Arc::clone(&state.cache), SweeperConfig::from(&state.config));
    let sweeper_task = tokio::spawn(sweeper.run_until(shutdown_rx));

    let app = tile_api::build_router(state);

    info!(address = %addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down");
    shutdown_tx.send(true).ok();
    sweeper_task.await.context("Sweeper task panicked")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
