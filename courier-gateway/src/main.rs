//! # Courier Gateway Binary
//!
//! Entry point for the gateway server.
//!
//! ```bash
//! # Default configuration directory (./config)
//! courier-gateway
//!
//! # Custom configuration directory, host and port
//! courier-gateway --config-dir /etc/courier --host 0.0.0.0 --port 8080
//! ```
//!
//! Environment variables: `PORT`, `LOG_LEVEL`, `HEALTH_CHECK_INTERVAL` (ms),
//! `RATE_LIMIT_WINDOW_MS`, plus one API-key variable per provider as named
//! by its descriptor's `api_key_env`.
//!
//! Exit codes: 0 on clean shutdown, 1 on startup failure. On SIGINT/SIGTERM
//! the prober stops first, in-flight requests drain for up to 30 seconds,
//! then the process exits.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use courier_gateway::config::GatewayConfig;
use courier_gateway::prober::HealthProber;
use courier_gateway::server::build_app;

/// Drain budget after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding providers.json, tenants/ and policies/
    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,

    /// Host address to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level when LOG_LEVEL is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = GatewayConfig::load(&args.config_dir)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let health_check_interval = config.health_check_interval;
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let (app, state) = build_app(config).await?;

    // Background tasks stop when the shutdown flag flips.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let prober = HealthProber::new(state.router.clone(), health_check_interval);
    let prober_handle = prober.spawn(shutdown_rx.clone());
    let sweeper_handle = state.rate_limiter.spawn_sweeper(shutdown_rx);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("courier gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    // The prober was signalled before draining began; collect the tasks.
    let _ = prober_handle.await;
    let _ = sweeper_handle.await;

    tracing::info!("courier gateway stopped");
    Ok(())
}

/// Wait for SIGINT/SIGTERM, stop background tasks, then arm the forced-exit
/// timer for requests that outlive the grace period.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping prober and draining requests");
    let _ = shutdown_tx.send(true);

    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        tracing::warn!("grace period expired, forcing exit");
        std::process::exit(0);
    });
}
