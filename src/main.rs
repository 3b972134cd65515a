use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatehouse::config::GatehouseConfig;
use gatehouse::http::HttpServer;
use gatehouse::ratelimit::{RateLimiter, Sweeper};

/// Fixed-window rate limiting service for public and admin API routes.
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to serve HTTP on, overriding the configuration
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Gatehouse Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GatehouseConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    info!(
        http_addr = %config.server.http_addr,
        window_ms = config.rate_limiting.window_ms,
        public_max_requests = config.rate_limiting.public_max_requests,
        admin_max_requests = config.rate_limiting.admin_max_requests,
        admin_path_prefix = %config.server.admin_path_prefix,
        "Configuration loaded"
    );

    // Initialize the rate limiter
    let rate_limiter = Arc::new(RateLimiter::with_settings(
        config.rate_limiting.limit_settings(),
    ));
    let sweeper = Sweeper::spawn(
        Arc::clone(&rate_limiter),
        config.rate_limiting.sweep_interval(),
    );
    info!("Rate limiter initialized");

    let http_server = HttpServer::new(config.server.http_addr, Arc::clone(&rate_limiter))
        .with_route_classifier(config.server.route_classifier());
    let served = http_server.serve_with_shutdown(shutdown_signal()).await;

    sweeper.shutdown().await;
    served?;

    info!("Gatehouse Rate Limiting Service stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
