//! Flux proxy server.
//!
//! Serves `GET /api/geotiff-proxy?url=...` for allow-listed provider hosts,
//! plus `/health` and Prometheus `/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use flux_proxy::{router, ProxyConfig, ProxyState};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "flux-proxy")]
#[command(about = "CORS image proxy for solar flux GeoTIFFs")]
struct Args {
    #[command(flatten)]
    proxy: ProxyConfig,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    let addr: SocketAddr = args
        .proxy
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.proxy.listen))?;
    info!(
        allowed = ?args.proxy.allowed_domains,
        max_bytes = args.proxy.max_bytes,
        timeout_secs = args.proxy.upstream_timeout_secs,
        "Starting flux proxy"
    );

    let state = Arc::new(ProxyState::new(args.proxy, Some(prometheus))?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, "Listening");
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
