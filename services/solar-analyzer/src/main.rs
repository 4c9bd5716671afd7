//! Solar analyzer CLI.
//!
//! Runs one or more searches against a single map view and writes the
//! final overlay plus a JSON report into the output directory.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use renderer::Resampling;
use solar_analyzer::{AnalyzerConfig, FileMapView, SearchInput, SearchPipeline, SearchReport};
use solar_common::{LatLng, Viewport};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "solar-analyzer")]
#[command(about = "Render the solar flux overlay for an address")]
struct Args {
    /// Address to search; may be repeated
    #[arg(short, long)]
    address: Vec<String>,

    /// Latitude of a pre-resolved location (requires --lng)
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of a pre-resolved location (requires --lat)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,

    /// YAML configuration file
    #[arg(short, long, env = "SOLAR_ANALYZER_CONFIG")]
    config: Option<PathBuf>,

    /// API key for geocoding and solar requests
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the image proxy
    #[arg(long, env = "PROXY_BASE_URL")]
    proxy_base_url: Option<String>,

    /// Directory for the overlay and report
    #[arg(short, long, default_value = "solar-output")]
    output_dir: PathBuf,

    /// Overlay canvas width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Overlay canvas height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Blend neighbouring samples instead of nearest-neighbour
    #[arg(long)]
    bilinear: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let config = build_config(&args)?;
    let inputs = search_inputs(&args)?;

    let view = FileMapView::new(&args.output_dir)?;
    let pipeline = SearchPipeline::from_config(&config, view).context("Failed to build search pipeline")?;

    let mut reports: Vec<SearchReport> = Vec::with_capacity(inputs.len());
    let mut failures = 0;
    for input in inputs {
        match pipeline.search(input.clone()).await {
            Ok(report) => {
                info!(
                    kind = report.overlay_kind.unwrap_or("none"),
                    simulated = report.is_simulated(),
                    "Search finished"
                );
                reports.push(report);
            }
            Err(e) => {
                failures += 1;
                error!(input = ?input, error = %e, kind = e.kind(), "Search failed");
                eprintln!("{}", e.user_message());
            }
        }
    }

    let report_path = args.output_dir.join("report.json");
    let json = serde_json::to_vec_pretty(&reports)?;
    std::fs::write(&report_path, json).with_context(|| format!("Failed to write {:?}", report_path))?;
    info!(path = ?report_path, searches = reports.len(), failures, "Report written");

    if failures > 0 && reports.is_empty() {
        bail!("all searches failed");
    }
    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Defaults, then the config file, then the environment, then flags.
fn build_config(args: &Args) -> Result<AnalyzerConfig> {
    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::load(path)?,
        None => AnalyzerConfig::default(),
    };
    config.apply_env();

    if let Some(key) = &args.api_key {
        config.api_key = key.clone();
    }
    if let Some(base) = &args.proxy_base_url {
        config.proxy_base_url = base.clone();
    }
    if args.width.is_some() || args.height.is_some() {
        config.viewport = Viewport::new(
            args.width.unwrap_or(config.viewport.width_px),
            args.height.unwrap_or(config.viewport.height_px),
        );
    }
    if args.bilinear {
        config.resampling = Resampling::Bilinear;
    }

    config.validate()?;
    if config.api_key.is_empty() {
        bail!("an API key is required (--api-key or GOOGLE_API_KEY)");
    }
    Ok(config)
}

fn search_inputs(args: &Args) -> Result<Vec<SearchInput>> {
    let mut inputs: Vec<SearchInput> = args.address.iter().cloned().map(SearchInput::Address).collect();
    if let (Some(lat), Some(lng)) = (args.lat, args.lng) {
        inputs.push(SearchInput::Location(LatLng::new(lat, lng)));
    }
    if inputs.is_empty() {
        bail!("nothing to search: pass --address or --lat/--lng");
    }
    Ok(inputs)
}
