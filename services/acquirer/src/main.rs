//! Raster acquisition command-line service.
//!
//! Resolves a place name to a bounding box, acquires each requested dataset
//! from the remote raster service (tiling large regions), normalizes every
//! output to the common grid and writes a job manifest.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use acquisition::{
    AcquisitionMetrics, AcquisitionPipeline, FailureMode, HttpRasterService, JobRequest, JobRunner,
    JobStatus, LlmRequestParser, NominatimGeocoder, RequestParser,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "acquirer")]
#[command(about = "Acquire clipped, reprojected raster datasets for a place")]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "ACQUIRER_CONFIG", default_value = "config/acquirer.yaml")]
    config: PathBuf,

    /// Place name to acquire data for
    #[arg(short, long)]
    location: Option<String>,

    /// Dataset identifiers (land_cover, tree_cover, ndvi, population, basemap)
    #[arg(short, long, value_delimiter = ',')]
    datasets: Vec<String>,

    /// Free-text request, parsed into a location and datasets
    #[arg(short, long, conflicts_with = "location")]
    prompt: Option<String>,

    /// Product year
    #[arg(long)]
    year: Option<i32>,

    /// Resample every output onto this dataset's grid
    #[arg(long)]
    align_to: Option<String>,

    /// Keep going when some tiles fail, leaving them as nodata
    #[arg(long)]
    best_effort: bool,

    /// Directory for finished rasters and manifests
    #[arg(long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let mut app = AppConfig::load_or_default(&args.config)?.with_env_overrides();
    if let Some(dir) = &args.output_dir {
        app.acquisition.output_dir = dir.clone();
    }
    if args.best_effort {
        app.acquisition.failure_mode = FailureMode::BestEffort;
    }
    app.validate()?;

    let request = build_request(&args, &app).await?;
    info!(
        location = %request.location,
        datasets = ?request.datasets,
        year = ?request.year,
        "Starting raster acquisition"
    );

    let service = Arc::new(
        HttpRasterService::new(app.remote.clone()).context("Failed to create raster service client")?,
    );
    let geocoder = Arc::new(
        NominatimGeocoder::new(app.geocoder.clone()).context("Failed to create geocoder client")?,
    );
    let metrics = Arc::new(AcquisitionMetrics::new());
    let pipeline = AcquisitionPipeline::new(app.acquisition.clone(), service, metrics.clone())
        .context("Failed to create acquisition pipeline")?;
    let runner = JobRunner::new(pipeline, geocoder);

    let manifest = runner.run(&request).await.context("Job failed")?;

    println!("{}", serde_json::to_string_pretty(&manifest)?);

    let stats = metrics.snapshot();
    info!(
        tiles_fetched = stats.tiles_fetched,
        tile_retries = stats.tile_retries,
        tile_failures = stats.tile_failures,
        direct_fetches = stats.direct_fetches,
        escalations = stats.escalations,
        datasets_succeeded = stats.datasets_succeeded,
        datasets_failed = stats.datasets_failed,
        datasets_skipped = stats.datasets_skipped,
        "Acquisition statistics"
    );

    if manifest.status == JobStatus::Failed {
        bail!("no dataset could be acquired for '{}'", manifest.location);
    }
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    // RUST_LOG takes precedence over --log-level
    if std::env::var("RUST_LOG").is_ok() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        return Ok(());
    }

    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Turn the command line into a job request, parsing `--prompt` if given.
async fn build_request(args: &Args, app: &AppConfig) -> Result<JobRequest> {
    let mut request = if let Some(prompt) = &args.prompt {
        let parser = LlmRequestParser::new(app.parser.clone())
            .context("Failed to create request parser")?;
        let parsed = parser.parse(prompt).await?;
        for hint in parsed.clarifications() {
            warn!(hint = %hint, "Request may need clarification");
        }
        JobRequest::from(parsed)
    } else if let Some(location) = &args.location {
        JobRequest {
            location: location.clone(),
            ..Default::default()
        }
    } else {
        bail!("either --location or --prompt is required");
    };

    if !args.datasets.is_empty() {
        request.datasets = args.datasets.clone();
    }
    if request.datasets.is_empty() {
        request.datasets = acquisition::DatasetKind::ALL
            .iter()
            .map(|d| d.as_str().to_string())
            .collect();
    }
    request.year = args.year;
    request.align_to = args.align_to.clone();

    Ok(request)
}
