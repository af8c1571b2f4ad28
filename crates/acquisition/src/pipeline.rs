//! Per-dataset acquisition: plan, fetch, stitch, clip, reproject, write,
//! validate.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use geo_common::BoundingBox;
use grid_processor::{decode_geotiff, encode_geotiff, read_geotiff, RasterBuffer, SpatialProcessor, TilePlan};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{DatasetKind, OutputLayout, RasterSource};
use crate::config::{AcquisitionConfig, FailureMode};
use crate::error::{AcquisitionError, Result, ServiceError};
use crate::fetcher::TileFetcher;
use crate::metrics::{AcquisitionMetrics, DatasetStatus};
use crate::planner::{AcquisitionPlan, AcquisitionPlanner};
use crate::service::RasterService;
use crate::stitcher::Stitcher;
use crate::validator::{self, ValidationRecord};

/// One dataset to acquire for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRequest {
    pub dataset: DatasetKind,
    pub bbox: BoundingBox,
    pub year: i32,
    pub job_id: String,
}

/// A finished, validated output raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetOutput {
    pub dataset: DatasetKind,
    pub path: PathBuf,
    pub source_name: String,
    /// Product year actually used.
    pub year: i32,
    /// Acquisition scale in meters per pixel.
    pub scale: f64,
    pub bbox: BoundingBox,
    pub validation: ValidationRecord,
}

/// Runs dataset requests against one remote service.
///
/// Cheap to clone; clones share the service client and metrics.
#[derive(Clone)]
pub struct AcquisitionPipeline {
    config: Arc<AcquisitionConfig>,
    planner: AcquisitionPlanner,
    fetcher: TileFetcher,
    processor: SpatialProcessor,
    metrics: Arc<AcquisitionMetrics>,
}

impl AcquisitionPipeline {
    pub fn new(
        config: AcquisitionConfig,
        service: Arc<dyn RasterService>,
        metrics: Arc<AcquisitionMetrics>,
    ) -> Result<Self> {
        config.validate().map_err(AcquisitionError::Config)?;

        let processor = SpatialProcessor::new(config.processing.clone())?;
        let planner = AcquisitionPlanner::new(&config, metrics.clone());
        let fetcher = TileFetcher::new(service, config.retry, metrics.clone());

        Ok(Self {
            config: Arc::new(config),
            planner,
            fetcher,
            processor,
            metrics,
        })
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<AcquisitionMetrics> {
        &self.metrics
    }

    /// Final output path for a dataset of a job.
    pub fn output_path(&self, job_id: &str, dataset: DatasetKind) -> PathBuf {
        self.config.output_dir.join(format!("{job_id}_{dataset}.tif"))
    }

    fn temp_path(&self, job_id: &str, dataset: DatasetKind) -> PathBuf {
        self.config.temp_dir.join(format!("{job_id}_{dataset}.tif"))
    }

    /// Acquire one dataset end to end.
    ///
    /// The whole acquisition runs under the configured timeout. On error or
    /// timeout nothing is left in the output directory.
    #[instrument(skip(self, request), fields(dataset = %request.dataset, job_id = %request.job_id))]
    pub async fn run(&self, request: &DatasetRequest) -> Result<DatasetOutput> {
        let start = Instant::now();
        let timeout = self.config.dataset_timeout();
        let temp_path = self.temp_path(&request.job_id, request.dataset);

        let result = match tokio::time::timeout(timeout, self.acquire_to_file(request, &temp_path)).await {
            Ok(result) => result,
            Err(_) => Err(AcquisitionError::Timeout {
                dataset: request.dataset.to_string(),
                seconds: timeout.as_secs(),
            }),
        };

        let result = match result {
            Ok(path) => {
                let expected = self.config.target_crs;
                let validate_path = path.clone();
                tokio::task::spawn_blocking(move || validator::validate(&validate_path, &expected))
                    .await
                    .map_err(|e| AcquisitionError::processing(format!("validation task failed: {e}")))
                    .map(|validation| DatasetOutput {
                        dataset: request.dataset,
                        path,
                        source_name: request.dataset.source_name().to_string(),
                        year: request.dataset.resolve_year(request.year),
                        scale: request.dataset.native_scale(),
                        bbox: request.bbox,
                        validation,
                    })
            }
            Err(e) => {
                remove_if_exists(&temp_path).await;
                Err(e)
            }
        };

        let elapsed = start.elapsed();
        match &result {
            Ok(output) => {
                self.metrics.record_dataset(DatasetStatus::Succeeded, elapsed);
                info!(
                    path = %output.path.display(),
                    crs_match = output.validation.crs_match,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Dataset acquired"
                );
            }
            Err(e) => {
                self.metrics.record_dataset(DatasetStatus::Failed, elapsed);
                error!(error = %e, elapsed_ms = elapsed.as_millis() as u64, "Dataset acquisition failed");
            }
        }

        result
    }

    /// Fetch, normalize and write. Returns the final output path.
    async fn acquire_to_file(&self, request: &DatasetRequest, temp_path: &Path) -> Result<PathBuf> {
        let scale = request.dataset.native_scale();
        let layout = request.dataset.layout();
        let sources = request.dataset.sources(request.year);

        let mut layers = Vec::with_capacity(sources.len());
        for source in &sources {
            layers.push(self.acquire_raster(source, &request.bbox, scale, layout).await?);
        }
        let raster = if layers.len() == 1 {
            layers.remove(0)
        } else {
            RasterBuffer::stack(layers)?
        };

        let processor = self.processor.clone();
        let bbox = request.bbox;
        let target_crs = self.config.target_crs;
        let resolution = self.config.target_resolution;
        let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let processed = processor.clip_and_reproject(&raster, &bbox, target_crs, resolution)?;
            debug!(
                width = processed.width(),
                height = processed.height(),
                bands = processed.bands(),
                "Raster normalized"
            );
            Ok(encode_geotiff(&processed)?)
        })
        .await
        .map_err(|e| AcquisitionError::processing(format!("processing task failed: {e}")))??;

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tokio::fs::write(temp_path, &encoded).await?;

        let output_path = self.output_path(&request.job_id, request.dataset);
        move_file(temp_path, &output_path).await?;
        Ok(output_path)
    }

    /// Fetch `source` over `bbox` as one geographic raster in `layout`.
    ///
    /// Small regions go out as one direct request; if the service rejects it
    /// as too large the region is tiled instead. Either way the result has
    /// the same dtype and nodata value.
    #[instrument(skip(self, source, bbox, layout), fields(source = %source))]
    pub async fn acquire_raster(
        &self,
        source: &RasterSource,
        bbox: &BoundingBox,
        scale: f64,
        layout: OutputLayout,
    ) -> Result<RasterBuffer> {
        match self.planner.plan(bbox, scale)? {
            AcquisitionPlan::DirectFetch { width, height } => {
                match self.fetcher.fetch_direct(source, bbox, scale).await {
                    Ok(bytes) => {
                        debug!(width, height, bytes = bytes.len(), "Decoding direct download");
                        Ok(layout.conform(decode_geotiff(&bytes)?))
                    }
                    Err(ServiceError::SizeLimitExceeded(msg)) => {
                        warn!(reason = %msg, "Direct request too large, switching to tiles");
                        self.metrics.record_escalation();
                        let plan = self.planner.tiled(bbox, scale)?;
                        self.fetch_tiled(source, &plan, layout).await
                    }
                    Err(e) => Err(e.into()),
                }
            }
            AcquisitionPlan::TiledFetch(plan) => self.fetch_tiled(source, &plan, layout).await,
        }
    }

    /// Fetch every tile of `plan` with bounded concurrency and stitch them.
    async fn fetch_tiled(
        &self,
        source: &RasterSource,
        plan: &TilePlan,
        layout: OutputLayout,
    ) -> Result<RasterBuffer> {
        info!(
            tiles = plan.len(),
            tiles_x = plan.n_tiles_x,
            tiles_y = plan.n_tiles_y,
            width = plan.width,
            height = plan.height,
            "Starting tiled acquisition"
        );

        let mut stitcher = Stitcher::new(plan, layout);
        let mut results = stream::iter(plan.tiles.iter())
            .map(|tile| async move {
                let result = self.fetcher.fetch(source, tile, plan.scale).await;
                (tile, result)
            })
            .buffer_unordered(self.config.max_concurrent_tiles);

        let mut failed = 0usize;
        let mut last_error = None;
        while let Some((tile, result)) = results.next().await {
            match result {
                Ok(window) => stitcher.place(tile, &window)?,
                Err(e) => match self.config.failure_mode {
                    FailureMode::FailFast => {
                        error!(
                            tile_row = tile.tile_row,
                            tile_col = tile.tile_col,
                            error = %e,
                            "Tile failed, abandoning dataset"
                        );
                        return Err(e);
                    }
                    FailureMode::BestEffort => {
                        warn!(
                            tile_row = tile.tile_row,
                            tile_col = tile.tile_col,
                            error = %e,
                            "Tile failed, leaving it as nodata"
                        );
                        failed += 1;
                        last_error = Some(e);
                    }
                },
            }
        }

        if stitcher.placed() == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        info!(
            succeeded = stitcher.placed(),
            failed,
            "Tiled acquisition complete"
        );
        stitcher.finalize()
    }

    /// Resample the raster at `path` onto the grid of the raster at `base`,
    /// replacing it in place, and re-validate it.
    #[instrument(skip(self))]
    pub async fn align_output(&self, base: &Path, path: &Path) -> Result<ValidationRecord> {
        let processor = self.processor.clone();
        let (base_owned, path_owned) = (base.to_path_buf(), path.to_path_buf());
        let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let base = read_geotiff(&base_owned)?;
            let other = read_geotiff(&path_owned)?;
            let aligned = processor.align(&base, &other)?;
            Ok(encode_geotiff(&aligned)?)
        })
        .await
        .map_err(|e| AcquisitionError::processing(format!("alignment task failed: {e}")))??;

        let file_name = path
            .file_name()
            .ok_or_else(|| AcquisitionError::processing(format!("not a file: {}", path.display())))?;
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        let temp_path = self.config.temp_dir.join(file_name);
        tokio::fs::write(&temp_path, &encoded).await?;
        move_file(&temp_path, path).await?;

        let expected = self.config.target_crs;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || validator::validate(&path, &expected))
            .await
            .map_err(|e| AcquisitionError::processing(format!("validation task failed: {e}")))
    }
}

/// Rename, falling back to copy + delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed intermediate file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove intermediate file"),
    }
}
