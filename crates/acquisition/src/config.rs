//! Configuration for dataset acquisition.

use std::path::PathBuf;
use std::time::Duration;

use geo_common::Crs;
use grid_processor::GridProcessorConfig;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// What to do when some tiles of a plan cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Any failed tile fails the dataset.
    #[default]
    FailFast,
    /// Failed tiles are left as nodata and the dataset continues.
    BestEffort,
}

impl FailureMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "best_effort" => Self::BestEffort,
            _ => Self::FailFast,
        }
    }
}

/// Settings for planning, fetching and normalizing datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// CRS every output is reprojected to.
    pub target_crs: Crs,

    /// Output pixel size in target CRS units.
    pub target_resolution: f64,

    /// Pixels per request above which a warning is logged. Never blocks.
    pub pixel_budget: u64,

    /// Hard per-request pixel limit of the remote service.
    pub service_pixel_cap: u64,

    /// Largest request sent untiled. Kept below the cap for headroom.
    pub direct_pixel_ceiling: u64,

    /// Maximum tile side in pixels.
    pub tile_side: usize,

    /// Tiles of one dataset fetched at once.
    pub max_concurrent_tiles: usize,

    /// Datasets of one job processed at once.
    pub max_concurrent_datasets: usize,

    /// Per-tile / per-request retry policy.
    pub retry: RetryPolicy,

    /// Wall-clock limit for one dataset, fetch through write.
    pub dataset_timeout_secs: u64,

    pub failure_mode: FailureMode,

    /// Final rasters and manifests.
    pub output_dir: PathBuf,

    /// Intermediate files, removed once a dataset finishes.
    pub temp_dir: PathBuf,

    /// Year used when a request does not name one.
    pub default_year: i32,

    /// Resampling settings for clip/reproject/align.
    pub processing: GridProcessorConfig,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            target_crs: Crs::conus_albers(),
            target_resolution: 30.0,
            pixel_budget: 100_000_000,
            service_pixel_cap: 262_144,
            direct_pixel_ceiling: 202_500,
            tile_side: 450,
            max_concurrent_tiles: 4,
            max_concurrent_datasets: 2,
            retry: RetryPolicy::default(),
            dataset_timeout_secs: 1800,
            failure_mode: FailureMode::FailFast,
            output_dir: PathBuf::from("outputs"),
            temp_dir: PathBuf::from("temp"),
            default_year: 2020,
            processing: GridProcessorConfig::default(),
        }
    }
}

impl AcquisitionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Overlay environment variables on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("TARGET_CRS") {
            if let Ok(crs) = Crs::parse(&val) {
                self.target_crs = crs;
            }
        }

        if let Ok(val) = std::env::var("TARGET_RESOLUTION") {
            if let Ok(v) = val.parse() {
                self.target_resolution = v;
            }
        }

        if let Ok(val) = std::env::var("PIXEL_BUDGET") {
            if let Ok(v) = val.parse() {
                self.pixel_budget = v;
            }
        }

        if let Ok(val) = std::env::var("TILE_SIDE") {
            if let Ok(v) = val.parse() {
                self.tile_side = v;
            }
        }

        if let Ok(val) = std::env::var("MAX_CONCURRENT_TILES") {
            if let Ok(v) = val.parse() {
                self.max_concurrent_tiles = v;
            }
        }

        if let Ok(val) = std::env::var("DATASET_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.dataset_timeout_secs = v;
            }
        }

        if let Ok(val) = std::env::var("FAILURE_MODE") {
            self.failure_mode = FailureMode::from_str(&val);
        }

        if let Ok(val) = std::env::var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("TEMP_DIR") {
            self.temp_dir = PathBuf::from(val);
        }

        self.processing = self.processing.with_env_overrides();
        self
    }

    pub fn dataset_timeout(&self) -> Duration {
        Duration::from_secs(self.dataset_timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.target_resolution.is_finite() || self.target_resolution <= 0.0 {
            return Err("target_resolution must be > 0".to_string());
        }

        if self.tile_side == 0 {
            return Err("tile_side must be > 0".to_string());
        }

        let tile_pixels = (self.tile_side as u64).saturating_mul(self.tile_side as u64);
        if tile_pixels > self.service_pixel_cap {
            return Err(format!(
                "tile_side {} gives {} pixels per tile, above service_pixel_cap {}",
                self.tile_side, tile_pixels, self.service_pixel_cap
            ));
        }

        if self.direct_pixel_ceiling > self.service_pixel_cap {
            return Err(format!(
                "direct_pixel_ceiling {} is above service_pixel_cap {}",
                self.direct_pixel_ceiling, self.service_pixel_cap
            ));
        }

        if self.max_concurrent_tiles == 0 || self.max_concurrent_datasets == 0 {
            return Err("concurrency limits must be > 0".to_string());
        }

        if self.dataset_timeout_secs == 0 {
            return Err("dataset_timeout_secs must be > 0".to_string());
        }

        self.retry.validate()?;
        self.processing.validate()?;

        Ok(())
    }
}
