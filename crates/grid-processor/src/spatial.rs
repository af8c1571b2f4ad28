//! Clip / reproject / align behind one configured handle.

use geo_common::{BoundingBox, Crs};
use tracing::instrument;

use crate::clip::clip;
use crate::config::GridProcessorConfig;
use crate::error::{GridProcessorError, Result};
use crate::projection::{align, reproject};
use crate::types::RasterBuffer;

/// Normalizes rasters onto an analysis grid.
///
/// Stateless apart from its configuration, so one instance can be shared
/// by concurrent dataset requests.
#[derive(Debug, Clone, Default)]
pub struct SpatialProcessor {
    config: GridProcessorConfig,
}

impl SpatialProcessor {
    pub fn new(config: GridProcessorConfig) -> Result<Self> {
        config.validate().map_err(GridProcessorError::ConfigError)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GridProcessorConfig {
        &self.config
    }

    /// Crop and mask `raster` to `bbox`. Fails with `ClipError` when nothing
    /// of the raster lies inside the box.
    #[instrument(skip(self, raster), fields(width = raster.width(), height = raster.height()))]
    pub fn clip(&self, raster: &RasterBuffer, bbox: &BoundingBox) -> Result<RasterBuffer> {
        clip(raster, bbox, &self.config)
    }

    /// Reproject `raster` to `target_crs` at `resolution` target units per pixel.
    #[instrument(skip(self, raster), fields(source_crs = %raster.crs))]
    pub fn reproject(
        &self,
        raster: &RasterBuffer,
        target_crs: Crs,
        resolution: f64,
    ) -> Result<RasterBuffer> {
        reproject(raster, target_crs, resolution, &self.config)
    }

    /// Resample `other` onto `base`'s grid.
    #[instrument(skip_all)]
    pub fn align(&self, base: &RasterBuffer, other: &RasterBuffer) -> Result<RasterBuffer> {
        align(base, other, &self.config)
    }

    /// Clip to `bbox`, then reproject. The usual path for a freshly
    /// acquired geographic raster.
    pub fn clip_and_reproject(
        &self,
        raster: &RasterBuffer,
        bbox: &BoundingBox,
        target_crs: Crs,
        resolution: f64,
    ) -> Result<RasterBuffer> {
        let clipped = self.clip(raster, bbox)?;
        self.reproject(&clipped, target_crs, resolution)
    }
}
