//! Direct vs. tiled acquisition planning.

use std::sync::Arc;

use geo_common::BoundingBox;
use grid_processor::{partition, require_pixel_dimensions, TilePlan};
use tracing::{debug, warn};

use crate::config::AcquisitionConfig;
use crate::error::Result;
use crate::metrics::AcquisitionMetrics;

/// How a region will be fetched.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionPlan {
    /// One request for an encoded raster of `width` x `height` pixels.
    DirectFetch { width: usize, height: usize },
    /// One pixel request per tile.
    TiledFetch(TilePlan),
}

impl AcquisitionPlan {
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::DirectFetch { .. })
    }

    pub fn tile_count(&self) -> usize {
        match self {
            Self::DirectFetch { .. } => 0,
            Self::TiledFetch(plan) => plan.len(),
        }
    }
}

/// Chooses a fetch strategy from region size and the configured limits.
#[derive(Debug, Clone)]
pub struct AcquisitionPlanner {
    pixel_budget: u64,
    direct_pixel_ceiling: u64,
    tile_side: usize,
    metrics: Arc<AcquisitionMetrics>,
}

impl AcquisitionPlanner {
    pub fn new(config: &AcquisitionConfig, metrics: Arc<AcquisitionMetrics>) -> Self {
        Self {
            pixel_budget: config.pixel_budget,
            direct_pixel_ceiling: config.direct_pixel_ceiling,
            tile_side: config.tile_side,
            metrics,
        }
    }

    /// Plan the acquisition of `bbox` at `scale` meters per pixel.
    ///
    /// Regions at or below the direct ceiling are fetched in one request,
    /// anything larger is tiled. Exceeding the pixel budget only logs a
    /// warning.
    pub fn plan(&self, bbox: &BoundingBox, scale: f64) -> Result<AcquisitionPlan> {
        let (width, height) = require_pixel_dimensions(bbox, scale)?;
        let total = width as u64 * height as u64;

        if total > self.pixel_budget {
            warn!(
                %bbox,
                total_pixels = total,
                pixel_budget = self.pixel_budget,
                "Requested region exceeds pixel budget; continuing"
            );
            self.metrics.record_budget_exceeded();
        }

        if total <= self.direct_pixel_ceiling {
            debug!(width, height, total_pixels = total, "Planned direct fetch");
            return Ok(AcquisitionPlan::DirectFetch { width, height });
        }

        let plan = self.tiled(bbox, scale)?;
        debug!(
            width,
            height,
            total_pixels = total,
            tiles_x = plan.n_tiles_x,
            tiles_y = plan.n_tiles_y,
            "Planned tiled fetch"
        );
        Ok(AcquisitionPlan::TiledFetch(plan))
    }

    /// Tile plan for `bbox` regardless of size. Used when a direct request
    /// turns out to be too large for the service.
    pub fn tiled(&self, bbox: &BoundingBox, scale: f64) -> Result<TilePlan> {
        Ok(partition(bbox, scale, self.tile_side)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(config: &AcquisitionConfig) -> AcquisitionPlanner {
        AcquisitionPlanner::new(config, Arc::new(AcquisitionMetrics::new()))
    }

    #[test]
    fn test_large_region_is_tiled() {
        let planner = planner(&AcquisitionConfig::default());
        let metro = BoundingBox::new(-95.7, 29.5, -95.1, 30.0).unwrap();

        match planner.plan(&metro, 30.0).unwrap() {
            AcquisitionPlan::TiledFetch(plan) => {
                assert_eq!(plan.len(), 25);
                assert!(plan
                    .tiles
                    .iter()
                    .all(|t| t.pixel_width <= 450 && t.pixel_height <= 450));
            }
            other => panic!("expected tiled plan, got {other:?}"),
        }
    }

    #[test]
    fn test_small_region_is_direct() {
        let planner = planner(&AcquisitionConfig::default());
        let loop_area = BoundingBox::new(-87.70, 41.83, -87.60, 41.93).unwrap();
        let plan = planner.plan(&loop_area, 30.0).unwrap();
        assert_eq!(plan, AcquisitionPlan::DirectFetch { width: 371, height: 371 });
        assert_eq!(plan.tile_count(), 0);
    }

    #[test]
    fn test_budget_only_warns() {
        let config = AcquisitionConfig {
            pixel_budget: 1_000,
            ..Default::default()
        };
        let metrics = Arc::new(AcquisitionMetrics::new());
        let planner = AcquisitionPlanner::new(&config, metrics.clone());
        let metro = BoundingBox::new(-95.7, 29.5, -95.1, 30.0).unwrap();

        assert!(planner.plan(&metro, 30.0).is_ok());
        assert_eq!(metrics.snapshot().budget_exceeded, 1);
    }

    #[test]
    fn test_degenerate_region_is_invalid() {
        let planner = planner(&AcquisitionConfig::default());
        let sliver = BoundingBox::new(0.0, 0.0, 0.0001, 1.0).unwrap();
        assert!(matches!(
            planner.plan(&sliver, 30.0),
            Err(crate::error::AcquisitionError::InvalidRegion(_))
        ));
    }
}
