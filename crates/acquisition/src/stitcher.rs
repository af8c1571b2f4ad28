//! Assembles fetched tiles into one raster.

use std::collections::HashSet;

use geo_common::{Crs, GeoTransform};
use grid_processor::{RasterBuffer, TileDescriptor, TilePlan};

use crate::catalog::OutputLayout;
use crate::error::{AcquisitionError, Result};
use crate::service::PixelWindow;

/// Owns the full-size output buffer while tiles arrive.
///
/// Tiles may be placed in any order; each writes only its own pixel
/// window, so the result does not depend on completion order.
#[derive(Debug)]
pub struct Stitcher {
    width: usize,
    height: usize,
    transform: GeoTransform,
    layout: OutputLayout,
    data: Vec<f32>,
    expected: usize,
    placed: HashSet<(usize, usize)>,
}

impl Stitcher {
    /// Buffer at the plan's full dimensions, filled with the layout's
    /// nodata value (zero for every catalog dataset).
    pub fn new(plan: &TilePlan, layout: OutputLayout) -> Self {
        Self {
            width: plan.width,
            height: plan.height,
            transform: plan.transform(),
            layout,
            data: vec![layout.nodata; plan.width * plan.height],
            expected: plan.len(),
            placed: HashSet::with_capacity(plan.len()),
        }
    }

    /// Copy `window` into the buffer at `tile`'s pixel offset.
    pub fn place(&mut self, tile: &TileDescriptor, window: &PixelWindow) -> Result<()> {
        window.check_shape(tile).map_err(AcquisitionError::Service)?;

        if tile.pixel_col_start + tile.pixel_width > self.width
            || tile.pixel_row_start + tile.pixel_height > self.height
        {
            return Err(AcquisitionError::invalid_region(format!(
                "tile ({}, {}) extends past the {}x{} output grid",
                tile.tile_row, tile.tile_col, self.width, self.height
            )));
        }

        if !self.placed.insert((tile.tile_row, tile.tile_col)) {
            return Err(AcquisitionError::processing(format!(
                "tile ({}, {}) placed twice",
                tile.tile_row, tile.tile_col
            )));
        }

        for (row, src) in window.data.chunks_exact(window.width).enumerate() {
            let start = (tile.pixel_row_start + row) * self.width + tile.pixel_col_start;
            self.data[start..start + window.width].copy_from_slice(src);
        }

        Ok(())
    }

    pub fn placed(&self) -> usize {
        self.placed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.placed.len() == self.expected
    }

    /// Attach the full-bounds transform and hand the buffer over.
    ///
    /// Pixel (0, 0) maps to (min_lon, max_lat) no matter how the plan was
    /// tiled. Missing tiles are left at the nodata value.
    pub fn finalize(self) -> Result<RasterBuffer> {
        Ok(RasterBuffer::new(
            self.data,
            self.width,
            self.height,
            1,
            Crs::wgs84(),
            self.transform,
        )?
        .with_nodata(Some(self.layout.nodata))
        .with_dtype(self.layout.dtype))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::BoundingBox;
    use grid_processor::{partition, DataType};

    use crate::catalog::DatasetKind;

    fn plan() -> TilePlan {
        let bbox = BoundingBox::new(-88.0, 41.0, -87.99, 41.01).unwrap();
        // 37x37 pixels at 30 m, 10 pixel tiles -> 4x4
        partition(&bbox, 30.0, 10).unwrap()
    }

    fn window_for(tile: &TileDescriptor, value: f32) -> PixelWindow {
        PixelWindow::new(
            tile.pixel_width,
            tile.pixel_height,
            vec![value; tile.pixel_count()],
        )
    }

    #[test]
    fn test_constant_tiles_land_at_offsets() {
        let plan = plan();
        let mut stitcher = Stitcher::new(&plan, OutputLayout::default());

        // Reverse order to show completion order does not matter
        for tile in plan.tiles.iter().rev() {
            let value = (tile.tile_row * 10 + tile.tile_col + 1) as f32;
            stitcher.place(tile, &window_for(tile, value)).unwrap();
        }
        assert!(stitcher.is_complete());

        let raster = stitcher.finalize().unwrap();
        for tile in &plan.tiles {
            let expected = (tile.tile_row * 10 + tile.tile_col + 1) as f32;
            for row in tile.pixel_row_start..tile.pixel_row_start + tile.pixel_height {
                for col in tile.pixel_col_start..tile.pixel_col_start + tile.pixel_width {
                    assert_eq!(raster.get(0, col, row), Some(expected));
                }
            }
        }
        assert!(raster.data().iter().all(|v| *v != 0.0));
    }

    #[test]
    fn test_finalize_transform_and_nodata() {
        let plan = plan();
        let raster = Stitcher::new(&plan, OutputLayout::default()).finalize().unwrap();
        assert_eq!(raster.crs, Crs::wgs84());
        assert_eq!(raster.nodata, Some(0.0));
        assert_eq!(raster.transform.pixel_to_world(0.0, 0.0), (-88.0, 41.01));
        assert_eq!((raster.width(), raster.height()), (plan.width, plan.height));
        assert_eq!(raster.dtype, DataType::Float32);
    }

    #[test]
    fn test_finalize_keeps_dataset_dtype() {
        let plan = plan();
        let mut stitcher = Stitcher::new(&plan, DatasetKind::LandCover.layout());
        stitcher.place(&plan.tiles[0], &window_for(&plan.tiles[0], 41.0)).unwrap();

        let raster = stitcher.finalize().unwrap();
        assert_eq!(raster.dtype, DataType::UInt8);
        assert_eq!(raster.nodata, Some(0.0));
        assert_eq!(raster.get(0, 0, 0), Some(41.0));
        assert_eq!(raster.get(0, plan.width - 1, plan.height - 1), Some(0.0));
    }

    #[test]
    fn test_rejects_wrong_shape_and_duplicates() {
        let plan = plan();
        let mut stitcher = Stitcher::new(&plan, OutputLayout::default());
        let tile = &plan.tiles[0];

        let bad = PixelWindow::new(tile.pixel_width - 1, tile.pixel_height, vec![1.0; (tile.pixel_width - 1) * tile.pixel_height]);
        assert!(stitcher.place(tile, &bad).is_err());

        stitcher.place(tile, &window_for(tile, 1.0)).unwrap();
        assert!(stitcher.place(tile, &window_for(tile, 2.0)).is_err());
        assert_eq!(stitcher.placed(), 1);
        assert!(!stitcher.is_complete());
    }
}
