//! Pixel arithmetic for geographic regions: sizing, tiling and transforms.
//!
//! Degrees are converted to meters with a single flat constant and no
//! latitude correction. Tile counts and array shapes downstream depend on
//! this, so it must not be "fixed" silently.

use geo_common::{BoundingBox, GeoTransform};
use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// Meters per degree used for the flat degree-to-pixel approximation.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Pixel dimensions (width, height) of `bbox` at `scale` meters per pixel.
///
/// Fractional pixels are truncated, so a region narrower than one pixel
/// yields zero on that axis.
pub fn pixel_dimensions(bbox: &BoundingBox, scale: f64) -> (usize, usize) {
    if !scale.is_finite() || scale <= 0.0 {
        return (0, 0);
    }
    let width = (bbox.width() * METERS_PER_DEGREE / scale).trunc();
    let height = (bbox.height() * METERS_PER_DEGREE / scale).trunc();
    (width as usize, height as usize)
}

/// Like [`pixel_dimensions`] but fails when either axis is empty.
pub fn require_pixel_dimensions(bbox: &BoundingBox, scale: f64) -> Result<(usize, usize)> {
    let (width, height) = pixel_dimensions(bbox, scale);
    if width == 0 || height == 0 {
        return Err(GridProcessorError::invalid_region(format!(
            "{bbox} at scale {scale} resolves to {width}x{height} pixels"
        )));
    }
    Ok((width, height))
}

/// Affine transform for a `width` x `height` grid spanning `bounds`.
///
/// Pixel (0, 0) maps to (min_lon, max_lat).
pub fn geotransform(bounds: &BoundingBox, width: usize, height: usize) -> GeoTransform {
    GeoTransform::from_extent(&bounds.to_extent(), width, height)
}

/// One rectangular pixel window of a tiled request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileDescriptor {
    /// Tile index along the vertical axis.
    pub tile_row: usize,
    /// Tile index along the horizontal axis.
    pub tile_col: usize,
    pub pixel_row_start: usize,
    pub pixel_col_start: usize,
    pub pixel_height: usize,
    pub pixel_width: usize,
    pub geo_bounds: BoundingBox,
}

impl TileDescriptor {
    pub fn pixel_count(&self) -> usize {
        self.pixel_width * self.pixel_height
    }
}

/// Ordered tiles covering a full output grid, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilePlan {
    pub bounds: BoundingBox,
    pub scale: f64,
    /// Full output width in pixels.
    pub width: usize,
    /// Full output height in pixels.
    pub height: usize,
    pub n_tiles_x: usize,
    pub n_tiles_y: usize,
    pub tiles: Vec<TileDescriptor>,
}

impl TilePlan {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Transform of the full output grid, independent of the tiling.
    pub fn transform(&self) -> GeoTransform {
        geotransform(&self.bounds, self.width, self.height)
    }
}

/// Split `bbox` into tiles of at most `max_side` pixels per side.
///
/// Tile edges are placed by pixel offset, as a fractional split of the full
/// bounds, so every tile is exactly `max_side` pixels except possibly the
/// last row and column. Adjacent tiles share identical edge coordinates.
pub fn partition(bbox: &BoundingBox, scale: f64, max_side: usize) -> Result<TilePlan> {
    if max_side == 0 {
        return Err(GridProcessorError::invalid_region(
            "max tile side must be at least one pixel",
        ));
    }
    let (width, height) = require_pixel_dimensions(bbox, scale)?;

    let n_tiles_x = width.div_ceil(max_side);
    let n_tiles_y = height.div_ceil(max_side);

    let lon_at = |col: usize| {
        if col >= width {
            bbox.max_lon()
        } else {
            bbox.min_lon() + (col as f64 / width as f64) * bbox.width()
        }
    };
    let lat_at = |row: usize| {
        if row >= height {
            bbox.min_lat()
        } else {
            bbox.max_lat() - (row as f64 / height as f64) * bbox.height()
        }
    };

    let mut tiles = Vec::with_capacity(n_tiles_x * n_tiles_y);
    for tile_row in 0..n_tiles_y {
        let row_start = tile_row * max_side;
        let row_end = (row_start + max_side).min(height);
        for tile_col in 0..n_tiles_x {
            let col_start = tile_col * max_side;
            let col_end = (col_start + max_side).min(width);

            let geo_bounds =
                BoundingBox::new(lon_at(col_start), lat_at(row_end), lon_at(col_end), lat_at(row_start))?;

            tiles.push(TileDescriptor {
                tile_row,
                tile_col,
                pixel_row_start: row_start,
                pixel_col_start: col_start,
                pixel_height: row_end - row_start,
                pixel_width: col_end - col_start,
                geo_bounds,
            });
        }
    }

    Ok(TilePlan {
        bounds: *bbox,
        scale,
        width,
        height,
        n_tiles_x,
        n_tiles_y,
        tiles,
    })
}
