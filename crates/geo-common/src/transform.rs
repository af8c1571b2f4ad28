//! North-up affine pixel-to-world transforms.

use serde::{Deserialize, Serialize};

use crate::bbox::Extent;

/// Affine transform for a north-up raster, origin at the top-left corner.
///
/// `pixel_height` is negative for the usual layout where row 0 is the
/// northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            origin_y,
            pixel_height,
        }
    }

    /// Transform that stretches `width` x `height` pixels over `extent`.
    pub fn from_extent(extent: &Extent, width: usize, height: usize) -> Self {
        Self {
            origin_x: extent.min_x,
            pixel_width: extent.width() / width.max(1) as f64,
            origin_y: extent.max_y,
            pixel_height: -extent.height() / height.max(1) as f64,
        }
    }

    /// World coordinate of a (fractional) pixel position. Integer inputs give
    /// the top-left corner of that pixel.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// World coordinate of the center of pixel (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional pixel position (col, row) of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Extent covered by a raster of the given shape.
    pub fn extent(&self, width: usize, height: usize) -> Extent {
        let (x0, y0) = self.pixel_to_world(0.0, 0.0);
        let (x1, y1) = self.pixel_to_world(width as f64, height as f64);
        Extent::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Absolute pixel size as (x, y).
    pub fn resolution(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    /// GDAL-ordered six coefficients.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            0.0,
            self.origin_y,
            0.0,
            self.pixel_height,
        ]
    }
}
