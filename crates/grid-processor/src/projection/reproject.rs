//! Reprojection and grid alignment by inverse mapping.
//!
//! Every output pixel center is transformed back into the source CRS and
//! sampled there, so the output grid never has holes. Rows are processed in
//! parallel.

use geo_common::{Crs, CrsTransform, GeoTransform};
use rayon::prelude::*;
use tracing::debug;

use super::interpolation::sample;
use crate::config::GridProcessorConfig;
use crate::error::{GridProcessorError, Result};
use crate::types::{InterpolationMethod, RasterBuffer};

/// Output grid for a warp: CRS, transform and shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetGrid {
    pub crs: Crs,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl TargetGrid {
    /// The exact grid of an existing raster.
    pub fn of(raster: &RasterBuffer) -> Self {
        Self {
            crs: raster.crs,
            transform: raster.transform,
            width: raster.width(),
            height: raster.height(),
        }
    }
}

/// Compute the default output grid for reprojecting `raster` into
/// `target_crs` at `resolution` target units per pixel.
///
/// The output covers the densified transform of the source extent, with its
/// origin at the top-left of that extent.
pub fn default_target_grid(
    raster: &RasterBuffer,
    target_crs: Crs,
    resolution: f64,
    config: &GridProcessorConfig,
) -> Result<TargetGrid> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(GridProcessorError::reproject(format!(
            "target resolution must be positive, got {resolution}"
        )));
    }

    let forward = CrsTransform::new(raster.crs, target_crs)
        .map_err(|e| GridProcessorError::reproject(e.to_string()))?;
    let extent = forward
        .convert_extent(&raster.extent(), config.densify_samples)
        .map_err(|e| GridProcessorError::reproject(e.to_string()))?;

    // Tolerate float noise so an exact multiple of the resolution does not
    // gain an extra column
    let width = ((extent.width() / resolution) - 1e-6).ceil().max(1.0) as usize;
    let height = ((extent.height() / resolution) - 1e-6).ceil().max(1.0) as usize;

    if (width as u64) * (height as u64) > config.max_output_pixels {
        return Err(GridProcessorError::reproject(format!(
            "output grid {width}x{height} exceeds the {} pixel limit",
            config.max_output_pixels
        )));
    }

    Ok(TargetGrid {
        crs: target_crs,
        transform: GeoTransform::new(extent.min_x, resolution, extent.max_y, -resolution),
        width,
        height,
    })
}

/// Reproject `raster` into `target_crs` at `resolution`.
///
/// Nodata defaults to `config.default_nodata` when the source has none.
pub fn reproject(
    raster: &RasterBuffer,
    target_crs: Crs,
    resolution: f64,
    config: &GridProcessorConfig,
) -> Result<RasterBuffer> {
    let grid = default_target_grid(raster, target_crs, resolution, config)?;
    let nodata = raster.nodata.unwrap_or(config.default_nodata);

    debug!(
        source_crs = %raster.crs,
        target_crs = %target_crs,
        width = grid.width,
        height = grid.height,
        "Reprojecting raster"
    );

    warp(raster, &grid, config.interpolation, nodata)
}

/// Resample `other` onto `base`'s exact grid (same CRS, transform, shape).
pub fn align(
    base: &RasterBuffer,
    other: &RasterBuffer,
    config: &GridProcessorConfig,
) -> Result<RasterBuffer> {
    let nodata = other.nodata.unwrap_or(config.default_nodata);
    warp(other, &TargetGrid::of(base), config.interpolation, nodata)
}

/// Resample `source` onto `grid`. Output pixels with no valid source value
/// are set to `nodata`.
pub fn warp(
    source: &RasterBuffer,
    grid: &TargetGrid,
    method: InterpolationMethod,
    nodata: f32,
) -> Result<RasterBuffer> {
    if grid.width == 0 || grid.height == 0 {
        return Err(GridProcessorError::reproject("target grid is empty"));
    }

    // Fail early on CRS problems instead of inside the worker threads
    CrsTransform::new(grid.crs, source.crs)
        .map_err(|e| GridProcessorError::reproject(e.to_string()))?;

    let bands = source.bands();
    let src_w = source.width();
    let src_h = source.height();
    let src_nodata = source.nodata;

    let rows: Vec<Vec<f32>> = (0..grid.height)
        .into_par_iter()
        .map(|row| -> Result<Vec<f32>> {
            let inverse = CrsTransform::new(grid.crs, source.crs)
                .map_err(|e| GridProcessorError::reproject(e.to_string()))?;
            let mut out = vec![nodata; grid.width * bands];

            for col in 0..grid.width {
                let (x, y) = grid.transform.pixel_center(col, row);
                let Ok((sx, sy)) = inverse.convert(x, y) else {
                    continue;
                };
                let (fc, fr) = source.transform.world_to_pixel(sx, sy);
                // Integer grid indices sit on pixel centers
                let (gx, gy) = (fc - 0.5, fr - 0.5);

                for band in 0..bands {
                    let value = sample(source.band(band), src_w, src_h, gx, gy, method, src_nodata);
                    if !value.is_nan() {
                        out[band * grid.width + col] = value;
                    }
                }
            }

            Ok(out)
        })
        .collect::<Result<Vec<_>>>()?;

    let band_len = grid.width * grid.height;
    let mut data = vec![nodata; band_len * bands];
    for (row, values) in rows.into_iter().enumerate() {
        for band in 0..bands {
            let dst = band * band_len + row * grid.width;
            data[dst..dst + grid.width]
                .copy_from_slice(&values[band * grid.width..(band + 1) * grid.width]);
        }
    }

    Ok(
        RasterBuffer::new(data, grid.width, grid.height, bands, grid.crs, grid.transform)?
            .with_nodata(Some(nodata))
            .with_dtype(source.dtype),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn albers_raster(width: usize, height: usize, data: Vec<f32>) -> RasterBuffer {
        let gt = GeoTransform::new(600_000.0, 30.0, 2_100_000.0, -30.0);
        RasterBuffer::new(data, width, height, 1, Crs::conus_albers(), gt).unwrap()
    }

    #[test]
    fn test_same_crs_same_resolution_is_identity() {
        let data: Vec<f32> = (0..60).map(|i| i as f32).collect();
        let raster = albers_raster(10, 6, data.clone());
        let config = GridProcessorConfig::default();

        let out = reproject(&raster, Crs::conus_albers(), 30.0, &config).unwrap();

        assert_eq!((out.width(), out.height()), (10, 6));
        assert_eq!(out.transform, raster.transform);
        for (a, b) in out.data().iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} != {b}");
        }
    }

    #[test]
    fn test_default_nodata_is_255() {
        let raster = albers_raster(4, 4, vec![1.0; 16]);
        let out = reproject(&raster, Crs::conus_albers(), 30.0, &GridProcessorConfig::default())
            .unwrap();
        assert_eq!(out.nodata, Some(255.0));

        let with_nodata = albers_raster(4, 4, vec![1.0; 16]).with_nodata(Some(-9999.0));
        let out = reproject(&with_nodata, Crs::conus_albers(), 30.0, &GridProcessorConfig::default())
            .unwrap();
        assert_eq!(out.nodata, Some(-9999.0));
    }

    #[test]
    fn test_downsample_halves_shape() {
        let raster = albers_raster(10, 6, vec![5.0; 60]);
        let out = reproject(&raster, Crs::conus_albers(), 60.0, &GridProcessorConfig::default())
            .unwrap();
        assert_eq!((out.width(), out.height()), (5, 3));
        assert!(out.data().iter().all(|v| (*v - 5.0).abs() < 1e-6));
    }

    #[test]
    fn test_rejects_bad_resolution() {
        let raster = albers_raster(2, 2, vec![0.0; 4]);
        let result = reproject(&raster, Crs::conus_albers(), 0.0, &GridProcessorConfig::default());
        assert!(matches!(result, Err(GridProcessorError::ReprojectError(_))));
    }

    #[test]
    fn test_align_matches_base_grid() {
        let base = albers_raster(8, 8, vec![0.0; 64]);
        let gt = GeoTransform::new(600_000.0, 15.0, 2_100_000.0, -15.0);
        let other = RasterBuffer::new(vec![3.0; 32 * 32], 32, 32, 1, Crs::conus_albers(), gt)
            .unwrap();

        let aligned = align(&base, &other, &GridProcessorConfig::default()).unwrap();
        assert_eq!(aligned.width(), base.width());
        assert_eq!(aligned.height(), base.height());
        assert_eq!(aligned.transform, base.transform);
        assert!(aligned.data().iter().all(|v| (*v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_align_outside_is_nodata() {
        let base = albers_raster(4, 4, vec![0.0; 16]);
        // Far away from the base grid
        let gt = GeoTransform::new(0.0, 30.0, 120.0, -30.0);
        let other = RasterBuffer::new(vec![3.0; 16], 4, 4, 1, Crs::conus_albers(), gt).unwrap();

        let aligned = align(&base, &other, &GridProcessorConfig::default()).unwrap();
        assert!(aligned.data().iter().all(|v| *v == 255.0));
    }
}
