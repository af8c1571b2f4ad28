//! Crop and mask a raster to a geographic bounding box.

use geo::{Intersects, LineString, Point, Polygon};
use geo_common::{BoundingBox, Crs, CrsTransform, Extent, GeoTransform};
use tracing::debug;

use crate::config::GridProcessorConfig;
use crate::error::{GridProcessorError, Result};
use crate::types::RasterBuffer;

/// Clip `raster` to `bbox`.
///
/// The bbox outline is densified and projected into the raster's CRS, the
/// raster is cropped to the outline's pixel window, and pixels whose centers
/// fall outside the outline are set to nodata. The output nodata is the
/// source nodata, or `config.default_nodata` if the source has none.
pub fn clip(
    raster: &RasterBuffer,
    bbox: &BoundingBox,
    config: &GridProcessorConfig,
) -> Result<RasterBuffer> {
    let to_raster = CrsTransform::new(Crs::wgs84(), raster.crs)
        .map_err(|e| GridProcessorError::reproject(e.to_string()))?;

    let outline = project_outline(bbox, &to_raster, config.densify_samples)?;
    let outline_extent = Extent::from_points(outline.iter().copied())
        .ok_or_else(|| GridProcessorError::clip("bbox outline could not be projected"))?;

    let overlap = outline_extent.intersection(&raster.extent()).ok_or_else(|| {
        GridProcessorError::clip(format!(
            "{bbox} does not intersect raster extent {:?}",
            raster.extent()
        ))
    })?;

    let (col0, row0, col1, row1) = pixel_window(&raster.transform, &overlap, raster.width(), raster.height());
    if col1 <= col0 || row1 <= row0 {
        return Err(GridProcessorError::clip(format!(
            "{bbox} covers no whole pixel of the raster"
        )));
    }

    let polygon = Polygon::new(LineString::from(outline), vec![]);
    let fill = raster.nodata.unwrap_or(config.default_nodata);
    let (out_w, out_h) = (col1 - col0, row1 - row0);
    let bands = raster.bands();

    let mut data = vec![fill; out_w * out_h * bands];
    let mut inside = 0usize;
    for row in 0..out_h {
        for col in 0..out_w {
            let (x, y) = raster.transform.pixel_center(col0 + col, row0 + row);
            if !polygon.intersects(&Point::new(x, y)) {
                continue;
            }
            inside += 1;
            for band in 0..bands {
                data[band * out_w * out_h + row * out_w + col] =
                    raster.band(band)[(row0 + row) * raster.width() + col0 + col];
            }
        }
    }

    if inside == 0 {
        return Err(GridProcessorError::clip(format!(
            "no pixel center of the raster falls inside {bbox}"
        )));
    }

    let (ox, oy) = raster.transform.pixel_to_world(col0 as f64, row0 as f64);
    let transform = GeoTransform::new(
        ox,
        raster.transform.pixel_width,
        oy,
        raster.transform.pixel_height,
    );

    debug!(
        window_col = col0,
        window_row = row0,
        width = out_w,
        height = out_h,
        masked = out_w * out_h - inside,
        "Clipped raster"
    );

    Ok(
        RasterBuffer::new(data, out_w, out_h, bands, raster.crs, transform)?
            .with_nodata(Some(fill))
            .with_dtype(raster.dtype),
    )
}

/// Densified, closed bbox outline in the target CRS.
fn project_outline(
    bbox: &BoundingBox,
    transform: &CrsTransform,
    samples: usize,
) -> Result<Vec<(f64, f64)>> {
    let n = samples.max(1);
    let ring = bbox.ring();
    let mut outline = Vec::with_capacity(4 * n + 1);

    for edge in ring.windows(2) {
        let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
        for i in 0..n {
            let t = i as f64 / n as f64;
            let p = transform
                .convert(x0 + t * (x1 - x0), y0 + t * (y1 - y0))
                .map_err(|e| GridProcessorError::reproject(e.to_string()))?;
            outline.push(p);
        }
    }
    if let Some(&first) = outline.first() {
        outline.push(first);
    }

    Ok(outline)
}

/// Pixel window [col0, col1) x [row0, row1) covering `extent`, clamped to the raster.
fn pixel_window(
    transform: &GeoTransform,
    extent: &Extent,
    width: usize,
    height: usize,
) -> (usize, usize, usize, usize) {
    let (ca, ra) = transform.world_to_pixel(extent.min_x, extent.max_y);
    let (cb, rb) = transform.world_to_pixel(extent.max_x, extent.min_y);

    let clamp = |v: f64, max: usize| v.max(0.0).min(max as f64) as usize;
    // Snap near-integers so float noise does not add a sliver column
    let lo = |v: f64| clamp((v + 1e-9).floor(), usize::MAX);
    let hi = |v: f64| clamp((v - 1e-9).ceil(), usize::MAX);

    let col0 = lo(ca.min(cb)).min(width);
    let col1 = hi(ca.max(cb)).min(width);
    let row0 = lo(ra.min(rb)).min(height);
    let row1 = hi(ra.max(rb)).min(height);
    (col0, row0, col1, row1)
}
