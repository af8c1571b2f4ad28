//! Post-write raster validation.
//!
//! Validation never fails: problems are recorded in the returned
//! [`ValidationRecord`] instead of being raised.

use std::path::Path;

use geo_common::Crs;
use grid_processor::{read_geotiff, RasterBuffer};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Raster extent as (left, bottom, right, top) in the raster's CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterBounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

/// Snapshot of a finished raster's properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub file_exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    pub crs_match: bool,
    /// (rows, cols)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<(usize, usize)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<RasterBounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    pub nodata_present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationRecord {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            file_exists: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.file_exists && self.error.is_none()
    }
}

/// Read the raster at `path` and describe it.
///
/// Any I/O or decode error yields `file_exists: false` with the error text.
pub fn validate(path: impl AsRef<Path>, expected_crs: &Crs) -> ValidationRecord {
    let path = path.as_ref();
    match read_geotiff(path) {
        Ok(raster) => validate_raster(&raster, expected_crs),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Validation could not read raster");
            ValidationRecord::failed(e.to_string())
        }
    }
}

/// Describe an in-memory raster.
///
/// Value range and nodata presence are taken from the first band; NaN is
/// ignored for the range.
pub fn validate_raster(raster: &RasterBuffer, expected_crs: &Crs) -> ValidationRecord {
    let extent = raster.extent();
    let band = raster.band(0);

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in band.iter().filter(|v| !v.is_nan()) {
        min = min.min(*v as f64);
        max = max.max(*v as f64);
    }
    let (min_value, max_value) = if min.is_finite() || max.is_finite() {
        (Some(min), Some(max))
    } else {
        (None, None)
    };

    let nodata_present = raster
        .nodata
        .is_some_and(|nd| band.iter().any(|v| *v == nd));

    ValidationRecord {
        file_exists: true,
        crs: Some(raster.crs.to_string()),
        crs_match: raster.crs == *expected_crs,
        shape: Some((raster.height(), raster.width())),
        bounds: Some(RasterBounds {
            left: extent.min_x,
            bottom: extent.min_y,
            right: extent.max_x,
            top: extent.max_y,
        }),
        resolution: Some(raster.resolution()),
        nodata: raster.nodata,
        dtype: Some(raster.dtype.to_string()),
        band_count: Some(raster.bands()),
        min_value,
        max_value,
        nodata_present,
        error: None,
    }
}
