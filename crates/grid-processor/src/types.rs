//! Core types for grid processing.

use geo_common::{Crs, Extent, GeoTransform};
use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// Sample type a raster was decoded from.
///
/// Pixel values are always held as `f32` in memory; this records what the
/// source encoding was so it can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    #[default]
    Float32,
    Float64,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::UInt64 => "uint64",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An owned multi-band raster: pixel values plus georeferencing.
///
/// Pixels are stored band-sequential, each band row-major from the
/// top-left corner.
#[derive(Debug, Clone)]
pub struct RasterBuffer {
    data: Vec<f32>,
    width: usize,
    height: usize,
    bands: usize,
    /// CRS the transform is expressed in.
    pub crs: Crs,
    /// Pixel-to-world transform.
    pub transform: GeoTransform,
    /// Sentinel meaning "no measurement". NaN is always treated as missing.
    pub nodata: Option<f32>,
    /// Source sample type.
    pub dtype: DataType,
}

impl RasterBuffer {
    /// Wrap existing pixel data, checking it matches the declared shape.
    pub fn new(
        data: Vec<f32>,
        width: usize,
        height: usize,
        bands: usize,
        crs: Crs,
        transform: GeoTransform,
    ) -> Result<Self> {
        if width == 0 || height == 0 || bands == 0 {
            return Err(GridProcessorError::invalid_raster(format!(
                "raster dimensions must be non-zero, got {width}x{height}x{bands}"
            )));
        }
        if data.len() != width * height * bands {
            return Err(GridProcessorError::invalid_raster(format!(
                "expected {} values for {width}x{height}x{bands}, got {}",
                width * height * bands,
                data.len()
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            bands,
            crs,
            transform,
            nodata: None,
            dtype: DataType::Float32,
        })
    }

    /// Allocate a raster with every pixel set to `value`.
    pub fn filled(
        width: usize,
        height: usize,
        bands: usize,
        value: f32,
        crs: Crs,
        transform: GeoTransform,
    ) -> Result<Self> {
        Self::new(
            vec![value; width * height * bands],
            width,
            height,
            bands,
            crs,
            transform,
        )
    }

    pub fn with_nodata(mut self, nodata: Option<f32>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Pixels per band.
    pub fn band_len(&self) -> usize {
        self.width * self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Pixels of one band. Panics if `band` is out of range.
    pub fn band(&self, band: usize) -> &[f32] {
        let n = self.band_len();
        &self.data[band * n..(band + 1) * n]
    }

    /// Mutable pixels of one band. Panics if `band` is out of range.
    pub fn band_mut(&mut self, band: usize) -> &mut [f32] {
        let n = self.band_len();
        &mut self.data[band * n..(band + 1) * n]
    }

    /// Get the value at a pixel.
    pub fn get(&self, band: usize, col: usize, row: usize) -> Option<f32> {
        if band >= self.bands || col >= self.width || row >= self.height {
            return None;
        }
        self.data
            .get(band * self.band_len() + row * self.width + col)
            .copied()
    }

    /// Extent covered in the raster's CRS.
    pub fn extent(&self) -> Extent {
        self.transform.extent(self.width, self.height)
    }

    /// Pixel size as (x, y) in CRS units.
    pub fn resolution(&self) -> (f64, f64) {
        self.transform.resolution()
    }

    /// True if `value` is NaN or equals the nodata sentinel.
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Combine single-grid rasters into one multi-band raster.
    ///
    /// All inputs must share CRS, transform and shape. The first input's
    /// nodata and dtype are kept.
    pub fn stack(layers: Vec<RasterBuffer>) -> Result<RasterBuffer> {
        let first = layers
            .first()
            .ok_or_else(|| GridProcessorError::invalid_raster("cannot stack zero rasters"))?;
        let (width, height, crs, transform) =
            (first.width, first.height, first.crs, first.transform);
        let nodata = first.nodata;
        let dtype = first.dtype;

        let mut data = Vec::with_capacity(layers.iter().map(|l| l.data.len()).sum());
        let mut bands = 0;
        for layer in layers {
            if layer.width != width || layer.height != height {
                return Err(GridProcessorError::ShapeMismatch {
                    expected_width: width,
                    expected_height: height,
                    actual_width: layer.width,
                    actual_height: layer.height,
                });
            }
            if layer.crs != crs || layer.transform != transform {
                return Err(GridProcessorError::invalid_raster(
                    "stacked rasters must share CRS and transform",
                ));
            }
            bands += layer.bands;
            data.extend(layer.data);
        }

        Ok(RasterBuffer::new(data, width, height, bands, crs, transform)?
            .with_nodata(nodata)
            .with_dtype(dtype))
    }
}

/// Interpolation method for grid resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact values).
    Nearest,
    /// Bilinear interpolation (smooth, slight value changes).
    #[default]
    Bilinear,
}

impl InterpolationMethod {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "nearest" => Self::Nearest,
            _ => Self::Bilinear,
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
        }
    }
}
