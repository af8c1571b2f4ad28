//! Error types for grid processing.

use geo_common::GeoError;
use thiserror::Error;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Degenerate region or pixel math.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Clipping left nothing of the raster.
    #[error("clip failed: {0}")]
    ClipError(String),

    /// CRS parse or transform computation failure.
    #[error("reprojection failed: {0}")]
    ReprojectError(String),

    /// A pixel block did not have the expected shape.
    #[error("shape mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    /// Raster buffer is internally inconsistent.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// GeoTIFF encode/decode error.
    #[error("GeoTIFF error: {0}")]
    GeoTiff(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl GridProcessorError {
    /// Create an InvalidRegion error.
    pub fn invalid_region(msg: impl Into<String>) -> Self {
        Self::InvalidRegion(msg.into())
    }

    /// Create a ClipError.
    pub fn clip(msg: impl Into<String>) -> Self {
        Self::ClipError(msg.into())
    }

    /// Create a ReprojectError.
    pub fn reproject(msg: impl Into<String>) -> Self {
        Self::ReprojectError(msg.into())
    }

    /// Create an InvalidRaster error.
    pub fn invalid_raster(msg: impl Into<String>) -> Self {
        Self::InvalidRaster(msg.into())
    }

    /// Create a GeoTiff error.
    pub fn geotiff(msg: impl Into<String>) -> Self {
        Self::GeoTiff(msg.into())
    }
}

impl From<tiff::TiffError> for GridProcessorError {
    fn from(err: tiff::TiffError) -> Self {
        Self::GeoTiff(err.to_string())
    }
}

impl From<GeoError> for GridProcessorError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::InvalidBbox(msg) => Self::InvalidRegion(msg),
            other => Self::ReprojectError(other.to_string()),
        }
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
