//! Error types for geographic primitives.

use thiserror::Error;

/// Result type alias using GeoError.
pub type GeoResult<T> = Result<T, GeoError>;

/// Errors raised while building or transforming geographic values.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("CRS not in the definitions database: {0}")]
    UnsupportedCrs(String),

    #[error("Projection failed: {0}")]
    Projection(String),
}

impl GeoError {
    pub fn invalid_bbox(msg: impl Into<String>) -> Self {
        Self::InvalidBbox(msg.into())
    }

    pub fn projection(msg: impl Into<String>) -> Self {
        Self::Projection(msg.into())
    }
}
