//! Error types for raster acquisition.

use geo_common::GeoError;
use grid_processor::GridProcessorError;
use thiserror::Error;

/// Failures reported by the remote raster service.
///
/// The variant decides what the caller does next: size-limit failures
/// switch a direct request to tiles, retryable ones are tried again, and
/// rejections are final.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The request is larger than the service will evaluate in one call.
    #[error("request exceeds the service size limit: {0}")]
    SizeLimitExceeded(String),

    /// Network failure, throttling or a server-side error.
    #[error("transient service failure: {0}")]
    Transient(String),

    /// The returned pixel block does not match the requested window.
    #[error("pixel window shape mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    /// The response body could not be decoded.
    #[error("could not decode service response: {0}")]
    Decode(String),

    /// The service refused the request (bad expression, auth, quota).
    #[error("request rejected by service: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// Whether trying the same request again can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::ShapeMismatch { .. } | Self::Decode(_)
        )
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SizeLimitExceeded(_) => "size_limit",
            Self::Transient(_) => "transient",
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::Decode(_) => "decode",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Errors that can occur while acquiring a dataset or running a job.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// The location could not be resolved to a bounding box. Fatal for a job.
    #[error("could not geocode '{location}': {reason}")]
    GeocodeFailure { location: String, reason: String },

    /// Degenerate region or pixel math.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// A tile exhausted its attempts.
    #[error("tile (row {row}, col {col}) failed after {attempts} attempt(s): {source}")]
    TileFetchFailure {
        row: usize,
        col: usize,
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    /// Clipping left nothing of the raster.
    #[error("clip failed: {0}")]
    ClipError(String),

    /// CRS parse or warp failure.
    #[error("reprojection failed: {0}")]
    ReprojectError(String),

    /// Other raster processing failure (decode, stacking, encoding).
    #[error("raster processing failed: {0}")]
    Processing(String),

    /// A direct (untiled) request failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The dataset did not finish within its time limit.
    #[error("{dataset} acquisition timed out after {seconds}s")]
    Timeout { dataset: String, seconds: u64 },

    /// Request parsing failed.
    #[error("request parsing failed: {0}")]
    Parse(String),

    /// Storage/IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AcquisitionError {
    /// Create an InvalidRegion error.
    pub fn invalid_region(msg: impl Into<String>) -> Self {
        Self::InvalidRegion(msg.into())
    }

    /// Create a Processing error.
    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a GeocodeFailure error.
    pub fn geocode(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GeocodeFailure {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

impl From<GridProcessorError> for AcquisitionError {
    fn from(err: GridProcessorError) -> Self {
        match err {
            GridProcessorError::InvalidRegion(msg) => Self::InvalidRegion(msg),
            GridProcessorError::ClipError(msg) => Self::ClipError(msg),
            GridProcessorError::ReprojectError(msg) => Self::ReprojectError(msg),
            GridProcessorError::Io(e) => Self::Io(e),
            GridProcessorError::ConfigError(msg) => Self::Config(msg),
            other => Self::Processing(other.to_string()),
        }
    }
}

impl From<GeoError> for AcquisitionError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::InvalidBbox(msg) => Self::InvalidRegion(msg),
            other => Self::ReprojectError(other.to_string()),
        }
    }
}

/// Result type for acquisition operations.
pub type Result<T> = std::result::Result<T, AcquisitionError>;
