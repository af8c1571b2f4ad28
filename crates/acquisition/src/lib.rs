//! Large-area raster acquisition from a pixel-capped remote service.
//!
//! A dataset request flows through:
//!
//! ```text
//! DatasetRequest (dataset, bbox, year)
//!      │
//!      ▼
//! AcquisitionPlanner ──► DirectFetch ──► fetch_direct ──┐
//!      │                      │ size limit              │
//!      │                      ▼                         │
//!      └──────────────► TiledFetch ──► TileFetcher × N  │
//!                                        │ (bounded)    │
//!                                        ▼              │
//!                                     Stitcher          │
//!                                        │              │
//!                                        ▼              ▼
//!                          SpatialProcessor (clip, reproject)
//!                                        │
//!                                        ▼
//!                          GeoTIFF output ──► Validator
//! ```
//!
//! [`JobRunner`] adds geocoding, dataset fan-out, optional alignment and the
//! job manifest on top of [`AcquisitionPipeline`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod geocode;
pub mod job;
pub mod manifest;
pub mod metrics;
pub mod pipeline;
pub mod planner;
pub mod request;
pub mod retry;
pub mod service;
pub mod stitcher;
pub mod validator;

pub use catalog::{DatasetKind, OutputLayout, RasterSource};
pub use config::{AcquisitionConfig, FailureMode};
pub use error::{AcquisitionError, Result, ServiceError};
pub use fetcher::TileFetcher;
pub use geocode::{GeocodedPlace, Geocoder, GeocoderConfig, NominatimGeocoder};
pub use job::{JobRequest, JobRunner};
pub use manifest::{build_manifest, generate_job_id, JobManifest, JobOutcome, JobStatus};
pub use metrics::{AcquisitionMetrics, MetricsSnapshot};
pub use pipeline::{AcquisitionPipeline, DatasetOutput, DatasetRequest};
pub use planner::{AcquisitionPlan, AcquisitionPlanner};
pub use request::{KeywordParser, LlmRequestParser, ParsedRequest, ParserConfig, RequestParser};
pub use retry::{Backoff, RetryPolicy};
pub use service::{HttpRasterService, PixelWindow, RasterService, RemoteServiceConfig};
pub use stitcher::Stitcher;
pub use validator::{validate, validate_raster, ValidationRecord};
